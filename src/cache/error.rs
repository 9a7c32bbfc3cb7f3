use std::{io, path::PathBuf};

use thiserror::Error;

/// Startup directory walk failed; the asset set is unknown.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to walk asset directory `{}`: {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// A single asset could not be ingested into the cache.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to stat `{}`: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("`{}` is outside the cache root `{}`", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },
    #[error("`{}` has no usable file name", path.display())]
    InvalidName { path: PathBuf },
}

/// A compression step failed. Only the affected variant is dropped.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("gzip encoding failed: {0}")]
    Gzip(#[source] io::Error),
    #[error("brotli encoding failed: {0}")]
    Brotli(#[source] io::Error),
}

/// Startup cache construction failed. Both cases are fatal to serving.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}
