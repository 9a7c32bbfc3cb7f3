//! Servable state of one static asset.

use std::time::SystemTime;

use bytes::Bytes;

use super::compression::Variants;
use super::fingerprint::fingerprint;

/// One cached asset with all of its pre-computed encodings.
///
/// Entries are never mutated after construction. The store replaces the
/// whole entry on refresh, so readers always see a consistent set of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    /// Path relative to the cache root, `/`-separated. Also the request path.
    pub canonical_path: String,
    /// Base name of the source file.
    pub filename: String,
    /// Modification time of the source file at ingestion.
    pub last_modified: SystemTime,
    pub raw: Bytes,
    pub gzip: Option<Bytes>,
    pub brotli: Option<Bytes>,
    /// Cache validator sent as `Etag`.
    pub validator: String,
}

impl CachedEntry {
    /// Assemble an entry from freshly compressed variants, deriving the validator.
    pub fn new(
        canonical_path: String,
        filename: String,
        last_modified: SystemTime,
        variants: Variants,
    ) -> Self {
        let validator = fingerprint(last_modified, variants.raw.len(), &filename);
        Self {
            canonical_path,
            filename,
            last_modified,
            raw: variants.raw,
            gzip: variants.gzip,
            brotli: variants.brotli,
            validator,
        }
    }
}
