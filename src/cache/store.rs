//! Concurrent asset cache keyed by canonical path.
//!
//! Readers clone an `Arc<CachedEntry>` under a short read lock. Writers build
//! the complete replacement entry first (file read, compression, validator)
//! and take the write lock only to swap the `Arc` into the map. A reader
//! therefore observes either the previous entry or the new one, never a mix.

use std::{
    collections::HashMap,
    fs,
    path::{Component, Path, PathBuf},
    sync::{Arc, RwLock},
    time::Instant,
};

use bytes::Bytes;
use metrics::{counter, histogram};
use tracing::{debug, info};

use super::compression::compress;
use super::entry::CachedEntry;
use super::error::{BuildError, IngestError};
use super::lock::{rw_read, rw_write};
use super::scanner::scan;

const SOURCE: &str = "cache::store";
const METRIC_LOOKUP_TOTAL: &str = "vitrine_cache_lookup_total";
const METRIC_UPSERT_TOTAL: &str = "vitrine_cache_upsert_total";
const METRIC_INGEST_MS: &str = "vitrine_cache_ingest_ms";

/// In-memory map from canonical path to the servable asset.
pub struct CacheStore {
    root: PathBuf,
    resolved_root: Option<PathBuf>,
    entries: RwLock<HashMap<String, Arc<CachedEntry>>>,
}

impl CacheStore {
    /// Create an empty store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let resolved_root = fs::canonicalize(&root).ok();
        Self {
            root,
            resolved_root,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Bulk-ingest `paths` at startup. The first failure aborts the build.
    pub fn build<I, P>(root: impl Into<PathBuf>, paths: I) -> Result<Self, IngestError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let store = Self::new(root);
        let started_at = Instant::now();

        for path in paths {
            let entry = store.ingest(path.as_ref())?;
            debug!(
                target = "vitrine::cache",
                path = %entry.canonical_path,
                raw_len = entry.raw.len(),
                "Added asset"
            );
            store.swap(entry);
        }

        info!(
            target = "vitrine::cache",
            root = %store.root.display(),
            entries = store.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Asset cache built"
        );

        Ok(store)
    }

    /// Scan `root` for `extensions` and build the store from the result.
    pub fn scan_and_build<S: AsRef<str>>(
        root: impl Into<PathBuf>,
        extensions: &[S],
    ) -> Result<Self, BuildError> {
        let root = root.into();
        let paths = scan(&root, extensions)?;
        Ok(Self::build(root, paths)?)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read `source` from disk and atomically replace its entry.
    ///
    /// On error the store is left unchanged.
    pub fn upsert(&self, source: &Path) -> Result<Arc<CachedEntry>, IngestError> {
        let started_at = Instant::now();
        let result = self.ingest(source);
        histogram!(METRIC_INGEST_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(entry) => {
                counter!(METRIC_UPSERT_TOTAL, "outcome" => "ok").increment(1);
                Ok(self.swap(entry))
            }
            Err(err) => {
                counter!(METRIC_UPSERT_TOTAL, "outcome" => "error").increment(1);
                Err(err)
            }
        }
    }

    /// Fetch the entry stored under `canonical_path`.
    pub fn lookup(&self, canonical_path: &str) -> Option<Arc<CachedEntry>> {
        let found = rw_read(&self.entries, SOURCE, "lookup")
            .get(canonical_path)
            .cloned();
        let outcome = if found.is_some() { "hit" } else { "miss" };
        counter!(METRIC_LOOKUP_TOTAL, "outcome" => outcome).increment(1);
        found
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All canonical paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = rw_read(&self.entries, SOURCE, "paths")
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    /// Derive the canonical key for a file below the root.
    pub fn canonical_key(&self, source: &Path) -> Result<String, IngestError> {
        let relative = source
            .strip_prefix(&self.root)
            .ok()
            .map(Path::to_path_buf)
            .or_else(|| {
                let resolved_root = self.resolved_root.as_ref()?;
                source
                    .strip_prefix(resolved_root)
                    .ok()
                    .map(Path::to_path_buf)
                    .or_else(|| {
                        let resolved = fs::canonicalize(source).ok()?;
                        resolved
                            .strip_prefix(resolved_root)
                            .ok()
                            .map(Path::to_path_buf)
                    })
            })
            .ok_or_else(|| self.outside_root(source))?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_string_lossy()),
                Component::CurDir => {}
                _ => return Err(self.outside_root(source)),
            }
        }

        if segments.is_empty() {
            return Err(IngestError::InvalidName {
                path: source.to_path_buf(),
            });
        }

        Ok(segments.join("/"))
    }

    fn outside_root(&self, source: &Path) -> IngestError {
        IngestError::OutsideRoot {
            path: source.to_path_buf(),
            root: self.root.clone(),
        }
    }

    /// Build a complete entry for `source` without touching the map.
    fn ingest(&self, source: &Path) -> Result<CachedEntry, IngestError> {
        let canonical_path = self.canonical_key(source)?;

        let contents = fs::read(source).map_err(|source_err| IngestError::Read {
            path: source.to_path_buf(),
            source: source_err,
        })?;

        let metadata = fs::metadata(source).map_err(|source_err| IngestError::Metadata {
            path: source.to_path_buf(),
            source: source_err,
        })?;
        let last_modified = metadata
            .modified()
            .map_err(|source_err| IngestError::Metadata {
                path: source.to_path_buf(),
                source: source_err,
            })?;

        let filename = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| IngestError::InvalidName {
                path: source.to_path_buf(),
            })?;

        let variants = compress(&filename, Bytes::from(contents));
        Ok(CachedEntry::new(
            canonical_path,
            filename,
            last_modified,
            variants,
        ))
    }

    fn swap(&self, entry: CachedEntry) -> Arc<CachedEntry> {
        let entry = Arc::new(entry);
        rw_write(&self.entries, SOURCE, "swap")
            .insert(entry.canonical_path.clone(), entry.clone());
        entry
    }
}
