use std::sync::Arc;

use tokio::task;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, matches_extension};

use super::source::{WatchEvent, WatchReceiver};

/// Serial consumer of filesystem events.
///
/// Each event is fully applied to the store before the next one is taken, so
/// two events for the same path are applied in arrival order.
pub struct WatchWorker {
    store: Arc<CacheStore>,
    extensions: Vec<String>,
    events: WatchReceiver,
}

impl WatchWorker {
    pub fn new(store: Arc<CacheStore>, extensions: Vec<String>, events: WatchReceiver) -> Self {
        Self {
            store,
            extensions,
            events,
        }
    }

    /// Drain events until the source closes.
    pub async fn run(mut self) {
        while let Some(item) = self.events.recv().await {
            match item {
                Ok(event) => self.apply(event).await,
                Err(err) => {
                    warn!(
                        target = "vitrine::watch",
                        error = %err,
                        "Filesystem watcher error"
                    );
                }
            }
        }

        debug!(target = "vitrine::watch", "Watch source closed");
    }

    async fn apply(&self, event: WatchEvent) {
        let path = event.path().to_path_buf();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !matches_extension(&filename, &self.extensions) {
            debug!(
                target = "vitrine::watch",
                path = %path.display(),
                kind = event.kind(),
                "Ignoring change to non-asset file"
            );
            return;
        }

        let store = self.store.clone();
        let ingest_path = path.clone();
        let outcome = task::spawn_blocking(move || store.upsert(&ingest_path)).await;

        match outcome {
            Ok(Ok(entry)) => {
                info!(
                    target = "vitrine::watch",
                    path = %entry.canonical_path,
                    kind = event.kind(),
                    validator = %entry.validator,
                    "Refreshed asset"
                );
            }
            Ok(Err(err)) => {
                warn!(
                    target = "vitrine::watch",
                    path = %path.display(),
                    kind = event.kind(),
                    error = %err,
                    "Failed to refresh asset; keeping previous entry"
                );
            }
            Err(join_err) => {
                warn!(
                    target = "vitrine::watch",
                    path = %path.display(),
                    error = %join_err,
                    "Asset refresh task did not complete"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use tempfile::TempDir;
    use tokio::sync::mpsc;

    use super::*;
    use crate::watch::WatchSourceError;

    fn extensions() -> Vec<String> {
        vec![".html".to_string(), ".css".to_string()]
    }

    #[tokio::test]
    async fn created_file_is_added() {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(CacheStore::new(dir.path()));
        let (tx, rx) = mpsc::unbounded_channel();

        let path = dir.path().join("about.html");
        fs::write(&path, b"<p>about</p>").expect("write");
        tx.send(Ok(WatchEvent::Created(path))).expect("send");
        drop(tx);

        WatchWorker::new(store.clone(), extensions(), rx).run().await;

        let entry = store.lookup("about.html").expect("entry added");
        assert_eq!(&entry.raw[..], b"<p>about</p>");
    }

    #[tokio::test]
    async fn events_apply_in_order() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("site.css");
        fs::write(&path, b"a{}").expect("write");
        let store = Arc::new(CacheStore::build(dir.path(), [&path]).expect("build"));
        let (tx, rx) = mpsc::unbounded_channel();

        fs::write(&path, b"a{color:red}").expect("rewrite");
        tx.send(Ok(WatchEvent::Modified(path.clone()))).expect("send");
        tx.send(Ok(WatchEvent::Modified(path))).expect("send");
        drop(tx);

        WatchWorker::new(store.clone(), extensions(), rx).run().await;

        let entry = store.lookup("site.css").expect("entry");
        assert_eq!(&entry.raw[..], b"a{color:red}");
    }

    #[tokio::test]
    async fn non_matching_and_failing_events_leave_store_unchanged() {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(CacheStore::new(dir.path()));
        let (tx, rx) = mpsc::unbounded_channel();

        let notes = dir.path().join("notes.txt");
        fs::write(&notes, b"skip me").expect("write");
        tx.send(Ok(WatchEvent::Created(notes))).expect("send");
        tx.send(Ok(WatchEvent::Modified(dir.path().join("gone.html"))))
            .expect("send");
        tx.send(Ok(WatchEvent::Modified(PathBuf::from("/elsewhere/x.html"))))
            .expect("send");
        tx.send(Err(WatchSourceError::Notify(notify::Error::generic(
            "simulated",
        ))))
        .expect("send");
        drop(tx);

        WatchWorker::new(store.clone(), extensions(), rx).run().await;

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn created_directory_needs_per_file_events() {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(CacheStore::new(dir.path()));
        let (tx, rx) = mpsc::unbounded_channel();

        let moved_in = dir.path().join("archive.html");
        fs::create_dir_all(&moved_in).expect("create dir");
        let inner = moved_in.join("old.html");
        fs::write(&inner, b"<p>old</p>").expect("write");
        tx.send(Ok(WatchEvent::Created(moved_in))).expect("send");
        drop(tx);

        WatchWorker::new(store.clone(), extensions(), rx).run().await;
        assert!(store.is_empty());

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok(WatchEvent::Modified(inner))).expect("send");
        drop(tx);

        WatchWorker::new(store.clone(), extensions(), rx).run().await;
        assert!(store.lookup("archive.html/old.html").is_some());
    }
}
