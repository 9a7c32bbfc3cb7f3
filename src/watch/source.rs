use std::path::{Path, PathBuf};

use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    event::{ModifyKind, RenameMode},
};
use tokio::sync::mpsc;
use tracing::info;

use super::error::WatchSourceError;

/// A change that may require refreshing a cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(path) | WatchEvent::Modified(path) => path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WatchEvent::Created(_) => "created",
            WatchEvent::Modified(_) => "modified",
        }
    }
}

pub type WatchSender = mpsc::UnboundedSender<Result<WatchEvent, WatchSourceError>>;
pub type WatchReceiver = mpsc::UnboundedReceiver<Result<WatchEvent, WatchSourceError>>;

/// Native filesystem watcher feeding a [`WatchReceiver`].
///
/// Events stop flowing once this value is dropped, which also closes the
/// channel and lets the consuming worker finish.
pub struct NotifySource {
    _watcher: RecommendedWatcher,
}

impl NotifySource {
    /// Watch `root` recursively.
    pub fn start(root: &Path) -> Result<(Self, WatchReceiver), WatchSourceError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            forward(&tx, res);
        })
        .map_err(|source| WatchSourceError::Start {
            root: root.to_path_buf(),
            source,
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| WatchSourceError::Start {
                root: root.to_path_buf(),
                source,
            })?;

        info!(
            target = "vitrine::watch",
            root = %root.display(),
            "Watching asset directory"
        );

        Ok((Self { _watcher: watcher }, rx))
    }
}

fn forward(tx: &WatchSender, res: Result<Event, notify::Error>) {
    let event = match res {
        Ok(event) => event,
        Err(err) => {
            let _ = tx.send(Err(WatchSourceError::Notify(err)));
            return;
        }
    };

    for watch_event in translate(event) {
        // The receiver is gone during shutdown.
        let _ = tx.send(Ok(watch_event));
    }
}

/// Map one native event to the subset the cache cares about.
fn translate(event: Event) -> Vec<WatchEvent> {
    match event.kind {
        EventKind::Create(_) => event.paths.into_iter().map(WatchEvent::Created).collect(),
        // The old name of a rename no longer exists on disk.
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .into_iter()
            .last()
            .map(WatchEvent::Modified)
            .into_iter()
            .collect(),
        EventKind::Modify(_) => event.paths.into_iter().map(WatchEvent::Modified).collect(),
        _ => Vec::new(),
    }
}
