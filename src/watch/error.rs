use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchSourceError {
    #[error("failed to start watching `{}`: {source}", root.display())]
    Start {
        root: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("filesystem watcher reported an error: {0}")]
    Notify(#[from] notify::Error),
}
