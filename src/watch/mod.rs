//! Filesystem change feed that keeps the asset cache current.
//!
//! [`NotifySource`] turns native filesystem notifications into a channel of
//! [`WatchEvent`]s. [`WatchWorker`] drains that channel one event at a time
//! and refreshes the matching cache entry.

mod error;
mod source;
mod worker;

pub use error::WatchSourceError;
pub use source::{NotifySource, WatchEvent, WatchReceiver, WatchSender};
pub use worker::WatchWorker;
