//! Directory watching for the dropship pipeline.
//!
//! Raw `notify` events cross into the tokio runtime through a single channel
//! hand-off, get normalized into per-path candidate checks, and stable
//! archives are pushed onto the delivery queue.

mod filter;
mod stability;
mod watcher;

pub use filter::{IN_PROGRESS_SUFFIX, is_archive_name};
pub use stability::{DEFAULT_STABILITY_WINDOW, Stability, wait_until_stable};
pub use watcher::{DEFAULT_MODIFY_DELAY, DirectoryWatcher, WatcherConfig, process_candidate};

/// Errors from setting up the directory watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("failed to watch directory: {0}")]
    Notify(#[from] notify::Error),
}
