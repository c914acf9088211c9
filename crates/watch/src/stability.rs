//! File-stability oracle.
//!
//! A file is stable when two size samples taken one window apart are equal.
//! There is no retry cap: a file that never stops growing is probed until it
//! stabilizes, vanishes, or the token is cancelled.

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Default interval between the two size probes.
pub const DEFAULT_STABILITY_WINDOW: Duration = Duration::from_secs(5);

/// Result of watching a candidate file for stability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Two consecutive samples matched; carries the size at admission.
    Stable(u64),
    /// The file disappeared (or its size became unreadable) mid-check.
    Vanished,
    /// Shutdown interrupted the check.
    Cancelled,
}

/// Waits until `path` stops changing size.
///
/// Each cycle samples the size, suspends for `window`, and samples again.
/// Unequal samples restart the cycle immediately, with no extra delay.
pub async fn wait_until_stable(
    path: &Path,
    window: Duration,
    cancel: &CancellationToken,
) -> Stability {
    let Some(mut before) = file_size(path) else {
        tracing::info!(path = %path.display(), "file vanished before stability check");
        return Stability::Vanished;
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Stability::Cancelled,
            _ = tokio::time::sleep(window) => {}
        }

        match file_size(path) {
            None => {
                tracing::info!(path = %path.display(), "file vanished during stability check");
                return Stability::Vanished;
            }
            Some(after) if after == before => return Stability::Stable(after),
            Some(after) => {
                tracing::info!(
                    path = %path.display(),
                    before,
                    after,
                    "size still changing, re-sampling"
                );
                before = after;
            }
        }
    }
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|m| m.is_file())
        .map(|m| m.len())
}
