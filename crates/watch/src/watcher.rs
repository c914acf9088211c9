//! Event normalizer and directory watcher.
//!
//! `notify` delivers events on its own backend thread. That thread does one
//! thing only: forward the raw event into an unbounded channel. A single
//! dispatcher task inside the runtime reads the channel and schedules one
//! candidate check per affected path.
//!
//! Overlapping checks for the same path (a `created` and a later `modified`
//! event racing) are accepted: the stability oracle makes both converge on
//! the same answer, and the worker tolerates a vanished duplicate.

use std::path::PathBuf;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use dropship_queue::Producer;

use crate::stability::{self, Stability};
use crate::{WatchError, filter};

/// Delay before a `modified` event is processed: the producer is usually
/// still writing, so only the path is rescheduled, nothing is re-checked.
pub const DEFAULT_MODIFY_DELAY: Duration = Duration::from_secs(10);

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory watched for deposited archives (non-recursive).
    pub watch_dir: PathBuf,
    /// Interval between the two stability size probes.
    pub stability_window: Duration,
    /// Delay applied to `modified` events before processing.
    pub modify_delay: Duration,
}

impl WatcherConfig {
    /// Configuration with reference timings for the given directory.
    pub fn new(watch_dir: PathBuf) -> Self {
        Self {
            watch_dir,
            stability_window: stability::DEFAULT_STABILITY_WINDOW,
            modify_delay: DEFAULT_MODIFY_DELAY,
        }
    }
}

/// Owns the `notify` watcher and its dispatcher task.
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
    watch_dir: PathBuf,
    cancel: CancellationToken,
}

#[derive(Clone)]
struct Ctx {
    stability_window: Duration,
    modify_delay: Duration,
    queue: Producer,
    cancel: CancellationToken,
}

impl DirectoryWatcher {
    /// Starts watching the configured directory.
    ///
    /// Stable archives are pushed onto `queue`. `cancel` stops the
    /// dispatcher and all in-flight candidate checks. Must be called from
    /// within a tokio runtime.
    pub fn start(
        config: WatcherConfig,
        queue: Producer,
        cancel: CancellationToken,
    ) -> Result<Self, WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();

        // Runs on notify's backend thread; the channel is the only hand-off
        // point into the runtime.
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&config.watch_dir, RecursiveMode::NonRecursive)?;
        tracing::info!(dir = %config.watch_dir.display(), "watching directory");

        let ctx = Ctx {
            stability_window: config.stability_window,
            modify_delay: config.modify_delay,
            queue,
            cancel: cancel.clone(),
        };
        tokio::spawn(dispatch(rx, ctx));

        Ok(Self {
            watcher,
            watch_dir: config.watch_dir,
            cancel,
        })
    }

    /// Stops the watcher and waits for the notify backend to quiesce.
    pub fn stop(mut self) {
        let _ = self.watcher.unwatch(&self.watch_dir);
        self.cancel.cancel();
        // Dropping the watcher joins notify's backend thread.
    }
}

/// Reads raw events off the hand-off channel and schedules candidates.
async fn dispatch(mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>, ctx: Ctx) {
    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            event = rx.recv() => match event {
                None => break,
                Some(Err(e)) => tracing::warn!(error = %e, "watch error"),
                Some(Ok(event)) => handle_event(event, &ctx),
            },
        }
    }
    tracing::debug!("event dispatcher stopped");
}

/// Normalizes one raw event into zero or more scheduled candidate checks.
fn handle_event(event: Event, ctx: &Ctx) {
    match event.kind {
        // New file dropped into the directory.
        EventKind::Create(_) => {
            for path in event.paths {
                schedule(path, None, ctx);
            }
        }
        // Rename with both endpoints: only the destination is a candidate.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if let Some(path) = event.paths.into_iter().next_back() {
                schedule(path, None, ctx);
            }
        }
        // The source of a rename no longer exists.
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {}
        // Move destination (or platform-dependent rename notification).
        EventKind::Modify(ModifyKind::Name(_)) => {
            for path in event.paths {
                schedule(path, None, ctx);
            }
        }
        // Content change: the producer is likely still writing.
        EventKind::Modify(_) => {
            for path in event.paths {
                schedule(path, Some(ctx.modify_delay), ctx);
            }
        }
        _ => {}
    }
}

/// Spawns a candidate check, optionally after a delay.
fn schedule(path: PathBuf, delay: Option<Duration>, ctx: &Ctx) {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        if let Some(delay) = delay {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        process_candidate(path, ctx.stability_window, &ctx.queue, &ctx.cancel).await;
    });
}

/// Validates a candidate path and admits it to the queue once stable.
///
/// Silently ignores paths that are not regular files or do not match the
/// archive naming grammar; abandons paths that vanish mid-check.
pub async fn process_candidate(
    path: PathBuf,
    stability_window: Duration,
    queue: &Producer,
    cancel: &CancellationToken,
) {
    if !path.is_file() {
        return;
    }
    if !filter::is_archive_name(&path) {
        tracing::debug!(path = %path.display(), "ignoring non-archive path");
        return;
    }

    tracing::info!(path = %path.display(), "processing candidate");
    match stability::wait_until_stable(&path, stability_window, cancel).await {
        Stability::Stable(size) => {
            tracing::info!(path = %path.display(), size, "file stable, queueing for delivery");
            queue.push(path);
        }
        // Vanish is logged by the oracle; cancellation needs no log.
        Stability::Vanished | Stability::Cancelled => {}
    }
}
