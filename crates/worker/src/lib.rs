//! Delivery worker.
//!
//! The sole consumer of the delivery queue. Pops one entry at a time,
//! attempts delivery, and branches on the typed outcome: delete the source
//! on success, back off and requeue on a rate limit, preserve the file on a
//! hard failure. Every pop cycle is acked exactly once, on all branches, so
//! the queue always makes forward progress.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use dropship_endpoint::{Endpoint, ProgressFn, SendOutcome};
use dropship_queue::{Consumer, Producer};

/// The delivery worker loop.
pub struct DeliveryWorker {
    endpoint: Arc<dyn Endpoint>,
    recipient: String,
    thumbnail: Option<PathBuf>,
    producer: Producer,
    consumer: Consumer,
    cancel: CancellationToken,
}

impl DeliveryWorker {
    /// Creates a worker.
    ///
    /// `producer` is used only for rate-limit requeues; `consumer` makes
    /// this worker the queue's single consumer by ownership.
    pub fn new(
        endpoint: Arc<dyn Endpoint>,
        recipient: String,
        thumbnail: Option<PathBuf>,
        producer: Producer,
        consumer: Consumer,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            endpoint,
            recipient,
            thumbnail,
            producer,
            consumer,
            cancel,
        }
    }

    /// Runs until cancelled. Entries mid-transmission at cancellation are
    /// abandoned; the remote copy may or may not exist.
    pub async fn run(mut self) {
        loop {
            let path = tokio::select! {
                _ = self.cancel.cancelled() => break,
                path = self.consumer.pop() => path,
            };
            self.deliver(path).await;
            self.consumer.ack();
        }
        tracing::info!("delivery worker stopped");
    }

    /// One pop cycle: attempt delivery and apply the outcome.
    async fn deliver(&mut self, path: PathBuf) {
        tracing::info!(path = %path.display(), "uploading file");

        let progress = progress_logger(&path);
        let thumbnail = self.thumbnail.as_deref().filter(|t| t.is_file());

        match self
            .endpoint
            .send_document(&self.recipient, &path, thumbnail, progress)
            .await
        {
            SendOutcome::Success => {
                tracing::info!(path = %path.display(), "uploaded");
                match std::fs::remove_file(&path) {
                    Ok(()) => tracing::info!(path = %path.display(), "deleted source file"),
                    // The remote copy exists; re-attempting would duplicate it.
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to delete source file"
                        );
                    }
                }
            }
            SendOutcome::RateLimited(delay) => {
                tracing::info!(
                    path = %path.display(),
                    delay_secs = delay.as_secs_f64(),
                    "rate limited, backing off"
                );
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                // A brand-new queue cycle at the tail; distinct files
                // queued meanwhile may overtake this one.
                self.producer.push(path);
            }
            SendOutcome::HardFailure(reason) => {
                tracing::warn!(
                    path = %path.display(),
                    reason,
                    "upload failed, file preserved on disk"
                );
            }
        }
    }
}

/// Progress hook that logs upload percentage for a path.
fn progress_logger(path: &std::path::Path) -> ProgressFn {
    let path_display = path.display().to_string();
    Arc::new(move |sent, total| {
        if total > 0 {
            tracing::info!("{} : {:.1}%", path_display, sent as f64 * 100.0 / total as f64);
        }
    })
}
