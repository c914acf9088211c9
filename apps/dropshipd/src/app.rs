//! Lifecycle controller: wires the pipeline together and owns
//! startup/shutdown ordering.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use dropship_config::Config;
use dropship_endpoint::{Endpoint, TelegramEndpoint};
use dropship_queue::DeliveryQueue;
use dropship_watch::{DirectoryWatcher, WatcherConfig};
use dropship_worker::DeliveryWorker;

/// Runs the daemon until an interrupt signal arrives, then shuts down.
pub async fn run(config: Config) -> anyhow::Result<()> {
    // The thumbnail is a convenience; failure must not stop the daemon.
    let thumbnail = config.thumbnail_source.as_deref().and_then(|source| {
        match dropship_thumbnail::prepare(source, &config.watch_dir) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, "failed to create thumbnail");
                None
            }
        }
    });

    // Fail fast on an unusable session: nothing is watching yet, so there
    // is nothing to clean up.
    let endpoint = Arc::new(
        TelegramEndpoint::new(&config.bot_token).context("failed to build endpoint client")?,
    );
    endpoint
        .start()
        .await
        .context("failed to start endpoint session")?;
    endpoint
        .send_notification(&config.chat_id, "dropship started")
        .await
        .context("startup notification failed")?;
    tracing::info!("endpoint session started");

    let (producer, consumer) = DeliveryQueue::new();
    let cancel = CancellationToken::new();

    let watcher = DirectoryWatcher::start(
        WatcherConfig::new(config.watch_dir.clone()),
        producer.clone(),
        cancel.child_token(),
    )
    .context("failed to start directory watcher")?;

    let worker = DeliveryWorker::new(
        Arc::clone(&endpoint) as Arc<dyn Endpoint>,
        config.chat_id.clone(),
        thumbnail.clone(),
        producer,
        consumer,
        cancel.child_token(),
    );
    let worker_task = tokio::spawn(worker.run());

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, stopping");

    // A second interrupt mid-cleanup exits immediately; cleanup so far is
    // already durable (no partial state to corrupt).
    tokio::spawn(async {
        wait_for_shutdown_signal().await;
        tracing::error!("second interrupt, exiting immediately");
        std::process::exit(1);
    });

    // Shutdown order: watcher first so no new candidates arrive, then the
    // worker (abandoning queued and in-flight entries), then the session.
    watcher.stop();
    if let Err(e) = endpoint
        .send_notification(&config.chat_id, "dropship stopping")
        .await
    {
        tracing::warn!(error = %e, "shutdown notification failed");
    }
    cancel.cancel();
    worker_task.abort();
    let _ = worker_task.await;
    if let Err(e) = endpoint.stop().await {
        tracing::warn!(error = %e, "failed to close endpoint session");
    }
    if let Some(thumb) = thumbnail {
        dropship_thumbnail::remove(&thumb);
    }
    tracing::info!("stopped");
    Ok(())
}

/// Resolves when SIGINT or SIGTERM arrives.
#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
