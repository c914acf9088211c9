//! dropship daemon.
//!
//! Watches a directory for finished archives and delivers them, one at a
//! time and in arrival order, to a Telegram chat.

mod app;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use dropship_config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    app::run(config).await
}
