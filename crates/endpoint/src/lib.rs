//! Delivery endpoint boundary.
//!
//! The worker only ever sees the [`Endpoint`] trait and the typed
//! [`SendOutcome`]; rate limiting is a value to branch on, never an error to
//! catch. [`TelegramEndpoint`] is the production implementation.

mod telegram;

pub use telegram::TelegramEndpoint;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Progress hook invoked as document bytes go out: `(sent, total)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Outcome of a single document delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The document was accepted by the endpoint.
    Success,
    /// The endpoint demands a pause before the next attempt.
    RateLimited(Duration),
    /// Delivery failed for a non-rate-limit reason; not retryable here.
    HardFailure(String),
}

/// Errors from session and notification calls.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
}

/// A delivery endpoint with a session lifecycle.
///
/// `send_document` deliberately returns [`SendOutcome`] instead of a
/// `Result`: transport errors are folded into `HardFailure` so the caller
/// has exactly three continuations to handle.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Establishes the session and verifies it is minimally usable.
    async fn start(&self) -> Result<(), EndpointError>;

    /// Closes the session.
    async fn stop(&self) -> Result<(), EndpointError>;

    /// Sends a short text notification to the recipient.
    async fn send_notification(&self, recipient: &str, text: &str) -> Result<(), EndpointError>;

    /// Sends a document, with an optional companion thumbnail.
    async fn send_document(
        &self,
        recipient: &str,
        document: &Path,
        thumbnail: Option<&Path>,
        progress: ProgressFn,
    ) -> SendOutcome;
}
