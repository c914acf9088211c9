//! Telegram Bot API client.
//!
//! Async HTTP client using `reqwest`. Documents go out as streamed multipart
//! uploads so the progress hook fires per chunk; HTTP 429 responses are
//! decoded into [`SendOutcome::RateLimited`] with the server-mandated delay.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::multipart;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::{Endpoint, EndpointError, ProgressFn, SendOutcome};

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Fallback backoff when a 429 arrives without a mandated delay.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Telegram Bot API endpoint.
pub struct TelegramEndpoint {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

/// Envelope every Bot API response is wrapped in.
#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

impl TelegramEndpoint {
    /// Creates a new endpoint for the given bot token.
    pub fn new(token: &str) -> Result<Self, EndpointError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.to_string(),
        })
    }

    /// Sets a custom base URL (for testing).
    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Performs a call that must come back `ok: true`, or errors.
    async fn call_ok(&self, request: reqwest::RequestBuilder) -> Result<(), EndpointError> {
        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        let parsed: ApiResponse = serde_json::from_slice(&body).unwrap_or_default();
        if !status.is_success() || !parsed.ok {
            return Err(EndpointError::Api {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Endpoint for TelegramEndpoint {
    /// Verifies the token with `getMe`.
    async fn start(&self) -> Result<(), EndpointError> {
        self.call_ok(self.http.get(self.url("getMe"))).await?;
        tracing::info!("endpoint session verified");
        Ok(())
    }

    /// The Bot API is stateless; closing just drops pooled connections.
    async fn stop(&self) -> Result<(), EndpointError> {
        tracing::debug!("endpoint session closed");
        Ok(())
    }

    async fn send_notification(&self, recipient: &str, text: &str) -> Result<(), EndpointError> {
        let body = serde_json::json!({
            "chat_id": recipient,
            "text": text,
            "disable_notification": true,
        });
        self.call_ok(self.http.post(self.url("sendMessage")).json(&body))
            .await
    }

    async fn send_document(
        &self,
        recipient: &str,
        document: &Path,
        thumbnail: Option<&Path>,
        progress: ProgressFn,
    ) -> SendOutcome {
        let file = match tokio::fs::File::open(document).await {
            Ok(f) => f,
            Err(e) => {
                return SendOutcome::HardFailure(format!(
                    "failed to open {}: {e}",
                    document.display()
                ));
            }
        };
        let total = match file.metadata().await {
            Ok(m) => m.len(),
            Err(e) => {
                return SendOutcome::HardFailure(format!(
                    "failed to stat {}: {e}",
                    document.display()
                ));
            }
        };
        let file_name = document
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();

        // Count bytes as reqwest pulls them off the stream.
        let mut sent = 0u64;
        let stream = ReaderStream::new(file).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                progress(sent, total);
            }
            chunk
        });
        let part = multipart::Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
            .file_name(file_name);

        let mut form = multipart::Form::new()
            .text("chat_id", recipient.to_string())
            .text("disable_notification", "true")
            .part("document", part);

        if let Some(thumb) = thumbnail {
            match tokio::fs::read(thumb).await {
                Ok(bytes) => {
                    form = form.part(
                        "thumbnail",
                        multipart::Part::bytes(bytes).file_name("thumb.jpg"),
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        path = %thumb.display(),
                        error = %e,
                        "failed to read thumbnail, sending without"
                    );
                }
            }
        }

        let resp = match self
            .http
            .post(self.url("sendDocument"))
            .multipart(form)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return SendOutcome::HardFailure(format!("transport error: {e}")),
        };

        let status = resp.status().as_u16();
        let body = resp.bytes().await.unwrap_or_default();
        classify_response(status, &body)
    }
}

/// Maps an HTTP status and Bot API response body to a delivery outcome.
fn classify_response(status: u16, body: &[u8]) -> SendOutcome {
    let parsed: Option<ApiResponse> = serde_json::from_slice(body).ok();

    if (200..300).contains(&status) && parsed.as_ref().is_some_and(|r| r.ok) {
        return SendOutcome::Success;
    }

    let retry_after = parsed
        .as_ref()
        .and_then(|r| r.parameters.as_ref())
        .and_then(|p| p.retry_after);
    if status == 429 || retry_after.is_some() {
        let delay = retry_after.map_or(DEFAULT_RETRY_AFTER, Duration::from_secs);
        return SendOutcome::RateLimited(delay);
    }

    let description = parsed
        .and_then(|r| r.description)
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
    SendOutcome::HardFailure(format!("API error {status}: {description}"))
}
