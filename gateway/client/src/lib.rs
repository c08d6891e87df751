use std::fmt::{self, Debug};
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, Span};

pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate a valid dispatch message.";
pub const UNREACHABLE_MESSAGE: &str = "Could not connect to the emergency dispatch service.";
pub const DEFAULT_REPLY_MESSAGE: &str = "Dispatch completed.";
pub const CANCELLED_MESSAGE: &str = "Dispatch request was cancelled.";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Success,
    Info,
    Error,
}

impl DispatchStatus {
    /// Maps a status string reported by the dispatch service. Values outside the
    /// three known ones are not a success, so they are surfaced as `Info`.
    pub fn from_reported(status: &str) -> Self {
        match status {
            "success" => Self::Success,
            "info" => Self::Info,
            "error" => Self::Error,
            other => {
                tracing::warn!("Unknown status reported by dispatch service: {:?}", other);
                Self::Info
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of one dispatch attempt, handed back to the caller for display.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub status: DispatchStatus,
    pub response_message: String,
}

impl DispatchResult {
    pub fn new(status: DispatchStatus, response_message: impl Into<String>) -> Self {
        Self {
            status,
            response_message: response_message.into(),
        }
    }

    pub fn error(response_message: impl Into<String>) -> Self {
        Self::new(DispatchStatus::Error, response_message)
    }

    pub fn is_error(&self) -> bool {
        self.status == DispatchStatus::Error
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatch service returned {status}")]
    Service { status: StatusCode, body: String },
    #[error("dispatch service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed reply from dispatch service: {0}")]
    MalformedReply(#[from] serde_json::Error),
}

impl From<DispatchError> for DispatchResult {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Service { status, .. } => {
                DispatchResult::error(format!("Dispatch service returned an error: {status}"))
            }
            DispatchError::Transport(_) | DispatchError::MalformedReply(_) => {
                DispatchResult::error(UNREACHABLE_MESSAGE)
            }
        }
    }
}

#[derive(Serialize)]
struct DispatchMessage<'a> {
    message: &'a str,
}

/// Reads the service reply. Both fields are optional; a missing or non-string
/// field falls back to its default, while an empty string is kept as sent.
fn parse_reply(body: &[u8]) -> Result<DispatchResult, DispatchError> {
    let reply: Value = serde_json::from_slice(body)?;

    let status = reply
        .get("status")
        .and_then(Value::as_str)
        .map(DispatchStatus::from_reported)
        .unwrap_or(DispatchStatus::Info);
    let message = reply
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_REPLY_MESSAGE);

    Ok(DispatchResult::new(status, message))
}

#[derive(Clone)]
pub struct DispatchClient {
    client: reqwest::Client,
    url: String,
}

impl Debug for DispatchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchClient")
            .field("url", &self.url)
            .finish()
    }
}

impl DispatchClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends `message` to the dispatch endpoint exactly once. Never fails: every
    /// error is logged and folded into an `Error` result.
    #[instrument(skip_all, fields(url = %self.url, status))]
    pub async fn dispatch(&self, message: &str) -> DispatchResult {
        let span = Span::current();

        let result = match self.send(message).await {
            Ok(result) => result,
            Err(err) => {
                match &err {
                    DispatchError::Service { status, body } => {
                        tracing::error!("Dispatch API error: status={}, body={}", status, body)
                    }
                    other => tracing::error!("Failed to call dispatch service: {:?}", other),
                }
                err.into()
            }
        };

        span.record("status", result.status.as_str());
        result
    }

    async fn send(&self, message: &str) -> Result<DispatchResult, DispatchError> {
        let response = self
            .client
            .post(&self.url)
            .json(&DispatchMessage { message })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // the body is diagnostics only; the status is what gets reported
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            return Err(DispatchError::Service { status, body });
        }

        let body = response.bytes().await?;
        parse_reply(&body)
    }
}
