use crate::DispatchRequest;

use async_trait::async_trait;
use std::fmt::{self, Debug};
use std::time::Duration;

/// Words that mark a report as urgent, matched as case-insensitive substrings.
pub const URGENT_KEYWORDS: &[&str] = &[
    "emergency",
    "urgent",
    "ambulance",
    "unconscious",
    "not breathing",
];

/// Messages shorter than this, without an urgent keyword, are too sparse to classify.
const MIN_WORDS: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("text generator produced no output")]
    Empty,
    #[error("text generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("text generation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("text generator reply has no `text` field")]
    MissingText,
}

/// Turns a structured incident report into the short message forwarded to the
/// dispatch service. The returned text is treated as opaque.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &DispatchRequest) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Low,
    Clarification,
}

impl Priority {
    pub fn tag(&self) -> &'static str {
        match self {
            Priority::High => "HIGH PRIORITY",
            Priority::Low => "LOW PRIORITY",
            Priority::Clarification => "CLARIFICATION NEEDED",
        }
    }
}

/// Offline generator that classifies reports by urgent keywords.
#[derive(Debug, Clone)]
pub struct KeywordGenerator {
    keywords: Vec<String>,
}

impl Default for KeywordGenerator {
    fn default() -> Self {
        Self {
            keywords: URGENT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl KeywordGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keywords<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for keyword in extra {
            let keyword = keyword.as_ref().trim().to_lowercase();
            // an empty keyword would match every message
            if !keyword.is_empty() && !self.keywords.contains(&keyword) {
                self.keywords.push(keyword);
            }
        }
        self
    }

    pub fn classify(&self, message: &str) -> Priority {
        let lowered = message.to_lowercase();
        if self.keywords.iter().any(|k| lowered.contains(k.as_str())) {
            return Priority::High;
        }
        if message.split_whitespace().count() < MIN_WORDS {
            return Priority::Clarification;
        }
        Priority::Low
    }

    pub fn compose(&self, request: &DispatchRequest) -> String {
        match self.classify(&request.message) {
            Priority::Clarification => format!(
                "[{}] Please describe the {} in zone {} in more detail.",
                Priority::Clarification.tag(),
                request.incident_type,
                request.zone_id
            ),
            priority => format!(
                "[{}] {} in zone {}: {}",
                priority.tag(),
                request.incident_type,
                request.zone_id,
                request.message.trim()
            ),
        }
    }
}

#[async_trait]
impl TextGenerator for KeywordGenerator {
    async fn generate(&self, request: &DispatchRequest) -> Result<String, GenerationError> {
        let payload = self.compose(request);
        tracing::debug!("Generated payload: {}", payload);
        Ok(payload)
    }
}

/// Always yields the same message. Backs the zero-argument demo dispatch.
#[derive(Debug, Clone)]
pub struct StaticGenerator {
    message: String,
}

impl StaticGenerator {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for StaticGenerator {
    async fn generate(&self, _request: &DispatchRequest) -> Result<String, GenerationError> {
        Ok(self.message.clone())
    }
}

#[derive(serde::Deserialize, Debug)]
struct GeneratedText {
    text: Option<String>,
}

/// Delegates generation to an external text-generation service.
///
/// The request is posted as JSON and the service answers `{"text": "..."}`.
/// Time limits are applied by the pipeline, not here.
pub struct RemoteGenerator {
    client: reqwest::Client,
    url: String,
}

impl Debug for RemoteGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteGenerator")
            .field("url", &self.url)
            .finish()
    }
}

impl RemoteGenerator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for RemoteGenerator {
    async fn generate(&self, request: &DispatchRequest) -> Result<String, GenerationError> {
        let reply: GeneratedText = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        reply.text.ok_or(GenerationError::MissingText)
    }
}
