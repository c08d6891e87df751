use crate::generator::{GenerationError, StaticGenerator, TextGenerator};
use crate::DispatchRequest;
use dispatch_client::{
    DispatchClient, DispatchResult, CANCELLED_MESSAGE, GENERATION_FAILED_MESSAGE,
};

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, Span};

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_DEMO_MESSAGE: &str = "Demo dispatch: medical assistance requested";

const DEMO_ZONE: &str = "demo";
const DEMO_INCIDENT: &str = "demo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("dispatch request was cancelled")]
pub struct Cancelled;

impl From<Cancelled> for DispatchResult {
    fn from(_: Cancelled) -> Self {
        DispatchResult::error(CANCELLED_MESSAGE)
    }
}

/// Text generation followed by a single dispatch call.
///
/// Holds no per-request state, so clones can serve concurrent callers.
#[derive(Clone)]
pub struct Pipeline {
    generator: Arc<dyn TextGenerator>,
    client: DispatchClient,
    generation_timeout: Duration,
    demo_message: Arc<str>,
}

impl Pipeline {
    pub fn new(generator: Arc<dyn TextGenerator>, client: DispatchClient) -> Self {
        Self {
            generator,
            client,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            demo_message: Arc::from(DEFAULT_DEMO_MESSAGE),
        }
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn with_demo_message(mut self, message: impl Into<String>) -> Self {
        let message: String = message.into();
        self.demo_message = Arc::from(message);
        self
    }

    pub async fn run_dispatch(&self, request: &DispatchRequest) -> DispatchResult {
        self.run_dispatch_with_cancel(request, &CancellationToken::new())
            .await
            .unwrap_or_else(DispatchResult::from)
    }

    /// Runs the pipeline, giving up at either suspend point once `cancel` fires.
    /// The dispatch service is never called when generation fails or is cancelled.
    #[instrument(skip_all, fields(zone = %request.zone_id, incident = %request.incident_type, status))]
    pub async fn run_dispatch_with_cancel(
        &self,
        request: &DispatchRequest,
        cancel: &CancellationToken,
    ) -> Result<DispatchResult, Cancelled> {
        let span = Span::current();

        let generated = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("Dispatch cancelled during generation");
                return Err(Cancelled);
            }
            generated = self.generate(request) => generated,
        };

        let payload = match generated {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!("Failed to generate dispatch message: {}", err);
                span.record("status", "error");
                return Ok(DispatchResult::error(GENERATION_FAILED_MESSAGE));
            }
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("Dispatch cancelled while waiting for the dispatch service");
                return Err(Cancelled);
            }
            result = self.client.dispatch(&payload) => result,
        };

        span.record("status", result.status.as_str());
        if result.is_error() {
            tracing::warn!("Dispatch failed: {}", result.response_message);
        } else {
            tracing::info!("Dispatch finished: {}", result.response_message);
        }
        Ok(result)
    }

    /// Zero-argument variant kept for demos: forwards the configured demo message
    /// instead of a generated one.
    pub async fn run_demo_dispatch(&self) -> DispatchResult {
        self.demo().run_dispatch(&self.demo_request()).await
    }

    pub fn demo(&self) -> Pipeline {
        Pipeline {
            generator: Arc::new(StaticGenerator::new(&*self.demo_message)),
            ..self.clone()
        }
    }

    pub fn demo_request(&self) -> DispatchRequest {
        DispatchRequest::new(DEMO_ZONE, DEMO_INCIDENT, &*self.demo_message)
    }

    async fn generate(&self, request: &DispatchRequest) -> Result<String, GenerationError> {
        let payload = tokio::time::timeout(self.generation_timeout, self.generator.generate(request))
            .await
            .map_err(|_| GenerationError::Timeout(self.generation_timeout))??;

        if payload.trim().is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(payload)
    }
}
