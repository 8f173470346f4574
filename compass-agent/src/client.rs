//! Extraction client: one logical model call with transport retry.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::traits::{CompletionRequest, FinishReason, LlmBackend, LlmError};
use crate::config::PipelineConfig;
use crate::error::PipelineError;

/// Sends composed requests to a backend and returns the raw text.
///
/// `max_tokens` is clamped to the backend's output limit. Transient failures (timeouts, network errors, rate limits, 5xx) are
/// retried up to `transport_attempts` times. These retries never count as
/// validation attempts.
#[derive(Clone)]
pub struct ExtractionClient {
    backend: Arc<dyn LlmBackend>,
    config: PipelineConfig,
}

impl ExtractionClient {
    /// Create a client over `backend`.
    pub fn new(backend: Arc<dyn LlmBackend>, config: PipelineConfig) -> Self {
        Self { backend, config }
    }

    /// Shared handle to the backend.
    pub fn backend(&self) -> Arc<dyn LlmBackend> {
        Arc::clone(&self.backend)
    }

    /// Backend identifier.
    pub fn backend_id(&self) -> &str {
        self.backend.id()
    }

    /// Run one logical extraction call.
    pub async fn extract(&self, request: &CompletionRequest) -> Result<String, PipelineError> {
        let tries = self.config.transport_attempts.max(1);
        let timeout = self.config.call_timeout();
        let request = self.fit_to_backend(request);

        for attempt in 1..=tries {
            let result = tokio::time::timeout(timeout, self.backend.complete(request.clone())).await;

            let err = match result {
                Ok(Ok(response)) => {
                    debug!(
                        backend = %self.backend.id(),
                        attempt,
                        prompt_tokens = response.usage.prompt_tokens,
                        completion_tokens = response.usage.completion_tokens,
                        "Backend call completed"
                    );
                    if response.finish_reason == FinishReason::Length {
                        warn!(backend = %self.backend.id(), "Response truncated at token limit");
                    }
                    return Ok(response.content);
                }
                Ok(Err(err)) => err,
                Err(_) => LlmError::Timeout {
                    after_ms: self.config.call_timeout_ms,
                },
            };

            if !err.is_retryable() || attempt == tries {
                warn!(
                    backend = %self.backend.id(),
                    attempt,
                    retryable = err.is_retryable(),
                    error = %err,
                    "Backend call failed"
                );
                return Err(err.into());
            }

            let requested = match &err {
                LlmError::RateLimited { retry_after_ms } => *retry_after_ms,
                _ => None,
            };
            let delay = self.config.retry_delay(requested);
            warn!(
                backend = %self.backend.id(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient backend failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }

        Err(PipelineError::Transport {
            retryable: true,
            message: "no transport attempt was made".to_string(),
        })
    }

    fn fit_to_backend(&self, request: &CompletionRequest) -> CompletionRequest {
        let limit = self.backend.capabilities().max_output_tokens;
        let mut request = request.clone();
        if let Some(requested) = request.max_tokens.filter(|&n| n > limit) {
            debug!(backend = %self.backend.id(), requested, limit, "Clamping max_tokens");
            request.max_tokens = Some(limit);
        }
        request
    }
}
