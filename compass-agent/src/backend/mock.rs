//! Scripted backend for tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::traits::*;

type Reply = Result<String, LlmError>;

#[derive(Default)]
struct Ledger {
    script: VecDeque<Reply>,
    seen: Vec<CompletionRequest>,
}

/// Backend that answers from a queue of canned replies.
///
/// Once the queue is empty every call gets the fallback text. Each request
/// is kept so tests can inspect prompts after the fact.
pub struct MockBackend {
    model_id: String,
    available: bool,
    capabilities: ModelCapabilities,
    fallback: String,
    delay: Option<Duration>,
    ledger: Mutex<Ledger>,
}

impl MockBackend {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            available: true,
            capabilities: ModelCapabilities::default(),
            fallback: "Mock response".to_string(),
            delay: None,
            ledger: Mutex::default(),
        }
    }

    /// Text returned once the script is used up.
    pub fn with_response(mut self, content: impl Into<String>) -> Self {
        self.fallback = content.into();
        self
    }

    /// Append a successful reply to the script.
    pub fn then_reply(self, content: impl Into<String>) -> Self {
        self.ledger().script.push_back(Ok(content.into()));
        self
    }

    /// Append a failure to the script.
    pub fn then_fail(self, error: LlmError) -> Self {
        self.ledger().script.push_back(Err(error));
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// An unavailable mock fails every call with `Unavailable`.
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Advertise different limits, e.g. a small `max_output_tokens`.
    pub fn with_capabilities(mut self, capabilities: ModelCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Calls to `complete` so far, including failed ones.
    pub fn call_count(&self) -> u32 {
        self.ledger().seen.len() as u32
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.ledger().seen.clone()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

// Rough 4-bytes-per-token estimate.
fn approx_tokens(text: &str) -> u32 {
    (text.len() / 4) as u32
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt_tokens = request.messages.iter().map(|m| approx_tokens(&m.content)).sum();

        let reply = {
            let mut ledger = self.ledger();
            ledger.seen.push(request);
            if self.available {
                ledger.script.pop_front()
            } else {
                None
            }
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !self.available {
            return Err(LlmError::Unavailable(format!("{} is switched off", self.model_id)));
        }

        let content = reply.unwrap_or_else(|| Ok(self.fallback.clone()))?;
        Ok(CompletionResponse {
            usage: Usage {
                prompt_tokens,
                completion_tokens: approx_tokens(&content),
            },
            content,
            finish_reason: FinishReason::Stop,
        })
    }

    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fallback_reply_and_request_log() {
        let backend = MockBackend::new("test-model").with_response("Hello, world!");

        assert_eq!(backend.call_count(), 0);

        let response = backend.complete(CompletionRequest::user("Hi")).await.unwrap();

        assert_eq!(response.content, "Hello, world!");
        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.requests()[0].user_text(), "Hi");
    }

    #[tokio::test]
    async fn test_script_runs_in_order_then_falls_back() {
        let backend = MockBackend::default()
            .with_response("fallback")
            .then_reply("first")
            .then_fail(LlmError::NetworkError("reset".into()));

        let first = backend.complete(CompletionRequest::user("a")).await.unwrap();
        assert_eq!(first.content, "first");

        let second = backend.complete(CompletionRequest::user("b")).await;
        assert!(matches!(second, Err(LlmError::NetworkError(_))));

        let third = backend.complete(CompletionRequest::user("c")).await.unwrap();
        assert_eq!(third.content, "fallback");
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_switched_off_keeps_script() {
        let backend = MockBackend::new("test-model")
            .then_reply("queued")
            .with_available(false);

        let result = backend.complete(CompletionRequest::user("Hi")).await;
        assert!(matches!(result, Err(LlmError::Unavailable(_))));
        assert_eq!(backend.call_count(), 1);
    }
}
