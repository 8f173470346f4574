//! The model-service seam.
//!
//! Everything the extraction client knows about a model goes through
//! [`LlmBackend`]: one request in, one whole completion (or a classified
//! [`LlmError`]) out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A model service that turns a prompt into text.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Model identifier used in logs and reports.
    fn id(&self) -> &str;

    /// Run one completion to the end.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    fn capabilities(&self) -> &ModelCapabilities;
}

/// Why a backend call failed.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Key missing, invalid or rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Any other non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// HTTP 429, with the server's `Retry-After` when it sent one.
    #[error("Rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    /// Prompt plus requested output exceed the model's window.
    #[error("Context length exceeded: {0}")]
    ContextLength(String),

    #[error("Timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// The provider refused to answer (safety block, content filter).
    #[error("Content filtered: {reason}")]
    ContentFiltered { reason: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    /// The provider's envelope, not the model text, was malformed.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl LlmError {
    /// True for failures that may clear up if the same call is repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http { status, .. } => matches!(status, 408 | 500..=599),
            LlmError::Unavailable(_)
            | LlmError::NetworkError(_)
            | LlmError::Timeout { .. }
            | LlmError::RateLimited { .. } => true,
            _ => false,
        }
    }

    /// Classify a non-success HTTP status and its body.
    pub fn from_status(status: u16, body: String, retry_after_ms: Option<u64>) -> Self {
        match status {
            429 => LlmError::RateLimited { retry_after_ms },
            401 | 403 => LlmError::Authentication(format!("HTTP {}: {}", status, body)),
            400 if body.contains("context_length_exceeded") => LlmError::ContextLength(body),
            _ => LlmError::Http { status, body },
        }
    }
}

/// One prompt, as sent to a backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    /// Clamped to `0.0..=2.0` by [`CompletionRequest::with_temperature`].
    pub temperature: Option<f32>,
    pub response_format: Option<ResponseFormat>,
}

impl CompletionRequest {
    /// A request holding a single user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::default().with_message(Message::user(content))
    }

    pub fn with_system(self, prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(prompt.into()),
            ..self
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_max_tokens(self, max_tokens: u32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
            ..self
        }
    }

    pub fn with_temperature(self, temperature: f32) -> Self {
        Self {
            temperature: Some(temperature.clamp(0.0, 2.0)),
            ..self
        }
    }

    /// Ask for a bare JSON object.
    pub fn with_json_output(self) -> Self {
        self.with_format(ResponseFormatType::Json, None)
    }

    /// Ask for JSON matching `schema`. Backends that cannot attach a
    /// schema fall back to plain JSON mode.
    pub fn with_json_schema(self, schema: serde_json::Value) -> Self {
        self.with_format(ResponseFormatType::JsonSchema, Some(schema))
    }

    fn with_format(self, format_type: ResponseFormatType, schema: Option<serde_json::Value>) -> Self {
        Self {
            response_format: Some(ResponseFormat {
                format_type,
                schema,
            }),
            ..self
        }
    }

    /// User turns joined by blank lines.
    pub fn user_text(&self) -> String {
        let turns: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .collect();
        turns.join("\n\n")
    }
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// The model's whole answer to one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Raw model text; validated downstream.
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    /// Output was cut at the token limit.
    Length,
    ContentFilter,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Output constraint attached to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    pub format_type: ResponseFormatType,
    /// Only meaningful for [`ResponseFormatType::JsonSchema`].
    pub schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormatType {
    Text,
    Json,
    JsonSchema,
}

/// What a backend can be asked to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Upper bound for `max_tokens`; larger requests are clamped to it.
    pub max_output_tokens: u32,
    /// Whether a JSON Schema attached to the request is enforced by the
    /// server rather than only asking for a JSON object.
    pub supports_json_schema: bool,
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self {
            max_output_tokens: 1024,
            supports_json_schema: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(LlmError::Timeout { after_ms: 10 }.is_retryable());
        assert!(LlmError::NetworkError("reset".into()).is_retryable());
        assert!(LlmError::RateLimited { retry_after_ms: None }.is_retryable());
        assert!(LlmError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(LlmError::Http { status: 408, body: String::new() }.is_retryable());

        assert!(!LlmError::Authentication("bad key".into()).is_retryable());
        assert!(!LlmError::Http { status: 400, body: String::new() }.is_retryable());
        assert!(!LlmError::ContentFiltered { reason: "safety".into() }.is_retryable());
        assert!(!LlmError::ParseError("truncated envelope".into()).is_retryable());
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            LlmError::from_status(401, "nope".into(), None),
            LlmError::Authentication(_)
        ));
        assert!(matches!(
            LlmError::from_status(429, String::new(), Some(2000)),
            LlmError::RateLimited { retry_after_ms: Some(2000) }
        ));
        assert!(matches!(
            LlmError::from_status(400, r#"{"error":{"code":"context_length_exceeded"}}"#.into(), None),
            LlmError::ContextLength(_)
        ));
        assert!(!LlmError::ContextLength(String::new()).is_retryable());
        assert!(matches!(
            LlmError::from_status(500, String::new(), None),
            LlmError::Http { status: 500, .. }
        ));
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::user("hello")
            .with_system("be brief")
            .with_temperature(3.5)
            .with_json_output();

        assert_eq!(request.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(request.temperature, Some(2.0));
        assert_eq!(
            request.response_format.as_ref().map(|f| f.format_type.clone()),
            Some(ResponseFormatType::Json)
        );
        assert_eq!(request.user_text(), "hello");
    }

    #[test]
    fn test_user_text_skips_assistant_turns() {
        let request = CompletionRequest::user("first")
            .with_message(Message::assistant("{}"))
            .with_message(Message::user("second"));
        assert_eq!(request.user_text(), "first\n\nsecond");
    }
}
