//! OpenAI-compatible chat-completions backend.
//!
//! Speaks `POST {base_url}/chat/completions` and so covers the hosted
//! OpenAI API as well as local servers such as vLLM and Ollama.

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use super::traits::*;

/// Default OpenAI API endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Default local Ollama endpoint.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

const HOSTED_CAPABILITIES: ModelCapabilities = ModelCapabilities {
    max_output_tokens: 16_384,
    supports_json_schema: true,
};

// Ollama accepts `json_object` but ignores attached schemas.
const LOCAL_CAPABILITIES: ModelCapabilities = ModelCapabilities {
    max_output_tokens: 2048,
    supports_json_schema: false,
};

/// Backend for any server implementing the chat-completions API.
pub struct OpenAiBackend {
    client: Client,
    endpoint: String,
    model: String,
    capabilities: ModelCapabilities,
}

impl OpenAiBackend {
    /// Create a backend for `model` at `base_url`.
    ///
    /// The bearer token, when given, is installed as a default header on
    /// the pooled client.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            let mut bearer = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|_| LlmError::Authentication("API key is not a valid header value".into()))?;
            bearer.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, bearer);
        }

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::Unavailable(format!("HTTP client setup failed: {}", e)))?;

        let base = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base),
            model: model.into(),
            capabilities: HOSTED_CAPABILITIES,
        })
    }

    /// Local Ollama server on its default port.
    pub fn ollama(model: &str) -> Result<Self, LlmError> {
        Ok(Self::new(OLLAMA_BASE_URL, model, None)?.with_capabilities(LOCAL_CAPABILITIES))
    }

    /// Hosted OpenAI API.
    pub fn openai(model: &str, api_key: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(OPENAI_BASE_URL, model, Some(api_key.into()))
    }

    /// Override the advertised capabilities.
    pub fn with_capabilities(mut self, capabilities: ModelCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Pick the strongest output constraint the server supports.
    fn wire_format(&self, format: &ResponseFormat) -> WireFormat {
        match (&format.format_type, &format.schema) {
            (ResponseFormatType::Text, _) => WireFormat::Text,
            (ResponseFormatType::JsonSchema, Some(schema)) if self.capabilities.supports_json_schema => {
                let name = schema
                    .get("title")
                    .and_then(|t| t.as_str())
                    .unwrap_or("response")
                    .to_string();
                WireFormat::JsonSchema {
                    json_schema: NamedSchema {
                        name,
                        schema: schema.clone(),
                    },
                }
            }
            _ => WireFormat::JsonObject,
        }
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> ChatBody<'a> {
        let system = request
            .system_prompt
            .as_deref()
            .map(|content| WireMessage {
                role: "system",
                content,
            });
        let turns = request.messages.iter().map(|m| WireMessage {
            role: match m.role {
                MessageRole::System => "system",
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
            },
            content: &m.content,
        });

        ChatBody {
            model: &self.model,
            messages: system.into_iter().chain(turns).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.response_format.as_ref().map(|f| self.wire_format(f)),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireFormat>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireFormat {
    Text,
    JsonObject,
    JsonSchema { json_schema: NamedSchema },
}

#[derive(Debug, Serialize)]
struct NamedSchema {
    name: String,
    schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl ChatReply {
    fn into_completion(self) -> Result<CompletionResponse, LlmError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError("reply has no choices".to_string()))?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("content_filter") => {
                return Err(LlmError::ContentFiltered {
                    reason: "content_filter".to_string(),
                })
            }
            Some("length") => FinishReason::Length,
            _ => FinishReason::Stop,
        };

        let usage = self.usage.unwrap_or_default();
        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason,
            usage: Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            },
        })
    }
}

/// Map a failed HTTP response to an error, reading `Retry-After` if present.
///
/// A `Retry-After` too large to express in milliseconds is dropped.
pub(crate) async fn error_from_response(response: Response) -> LlmError {
    let status = response.status().as_u16();
    let retry_after_ms = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .and_then(|secs| secs.checked_mul(1000));
    let body = response.text().await.unwrap_or_default();
    LlmError::from_status(status, body, retry_after_ms)
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.body(&request))
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response
            .json::<ChatReply>()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?
            .into_completion()
    }

    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }
}
