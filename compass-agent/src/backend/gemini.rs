//! Google Gemini backend.
//!
//! Talks to the Generative Language REST API (`models/{model}:generateContent`).
//! JSON requests set `responseMimeType`, and an attached schema is sent as
//! `responseJsonSchema` so the server constrains decoding to it.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use super::openai::error_from_response;
use super::traits::*;

/// Default Generative Language API endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Model used when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini backend.
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    capabilities: ModelCapabilities,
}

impl GeminiBackend {
    /// Create a backend for `model` using the public endpoint.
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder()
            .build()
            .map_err(|e| LlmError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            capabilities: ModelCapabilities {
                max_output_tokens: 8192,
                supports_json_schema: true,
            },
        })
    }

    /// Point the backend at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(request: &CompletionRequest) -> GenerateRequest {
        let mut system_parts: Vec<Part> = Vec::new();
        if let Some(system) = &request.system_prompt {
            system_parts.push(Part::text(system));
        }

        let mut contents = Vec::new();
        for msg in &request.messages {
            match msg.role {
                MessageRole::System => system_parts.push(Part::text(&msg.content)),
                MessageRole::User => contents.push(Content::new("user", &msg.content)),
                MessageRole::Assistant => contents.push(Content::new("model", &msg.content)),
            }
        }

        let format = request
            .response_format
            .as_ref()
            .filter(|rf| rf.format_type != ResponseFormatType::Text);
        let schema = format.and_then(|rf| match rf.format_type {
            ResponseFormatType::JsonSchema => rf.schema.clone(),
            _ => None,
        });

        GenerateRequest {
            system_instruction: (!system_parts.is_empty()).then(|| Content {
                role: None,
                parts: system_parts,
            }),
            contents,
            generation_config: GenerationConfig {
                response_mime_type: format.map(|_| "application/json".to_string()),
                response_json_schema: schema,
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_json_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn new(role: &str, text: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = Self::build_request(&request);

        let response = self
            .client
            .post(self.generate_url())
            .header(API_KEY_HEADER, &self.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            // Gemini reports a bad key as 400 INVALID_ARGUMENT.
            return Err(match err {
                LlmError::Http { status: 400, body } if body.contains("API_KEY_INVALID") => {
                    LlmError::Authentication(body)
                }
                other => other,
            });
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let Some(candidate) = generated.candidates.into_iter().next() else {
            let reason = generated
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(LlmError::ContentFiltered { reason });
        };

        let finish_reason = match candidate.finish_reason.as_deref() {
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST") | Some("SPII") => {
                FinishReason::ContentFilter
            }
            _ => FinishReason::Stop,
        };

        if finish_reason == FinishReason::ContentFilter {
            return Err(LlmError::ContentFiltered {
                reason: candidate.finish_reason.unwrap_or_default(),
            });
        }

        let content = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = generated
            .usage_metadata
            .map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            finish_reason,
            usage,
        })
    }

    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let backend = GeminiBackend::new(DEFAULT_GEMINI_MODEL, "key")
            .unwrap()
            .with_base_url("http://localhost:9000/v1beta/");
        assert_eq!(
            backend.generate_url(),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let request = CompletionRequest::user("How am I?")
            .with_system("Be kind.")
            .with_message(Message::assistant("{}"))
            .with_temperature(0.4)
            .with_max_tokens(512)
            .with_json_output();

        let body = serde_json::to_value(GeminiBackend::build_request(&request)).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be kind.");
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "How am I?");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
        assert!(body["generationConfig"].get("responseJsonSchema").is_none());
    }

    #[test]
    fn test_schema_sent_as_response_json_schema() {
        let schema = mood_schema::MoodRecord::schema().to_json_schema();
        let request = CompletionRequest::user("Long week.").with_json_schema(schema.clone());

        let body = serde_json::to_value(GeminiBackend::build_request(&request)).unwrap();

        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseJsonSchema"], schema);
        assert_eq!(
            body["generationConfig"]["responseJsonSchema"]["properties"]["energy_level"]["maximum"],
            10
        );
    }

    #[test]
    fn test_plain_text_request_has_no_mime_type() {
        let request = CompletionRequest::user("hi");
        let body = serde_json::to_value(GeminiBackend::build_request(&request)).unwrap();
        assert!(body["generationConfig"].get("responseMimeType").is_none());
        assert!(body.get("systemInstruction").is_none());
    }
}
