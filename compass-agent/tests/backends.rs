//! HTTP-level tests for the Gemini and OpenAI-compatible backends.

use std::sync::Arc;

use compass_agent::{
    AnalyzeOptions, CompletionRequest, GeminiBackend, LlmBackend, LlmError, Mood, MoodCompass,
    MoodRecord, OpenAiBackend, PipelineConfig, PipelineError,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GEMINI_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

const VALID_MOOD: &str = r#"{"overall_mood": "Calm", "energy_level": 7,
    "mood_summary": "A slow Sunday with friends.",
    "health_tip_1": "Keep the phone in another room at dinner.",
    "health_tip_2": "Plan one more quiet evening this week."}"#;

fn gemini(server: &MockServer) -> GeminiBackend {
    GeminiBackend::new("gemini-2.5-flash", "test-key")
        .unwrap()
        .with_base_url(format!("{}/v1beta", server.uri()))
}

fn openai(server: &MockServer) -> OpenAiBackend {
    OpenAiBackend::new(
        format!("{}/v1", server.uri()),
        "gpt-4o-mini",
        Some("sk-test".to_string()),
    )
    .unwrap()
}

fn gemini_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 310, "candidatesTokenCount": 64}
    })
}

fn openai_reply(text: &str) -> serde_json::Value {
    json!({
        "choices": [{"message": {"role": "assistant", "content": text}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 290, "completion_tokens": 60}
    })
}

fn quick_config() -> PipelineConfig {
    PipelineConfig {
        retry_delay_ms: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_gemini_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseJsonSchema": MoodRecord::schema().to_json_schema()
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(VALID_MOOD)))
        .expect(1)
        .mount(&server)
        .await;

    let compass = MoodCompass::new(Arc::new(gemini(&server))).with_config(quick_config());
    let record = compass
        .analyze("Lazy Sunday brunch with friends.", &AnalyzeOptions::default())
        .await
        .unwrap();

    assert_eq!(record.overall_mood, Mood::Calm);
    assert_eq!(record.energy_level, 7);
}

#[tokio::test]
async fn test_gemini_invalid_key_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT",
                "details": [{"reason": "API_KEY_INVALID"}]
            }
        })))
        .expect(2)
        .mount(&server)
        .await;

    let err = gemini(&server)
        .complete(CompletionRequest::user("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Authentication(_)));

    let compass = MoodCompass::new(Arc::new(gemini(&server))).with_config(quick_config());
    let err = compass
        .analyze("hello", &AnalyzeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Transport { retryable: false, .. }));
}

#[tokio::test]
async fn test_gemini_rate_limit_retried_to_bound() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(3)
        .mount(&server)
        .await;

    let compass = MoodCompass::new(Arc::new(gemini(&server))).with_config(quick_config());
    let err = compass
        .analyze("hello", &AnalyzeOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(err.to_string().contains("Rate limited"));
}

#[tokio::test]
async fn test_gemini_blocked_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let err = gemini(&server)
        .complete(CompletionRequest::user("hi"))
        .await
        .unwrap_err();
    assert!(matches!(&err, LlmError::ContentFiltered { reason } if reason == "SAFETY"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_openai_sends_json_schema() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "response_format": {"type": "json_schema", "json_schema": {"name": "MoodRecord"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(VALID_MOOD)))
        .expect(1)
        .mount(&server)
        .await;

    let compass = MoodCompass::new(Arc::new(openai(&server))).with_config(quick_config());
    let record = compass
        .analyze("Lazy Sunday brunch with friends.", &AnalyzeOptions::default())
        .await
        .unwrap();
    assert_eq!(record.health_tip_1, "Keep the phone in another room at dinner.");
}

#[tokio::test]
async fn test_openai_server_error_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(VALID_MOOD)))
        .mount(&server)
        .await;

    let compass = MoodCompass::new(Arc::new(openai(&server))).with_config(quick_config());
    let record = compass
        .analyze("Lazy Sunday brunch with friends.", &AnalyzeOptions::default())
        .await
        .unwrap();

    assert_eq!(record.overall_mood, Mood::Calm);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_openai_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = openai(&server)
        .complete(CompletionRequest::user("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Authentication(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_oversized_retry_after_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "18446744073709552"))
        .expect(2)
        .mount(&server)
        .await;

    let err = openai(&server)
        .complete(CompletionRequest::user("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::RateLimited { retry_after_ms: None }));

    let config = PipelineConfig {
        transport_attempts: 1,
        ..quick_config()
    };
    let compass = MoodCompass::new(Arc::new(openai(&server))).with_config(config);
    let err = compass
        .analyze("hello", &AnalyzeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Transport { retryable: true, .. }));
}
