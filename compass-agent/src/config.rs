//! Configuration for the extraction pipeline and its backend.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::gemini::DEFAULT_GEMINI_MODEL;
use crate::backend::{GeminiBackend, LlmBackend, OpenAiBackend};
use crate::error::PipelineError;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A setting is out of its valid range
    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Provider needs a credential that was not supplied
    #[error("Missing API key for provider {0}")]
    MissingCredential(Provider),

    /// Unknown provider name
    #[error("Unknown provider `{0}` (expected gemini, openai or ollama)")]
    UnknownProvider(String),

    /// YAML could not be read or written
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Backend could not be constructed
    #[error("Backend construction failed: {0}")]
    Backend(String),
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Configuration(err.to_string())
    }
}

/// Whole-application configuration, as stored in a YAML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompassConfig {
    /// Loop and timeout settings
    pub pipeline: PipelineConfig,
    /// Which model service to call
    pub backend: BackendConfig,
}

impl CompassConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Serialize to YAML. The API key is never written.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Loop bounds, timeouts and sampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Validation attempts per extraction (>= 1)
    pub max_attempts: u32,
    /// Backend tries per attempt for transient failures (>= 1)
    pub transport_attempts: u32,
    /// Pause between transport tries (ms)
    pub retry_delay_ms: u64,
    /// Upper bound on a server-requested Retry-After (ms)
    pub max_retry_delay_ms: u64,
    /// Deadline for one backend call (ms)
    pub call_timeout_ms: u64,
    /// Deadline for a whole analyze, recommend or report (ms). In a report
    /// both stages share it; running out during recommendations keeps the
    /// mood record.
    pub invocation_timeout_ms: Option<u64>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Output token limit
    pub max_tokens: Option<u32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            transport_attempts: 3,
            retry_delay_ms: 500,
            max_retry_delay_ms: 10_000,
            call_timeout_ms: 30_000,
            invocation_timeout_ms: Some(120_000),
            temperature: Some(0.4),
            max_tokens: Some(1024),
        }
    }
}

impl PipelineConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.transport_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "transport_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "call_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.invocation_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "invocation_timeout_ms",
                reason: "must be positive when set".to_string(),
            });
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::Invalid {
                    field: "temperature",
                    reason: format!("{} is outside 0.0-2.0", t),
                });
            }
        }
        Ok(())
    }

    /// Per-call deadline.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Pause before the next transport try.
    ///
    /// A server-supplied delay wins over the fixed one, capped at
    /// `max_retry_delay_ms`.
    pub fn retry_delay(&self, requested_ms: Option<u64>) -> Duration {
        let ms = requested_ms
            .map(|r| r.min(self.max_retry_delay_ms))
            .unwrap_or(self.retry_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Supported model services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Gemini
    #[default]
    Gemini,
    /// OpenAI or any compatible server
    OpenAi,
    /// Local Ollama
    Ollama,
}

impl Provider {
    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => DEFAULT_GEMINI_MODEL,
            Provider::OpenAi => "gpt-4o-mini",
            Provider::Ollama => "llama3.2",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Provider::Gemini => Some("GEMINI_API_KEY"),
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Ollama => None,
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
            Provider::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            "ollama" => Ok(Provider::Ollama),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// Backend selection and credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Model service
    pub provider: Provider,
    /// Model name; provider default when unset
    pub model: Option<String>,
    /// Endpoint override
    pub base_url: Option<String>,
    /// API key; never serialized
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl BackendConfig {
    /// Config for `provider` with its default model.
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            ..Default::default()
        }
    }

    /// Effective model name.
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Construct the backend this config describes.
    pub fn build(&self) -> Result<Arc<dyn LlmBackend>, ConfigError> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());
        let backend_err = |e: crate::backend::LlmError| ConfigError::Backend(e.to_string());

        let backend: Arc<dyn LlmBackend> = match self.provider {
            Provider::Gemini => {
                let key = api_key.ok_or(ConfigError::MissingCredential(self.provider))?;
                let mut backend = GeminiBackend::new(self.model(), key).map_err(backend_err)?;
                if let Some(url) = &self.base_url {
                    backend = backend.with_base_url(url.as_str());
                }
                Arc::new(backend)
            }
            Provider::OpenAi => {
                let key = api_key.ok_or(ConfigError::MissingCredential(self.provider))?;
                let backend = match &self.base_url {
                    Some(url) => OpenAiBackend::new(url.as_str(), self.model(), Some(key.to_string())),
                    None => OpenAiBackend::openai(self.model(), key),
                }
                .map_err(backend_err)?;
                Arc::new(backend)
            }
            Provider::Ollama => {
                let mut backend = OpenAiBackend::ollama(self.model()).map_err(backend_err)?;
                if let Some(url) = &self.base_url {
                    let capabilities = backend.capabilities().clone();
                    backend = OpenAiBackend::new(url.as_str(), self.model(), api_key.map(String::from))
                        .map_err(backend_err)?
                        .with_capabilities(capabilities);
                }
                Arc::new(backend)
            }
        };

        Ok(backend)
    }
}
