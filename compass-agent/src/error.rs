//! Pipeline error type.

use mood_schema::FieldViolation;
use serde::{Deserialize, Serialize};

use crate::backend::LlmError;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Error returned by every pipeline entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PipelineError {
    /// Caller input rejected before any backend call
    #[error("Invalid input: {0}")]
    Input(String),

    /// Backend call failed after transport retries
    #[error("Extraction transport error: {message}")]
    Transport { retryable: bool, message: String },

    /// Every validation attempt produced a non-conforming record
    #[error("Validation exhausted after {attempts} attempt(s): {}", summarize(.violations))]
    ValidationExhausted {
        attempts: u32,
        last_raw_output: String,
        violations: Vec<FieldViolation>,
    },

    /// Invalid settings or missing credentials
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    /// Whether the failure was classified as transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Transport { retryable: true, .. })
    }

    /// Build a transport error from a caller-imposed deadline.
    pub fn timeout(what: &str, after_ms: u64) -> Self {
        PipelineError::Transport {
            retryable: true,
            message: format!("{} timed out after {}ms", what, after_ms),
        }
    }
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        PipelineError::Transport {
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
