//! Mood Compass Agent - structured mood extraction over LLM backends.
//!
//! This crate turns a free-form journal entry into a validated
//! [`MoodRecord`] and, on request, a [`RecommendationSet`] of books and
//! movies. The model is treated as an unreliable extraction engine: every
//! answer is parsed and checked against its schema, and rejected answers
//! are re-prompted with a corrective clause up to a fixed bound.
//!
//! # Pipeline
//!
//! ```text
//! journal text
//!   -> PromptComposer   (schema + corrective clause)
//!   -> ExtractionClient (per-call timeout, transport retry)
//!   -> RepairLoop       (parse + validate, bounded re-prompt)
//!   -> MoodRecord
//!   -> RecommendationMapper -> ... -> RecommendationSet
//! ```
//!
//! # Example
//!
//! ```ignore
//! use compass_agent::{BackendConfig, MoodCompass, Provider, ReportOptions};
//!
//! let backend = BackendConfig::new(Provider::Gemini).build()?;
//! let compass = MoodCompass::new(backend);
//!
//! let report = compass
//!     .report("Long week, but Friday's hike cleared my head.", &ReportOptions {
//!         movies: 2,
//!         books: 1,
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! println!("{} ({}/10)", report.mood.overall_mood, report.mood.energy_level);
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod prompt;
pub mod recommend;
pub mod repair;
pub mod service;
pub mod types;

pub use backend::{
    CompletionRequest, CompletionResponse, GeminiBackend, LlmBackend, LlmError, MockBackend,
    ModelCapabilities, OpenAiBackend,
};
pub use client::ExtractionClient;
pub use config::{BackendConfig, CompassConfig, ConfigError, PipelineConfig, Provider};
pub use error::PipelineError;
pub use prompt::{fingerprint, PromptComposer, PromptTask};
pub use recommend::{RecommendationCounts, RecommendationMapper};
pub use repair::{ExtractionAttempt, Extracted, RepairLoop};
pub use service::MoodCompass;
pub use types::{
    AnalyzeOptions, RecommendOptions, RecommendationOutcome, ReportOptions, WellnessReport,
};

pub use mood_schema::{
    FieldViolation, Mood, MoodRecord, Recommendation, RecommendationKind, RecommendationSet,
    ViolationKind, ENERGY_MAX, ENERGY_MIN, MAX_PER_KIND,
};
