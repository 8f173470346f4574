//! Options and report types for the public entry points.

use chrono::{DateTime, Utc};
use mood_schema::{MoodRecord, RecommendationSet};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Options for [`MoodCompass::analyze`](crate::MoodCompass::analyze).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeOptions {
    /// Overrides the configured validation attempt bound
    pub max_attempts: Option<u32>,
}

/// Options for [`MoodCompass::recommend`](crate::MoodCompass::recommend).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendOptions {
    /// Overrides the configured validation attempt bound
    pub max_attempts: Option<u32>,
    /// Movies to suggest (0-5)
    pub movies: usize,
    /// Books to suggest (0-5)
    pub books: usize,
}

impl RecommendOptions {
    /// Options asking for `movies` movies and `books` books.
    pub fn new(movies: usize, books: usize) -> Self {
        Self {
            max_attempts: None,
            movies,
            books,
        }
    }
}

/// Options for [`MoodCompass::report`](crate::MoodCompass::report).
///
/// With both counts at zero no recommendations are requested.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportOptions {
    /// Overrides the configured validation attempt bound for both stages
    pub max_attempts: Option<u32>,
    /// Movies to suggest (0-5)
    pub movies: usize,
    /// Books to suggest (0-5)
    pub books: usize,
}

impl ReportOptions {
    /// Whether the report should include recommendations.
    pub fn wants_recommendations(&self) -> bool {
        self.movies + self.books > 0
    }
}

/// Result of the recommendation stage inside a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendationOutcome {
    /// No movies or books were asked for
    NotRequested,
    /// Recommendations validated
    Ready { set: RecommendationSet, attempts: u32 },
    /// Recommendation stage failed; the mood record is unaffected
    Failed { error: PipelineError },
}

impl RecommendationOutcome {
    /// The set, when ready.
    pub fn set(&self) -> Option<&RecommendationSet> {
        match self {
            RecommendationOutcome::Ready { set, .. } => Some(set),
            _ => None,
        }
    }

    /// The error, when failed.
    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            RecommendationOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Mood analysis plus recommendations for one journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct WellnessReport {
    /// Identifier for log correlation
    pub invocation_id: String,
    /// Validated mood record
    pub mood: MoodRecord,
    /// Validation attempts the mood record took
    pub mood_attempts: u32,
    /// Recommendation stage result
    pub recommendations: RecommendationOutcome,
    /// When the report was produced (RFC 3339)
    #[cfg_attr(feature = "typescript", ts(type = "string"))]
    pub generated_at: DateTime<Utc>,
}

impl WellnessReport {
    /// Positivity score of the detected mood.
    pub fn mood_score(&self) -> u8 {
        self.mood.overall_mood.score()
    }
}
