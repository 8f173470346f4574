//! MoodCompass - main entry point for mood analysis.
//!
//! This service runs the structured extraction pipeline over one backend.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};

use crate::backend::traits::LlmBackend;
use crate::client::ExtractionClient;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::prompt::{PromptComposer, PromptTask};
use crate::recommend::{RecommendationCounts, RecommendationMapper};
use crate::repair::{Extracted, RepairLoop};
use crate::types::{
    AnalyzeOptions, RecommendOptions, RecommendationOutcome, ReportOptions, WellnessReport,
};
use mood_schema::{MoodRecord, RecommendationSet};

/// Main entry point for mood analysis and recommendations.
///
/// Holds read-only configuration and a shared backend handle; every call is
/// independent.
pub struct MoodCompass {
    /// Configuration
    config: PipelineConfig,
    /// Backend wrapper with transport retry
    client: ExtractionClient,
    /// Request builder
    composer: PromptComposer,
}

impl MoodCompass {
    /// Create a new service over `backend` with default configuration.
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        let config = PipelineConfig::default();
        Self {
            client: ExtractionClient::new(backend, config.clone()),
            composer: PromptComposer::new(config.temperature, config.max_tokens),
            config,
        }
    }

    /// Create with configuration.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.client = ExtractionClient::new(self.client.backend(), config.clone());
        self.composer = PromptComposer::new(config.temperature, config.max_tokens);
        self.config = config;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Identifier of the backend in use.
    pub fn backend_id(&self) -> &str {
        self.client.backend_id()
    }

    /// Extract a validated mood record from a journal entry.
    pub async fn analyze(
        &self,
        journal_text: &str,
        options: &AnalyzeOptions,
    ) -> Result<MoodRecord, PipelineError> {
        let invocation_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("analyze", %invocation_id);
        let deadline = self.deadline();
        self.within(deadline, self.analyze_inner(journal_text, options.max_attempts))
            .instrument(span)
            .await
            .map(|extracted| extracted.record)
    }

    /// Suggest books and movies for a validated mood record.
    pub async fn recommend(
        &self,
        record: &MoodRecord,
        options: &RecommendOptions,
    ) -> Result<RecommendationSet, PipelineError> {
        let counts = RecommendationCounts::new(options.movies, options.books)?;
        let invocation_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("recommend", %invocation_id);
        let deadline = self.deadline();
        self.within(deadline, self.recommend_inner(record, counts, options.max_attempts))
            .instrument(span)
            .await
            .map(|extracted| extracted.record)
    }

    /// Analyze a journal entry and, if asked, recommend content for it.
    ///
    /// Fails only when mood analysis fails. A recommendation failure is
    /// carried inside the report next to the valid mood record. Both stages
    /// share one invocation deadline.
    pub async fn report(
        &self,
        journal_text: &str,
        options: &ReportOptions,
    ) -> Result<WellnessReport, PipelineError> {
        let invocation_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("report", %invocation_id);
        self.report_inner(invocation_id.clone(), journal_text, options)
            .instrument(span)
            .await
    }

    async fn report_inner(
        &self,
        invocation_id: String,
        journal_text: &str,
        options: &ReportOptions,
    ) -> Result<WellnessReport, PipelineError> {
        let counts = options
            .wants_recommendations()
            .then(|| RecommendationCounts::new(options.movies, options.books))
            .transpose()?;
        let deadline = self.deadline();

        let mood = self
            .within(deadline, self.analyze_inner(journal_text, options.max_attempts))
            .await?;

        let recommendations = match counts {
            Some(counts) => {
                let stage = self.recommend_inner(&mood.record, counts, options.max_attempts);
                match self.within(deadline, stage).await {
                    Ok(extracted) => RecommendationOutcome::Ready {
                        set: extracted.record,
                        attempts: extracted.attempts,
                    },
                    Err(error) => {
                        warn!(error = %error, "Recommendations failed, keeping mood record");
                        RecommendationOutcome::Failed { error }
                    }
                }
            }
            None => RecommendationOutcome::NotRequested,
        };

        info!(
            mood = %mood.record.overall_mood,
            energy = mood.record.energy_level,
            "Report ready"
        );

        Ok(WellnessReport {
            invocation_id,
            mood: mood.record,
            mood_attempts: mood.attempts,
            recommendations,
            generated_at: Utc::now(),
        })
    }

    async fn analyze_inner(
        &self,
        journal_text: &str,
        max_attempts: Option<u32>,
    ) -> Result<Extracted<MoodRecord>, PipelineError> {
        let config = self.effective_config(max_attempts)?;

        info!(
            backend = %self.client.backend_id(),
            chars = journal_text.chars().count(),
            "Analyzing journal entry"
        );

        let repair = RepairLoop::new(&self.client, &self.composer, config.max_attempts)?;
        let task = PromptTask::Analyze {
            journal: journal_text,
        };
        repair.run(&task, &MoodRecord::schema()).await
    }

    async fn recommend_inner(
        &self,
        record: &MoodRecord,
        counts: RecommendationCounts,
        max_attempts: Option<u32>,
    ) -> Result<Extracted<RecommendationSet>, PipelineError> {
        let config = self.effective_config(max_attempts)?;

        info!(
            backend = %self.client.backend_id(),
            movies = counts.movies(),
            books = counts.books(),
            "Requesting recommendations"
        );

        let repair = RepairLoop::new(&self.client, &self.composer, config.max_attempts)?;
        RecommendationMapper::new(repair).map(record, counts).await
    }

    fn effective_config(&self, max_attempts: Option<u32>) -> Result<PipelineConfig, PipelineError> {
        let mut config = self.config.clone();
        if let Some(n) = max_attempts {
            config.max_attempts = n;
        }
        config.validate()?;
        Ok(config)
    }

    fn deadline(&self) -> Option<Instant> {
        self.config
            .invocation_timeout_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms))
    }

    async fn within<T>(
        &self,
        deadline: Option<Instant>,
        fut: impl Future<Output = Result<T, PipelineError>>,
    ) -> Result<T, PipelineError> {
        let Some(at) = deadline else {
            return fut.await;
        };
        let after_ms = self.config.invocation_timeout_ms.unwrap_or_default();
        tokio::time::timeout_at(at, fut)
            .await
            .map_err(|_| PipelineError::timeout("invocation", after_ms))?
    }
}
