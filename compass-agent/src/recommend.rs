//! Recommendation mapper: books and movies for a validated mood record.

use mood_schema::{MoodRecord, RecommendationSet, MAX_PER_KIND};

use crate::error::PipelineError;
use crate::prompt::PromptTask;
use crate::repair::{Extracted, RepairLoop};

/// Movie and book counts the recommendation schema can express.
///
/// Each kind is at most `MAX_PER_KIND` and at least one item is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommendationCounts {
    movies: usize,
    books: usize,
}

impl RecommendationCounts {
    pub fn new(movies: usize, books: usize) -> Result<Self, PipelineError> {
        if movies > MAX_PER_KIND || books > MAX_PER_KIND {
            return Err(PipelineError::Input(format!(
                "at most {} recommendations of each kind may be requested (got {} movies, {} books)",
                MAX_PER_KIND, movies, books
            )));
        }
        if movies + books == 0 {
            return Err(PipelineError::Input(
                "at least one movie or book must be requested".to_string(),
            ));
        }
        Ok(Self { movies, books })
    }

    pub fn movies(&self) -> usize {
        self.movies
    }

    pub fn books(&self) -> usize {
        self.books
    }
}

/// Runs the second extraction, seeded only by the mood record.
pub struct RecommendationMapper<'a> {
    repair: RepairLoop<'a>,
}

impl<'a> RecommendationMapper<'a> {
    /// Create a mapper over a repair loop.
    pub fn new(repair: RepairLoop<'a>) -> Self {
        Self { repair }
    }

    /// Extract exactly the requested movies and books for `record`.
    pub async fn map(
        &self,
        record: &MoodRecord,
        counts: RecommendationCounts,
    ) -> Result<Extracted<RecommendationSet>, PipelineError> {
        let schema = RecommendationSet::schema(counts.movies, counts.books);
        let task = PromptTask::Recommend {
            record,
            movies: counts.movies,
            books: counts.books,
        };
        self.repair.run(&task, &schema).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::client::ExtractionClient;
    use crate::config::PipelineConfig;
    use crate::prompt::PromptComposer;
    use mood_schema::{Mood, RecommendationKind};
    use std::sync::Arc;

    fn record() -> MoodRecord {
        MoodRecord {
            overall_mood: Mood::Sad,
            energy_level: 2,
            mood_summary: "Missing home.".to_string(),
            health_tip_1: "Call a friend.".to_string(),
            health_tip_2: "Get some daylight.".to_string(),
        }
    }

    #[test]
    fn test_count_bounds() {
        let counts = RecommendationCounts::new(1, 0).unwrap();
        assert_eq!((counts.movies(), counts.books()), (1, 0));
        assert!(RecommendationCounts::new(5, 5).is_ok());
        assert!(matches!(RecommendationCounts::new(0, 0), Err(PipelineError::Input(_))));
        assert!(matches!(RecommendationCounts::new(6, 1), Err(PipelineError::Input(_))));
    }

    #[tokio::test]
    async fn test_map_returns_requested_counts() {
        let backend = Arc::new(MockBackend::default().then_reply(
            r#"{"recommendations": [
                {"title": "Paddington 2", "kind": "movie", "rationale": "Kind and funny."},
                {"title": "A Man Called Ove", "kind": "book", "rationale": "Warm about loss."}
            ]}"#,
        ));
        let client = ExtractionClient::new(backend.clone(), PipelineConfig::default());
        let composer = PromptComposer::default();
        let mapper = RecommendationMapper::new(RepairLoop::new(&client, &composer, 2).unwrap());

        let counts = RecommendationCounts::new(1, 1).unwrap();
        let extracted = mapper.map(&record(), counts).await.unwrap();
        assert_eq!(extracted.attempts, 1);
        assert_eq!(extracted.record.of_kind(RecommendationKind::Movie).count(), 1);

        let request = &backend.requests()[0];
        assert!(request.user_text().contains("Missing home."));
    }
}
