//! Prompt composition for extraction requests.
//!
//! Builds one [`CompletionRequest`] from a task, the schema the answer must
//! satisfy and, on a retry, the violations found in the previous answer.
//! Composition is pure: the same inputs always produce the same request.

use mood_schema::{FieldViolation, MoodRecord, SchemaDescriptor};
use sha2::{Digest, Sha256};

use crate::backend::traits::{CompletionRequest, Message};
use crate::error::PipelineError;

/// What the model is asked to extract.
#[derive(Debug, Clone, Copy)]
pub enum PromptTask<'a> {
    /// Mood analysis of a journal entry
    Analyze { journal: &'a str },
    /// Book and movie suggestions for a validated mood record
    Recommend {
        record: &'a MoodRecord,
        movies: usize,
        books: usize,
    },
}

impl PromptTask<'_> {
    fn instruction(&self) -> String {
        match self {
            PromptTask::Analyze { .. } => "Your task is to read the user's journal entry, \
                 determine their overall mood and energy level, explain briefly why the \
                 text suggests that mood, and give two practical health and wellness tips \
                 tailored to it."
                .to_string(),
            PromptTask::Recommend { movies, books, .. } => {
                let mut wanted = Vec::new();
                if *movies > 0 {
                    wanted.push(format!("exactly {} {}", movies, plural(*movies, "movie")));
                }
                if *books > 0 {
                    wanted.push(format!("exactly {} {}", books, plural(*books, "book")));
                }
                format!(
                    "Your task is to suggest {} suited to the mood record below. \
                     Give each suggestion a title, its kind, and a one-sentence reason \
                     it fits the mood.",
                    wanted.join(" and ")
                )
            }
        }
    }

    fn subject(&self) -> String {
        match self {
            PromptTask::Analyze { journal } => format!(
                "Analyze my current situation and provide advice based on this journal entry:\n\n{}",
                journal
            ),
            PromptTask::Recommend { record, .. } => {
                format!("Mood record:\n\n{}", record.render_context())
            }
        }
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        noun.to_string()
    } else {
        format!("{}s", noun)
    }
}

/// Composes extraction requests.
#[derive(Debug, Clone, Default)]
pub struct PromptComposer {
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl PromptComposer {
    /// Create a composer with the given sampling settings.
    pub fn new(temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }

    /// Build the request for one attempt.
    ///
    /// `correction` carries the previous attempt's violations; when present
    /// a corrective clause listing each of them is appended.
    pub fn compose(
        &self,
        task: &PromptTask<'_>,
        schema: &SchemaDescriptor,
        correction: Option<&[FieldViolation]>,
    ) -> Result<CompletionRequest, PipelineError> {
        if let PromptTask::Analyze { journal } = task {
            if journal.trim().is_empty() {
                return Err(PipelineError::Input("journal text is empty".to_string()));
            }
        }

        let mut request = CompletionRequest::user(task.subject())
            .with_system(Self::system_prompt(task, schema))
            .with_json_schema(schema.to_json_schema());

        if let Some(violations) = correction.filter(|v| !v.is_empty()) {
            request = request.with_message(Message::user(Self::correction_clause(violations)));
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        Ok(request)
    }

    fn system_prompt(task: &PromptTask<'_>, schema: &SchemaDescriptor) -> String {
        let mut prompt = String::new();

        prompt.push_str("# ROLE\n\n");
        prompt.push_str("You are an empathetic wellness assistant. ");
        prompt.push_str(&task.instruction());
        prompt.push_str("\n\n## OUTPUT FORMAT\n\n");
        prompt.push_str("Respond with a single JSON object and nothing else. ");
        prompt.push_str("Do not wrap it in code fences or add commentary.\n");
        prompt.push_str("The object must strictly follow this schema:\n\n");
        prompt.push_str(&schema.render_prompt());

        prompt
    }

    fn correction_clause(violations: &[FieldViolation]) -> String {
        let mut clause = String::new();

        clause.push_str("## Correction\n\n");
        clause.push_str("Your previous response was rejected. ");
        clause.push_str("Fix every problem below and return the complete JSON object again:\n\n");
        for violation in violations {
            clause.push_str(&format!("- {}\n", violation));
        }

        clause
    }
}

/// SHA-256 of the serialized request, hex encoded.
pub fn fingerprint(request: &CompletionRequest) -> String {
    let bytes = serde_json::to_vec(request).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mood_schema::{Mood, RecommendationSet, ViolationKind};

    fn record() -> MoodRecord {
        MoodRecord {
            overall_mood: Mood::Anxious,
            energy_level: 3,
            mood_summary: "Worried about the exam.".to_string(),
            health_tip_1: "Try box breathing.".to_string(),
            health_tip_2: "Take short study breaks.".to_string(),
        }
    }

    #[test]
    fn test_compose_is_deterministic() {
        let composer = PromptComposer::new(Some(0.4), Some(1024));
        let task = PromptTask::Analyze {
            journal: "Long day, but the walk helped.",
        };
        let schema = MoodRecord::schema();

        let a = composer.compose(&task, &schema, None).unwrap();
        let b = composer.compose(&task, &schema, None).unwrap();

        assert_eq!(serde_json::to_vec(&a).unwrap(), serde_json::to_vec(&b).unwrap());
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn test_journal_text_is_verbatim() {
        let journal = "  I can't focus.\n\"Deadlines\" everywhere.  ";
        let request = PromptComposer::default()
            .compose(&PromptTask::Analyze { journal }, &MoodRecord::schema(), None)
            .unwrap();
        assert!(request.user_text().contains(journal));
    }

    #[test]
    fn test_system_prompt_carries_schema() {
        let request = PromptComposer::default()
            .compose(&PromptTask::Analyze { journal: "ok" }, &MoodRecord::schema(), None)
            .unwrap();
        let system = request.system_prompt.unwrap();
        assert!(system.contains("empathetic wellness assistant"));
        assert!(system.contains("single JSON object"));
        for name in MoodRecord::schema().field_names() {
            assert!(system.contains(name));
        }
        assert!(request.response_format.unwrap().schema.is_some());
    }

    #[test]
    fn test_empty_journal_rejected() {
        let err = PromptComposer::default()
            .compose(&PromptTask::Analyze { journal: " \n\t" }, &MoodRecord::schema(), None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));
    }

    #[test]
    fn test_correction_lists_every_violation() {
        let violations = vec![
            FieldViolation::new("overall_mood", ViolationKind::Missing, None),
            FieldViolation::new(
                "energy_level",
                ViolationKind::OutOfRange { min: 1, max: 10 },
                Some(&serde_json::json!(15)),
            ),
        ];
        let request = PromptComposer::default()
            .compose(
                &PromptTask::Analyze { journal: "fine" },
                &MoodRecord::schema(),
                Some(&violations),
            )
            .unwrap();

        assert_eq!(request.messages.len(), 2);
        let clause = &request.messages[1].content;
        assert!(clause.starts_with("## Correction"));
        let mood_at = clause.find("overall_mood").unwrap();
        let energy_at = clause.find("energy_level").unwrap();
        assert!(mood_at < energy_at);
        assert!(clause.contains("(got 15)"));
    }

    #[test]
    fn test_recommend_prompt_uses_record_not_journal() {
        let task = PromptTask::Recommend {
            record: &record(),
            movies: 2,
            books: 0,
        };
        let request = PromptComposer::default()
            .compose(&task, &RecommendationSet::schema(2, 0), None)
            .unwrap();

        let system = request.system_prompt.as_deref().unwrap();
        assert!(system.contains("exactly 2 movies"));
        assert!(!system.contains("exactly 0"));
        assert!(request.user_text().contains("overall_mood: Anxious"));
    }
}
