//! Mood and recommendation records, and the schemas that describe them.

use serde::{Deserialize, Serialize};

use crate::descriptor::{Constraint, FieldDescriptor, SchemaDescriptor};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Lowest accepted energy level.
pub const ENERGY_MIN: i64 = 1;
/// Highest accepted energy level.
pub const ENERGY_MAX: i64 = 10;

/// Most recommendations of one kind a caller may ask for.
pub const MAX_PER_KIND: usize = 5;

/// Primary emotion detected in a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum Mood {
    Joyful,
    Happy,
    Calm,
    Neutral,
    Anxious,
    Stressed,
    Sad,
    Angry,
    Frustrated,
}

impl Mood {
    /// Every label, in the order shown to the model.
    pub const LABELS: &'static [&'static str] = &[
        "Joyful",
        "Happy",
        "Calm",
        "Neutral",
        "Anxious",
        "Stressed",
        "Sad",
        "Angry",
        "Frustrated",
    ];

    /// Every variant, in label order.
    pub const ALL: [Mood; 9] = [
        Mood::Joyful,
        Mood::Happy,
        Mood::Calm,
        Mood::Neutral,
        Mood::Anxious,
        Mood::Stressed,
        Mood::Sad,
        Mood::Angry,
        Mood::Frustrated,
    ];

    /// Label as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Joyful => "Joyful",
            Mood::Happy => "Happy",
            Mood::Calm => "Calm",
            Mood::Neutral => "Neutral",
            Mood::Anxious => "Anxious",
            Mood::Stressed => "Stressed",
            Mood::Sad => "Sad",
            Mood::Angry => "Angry",
            Mood::Frustrated => "Frustrated",
        }
    }

    /// Positivity score for trend charts, 1 (low) to 5 (high).
    pub fn score(&self) -> u8 {
        match self {
            Mood::Joyful => 5,
            Mood::Happy => 4,
            Mood::Calm | Mood::Neutral => 3,
            Mood::Anxious | Mood::Stressed => 2,
            Mood::Sad | Mood::Angry | Mood::Frustrated => 1,
        }
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured wellness record extracted from a journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct MoodRecord {
    /// Primary emotional state
    pub overall_mood: Mood,
    /// Energy level, 1 (drained) to 10 (energized)
    pub energy_level: u8,
    /// Why the entry suggests this mood
    pub mood_summary: String,
    /// First practical wellness tip
    pub health_tip_1: String,
    /// Second, complementary tip
    pub health_tip_2: String,
}

impl MoodRecord {
    /// Schema every mood record must satisfy.
    pub fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new(
            "MoodRecord",
            vec![
                FieldDescriptor::label(
                    "overall_mood",
                    Mood::LABELS,
                    "The primary emotional state derived from the journal entry.",
                ),
                FieldDescriptor::integer(
                    "energy_level",
                    "How energized the writer seems, from 1 (drained) to 10 (highly energized).",
                )
                .range(ENERGY_MIN, ENERGY_MAX),
                FieldDescriptor::text(
                    "mood_summary",
                    "A brief explanation of why the text suggests this mood.",
                )
                .non_empty(),
                FieldDescriptor::text(
                    "health_tip_1",
                    "A practical first tip for staying healthy given this mood.",
                )
                .non_empty(),
                FieldDescriptor::text(
                    "health_tip_2",
                    "A second, complementary tip for mental or physical wellness.",
                )
                .non_empty(),
            ],
        )
    }

    /// Render the record as context for a follow-up prompt.
    pub fn render_context(&self) -> String {
        format!(
            "- overall_mood: {}\n- energy_level: {}/{}\n- mood_summary: {}\n- health_tip_1: {}\n- health_tip_2: {}\n",
            self.overall_mood,
            self.energy_level,
            ENERGY_MAX,
            self.mood_summary,
            self.health_tip_1,
            self.health_tip_2
        )
    }
}

/// Kind of recommended content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Book,
    Movie,
}

impl RecommendationKind {
    /// Every label.
    pub const LABELS: &'static [&'static str] = &["book", "movie"];

    /// Label as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationKind::Book => "book",
            RecommendationKind::Movie => "movie",
        }
    }
}

/// A single book or movie suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Recommendation {
    pub title: String,
    pub kind: RecommendationKind,
    /// One sentence on why it fits the mood
    pub rationale: String,
}

/// Ordered recommendations for one mood record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct RecommendationSet {
    pub recommendations: Vec<Recommendation>,
}

impl RecommendationSet {
    /// Schema for a set holding exactly `movies` movies and `books` books.
    pub fn schema(movies: usize, books: usize) -> SchemaDescriptor {
        SchemaDescriptor::new(
            "RecommendationSet",
            vec![FieldDescriptor::list(
                "recommendations",
                vec![
                    FieldDescriptor::text("title", "The title of the movie or book.").non_empty(),
                    FieldDescriptor::label(
                        "kind",
                        RecommendationKind::LABELS,
                        "Whether this is a book or a movie.",
                    ),
                    FieldDescriptor::text(
                        "rationale",
                        "A brief, one-sentence reason this fits the writer's mood.",
                    )
                    .non_empty(),
                ],
                "Content suggestions suited to the mood record.",
            )
            .min_items(1)
            .with(Constraint::CountPerValue {
                key: "kind",
                counts: vec![("movie", movies), ("book", books)],
            })],
        )
    }

    /// Number of recommendations.
    pub fn len(&self) -> usize {
        self.recommendations.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }

    /// Recommendations of one kind, in order.
    pub fn of_kind(&self, kind: RecommendationKind) -> impl Iterator<Item = &Recommendation> {
        self.recommendations.iter().filter(move |r| r.kind == kind)
    }
}
