//! Mood Compass record schemas.
//!
//! This crate is the single source of truth for what a valid extraction
//! looks like:
//!
//! - [`SchemaDescriptor`]: ordered field table with types and constraints
//! - [`validate`]: generic checker that walks a descriptor over parsed JSON
//! - [`MoodRecord`] / [`RecommendationSet`]: typed records and their schemas
//!
//! The prompt text shown to the model and the checks applied to its answer
//! are both derived from the same descriptor.
//!
//! # Example
//!
//! ```
//! use mood_schema::{parse_record, MoodRecord};
//!
//! let raw = r#"{"overall_mood": "Calm", "energy_level": 6,
//!              "mood_summary": "A quiet, steady day.",
//!              "health_tip_1": "Take a short walk.",
//!              "health_tip_2": "Keep a regular bedtime."}"#;
//!
//! let record: MoodRecord = parse_record(&MoodRecord::schema(), raw).unwrap();
//! assert_eq!(record.energy_level, 6);
//! ```

pub mod descriptor;
pub mod records;
pub mod validate;

pub use descriptor::{Constraint, FieldDescriptor, FieldType, SchemaDescriptor};
pub use records::{
    Mood, MoodRecord, Recommendation, RecommendationKind, RecommendationSet, ENERGY_MAX,
    ENERGY_MIN, MAX_PER_KIND,
};
pub use validate::{
    extract_json, parse_output, parse_record, validate, FieldViolation, ViolationKind, ROOT_PATH,
};
