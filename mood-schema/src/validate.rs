//! Generic validation of model output against a [`SchemaDescriptor`].
//!
//! Validation is total: every field is checked in declaration order and
//! every violation is reported, so the caller either gets a record that
//! satisfies the whole schema or the complete list of what is wrong.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::descriptor::{quoted_list, Constraint, FieldDescriptor, FieldType, SchemaDescriptor};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Path used for violations that concern the whole document.
pub const ROOT_PATH: &str = "$";

/// Longest observed value kept in a violation, in characters.
const MAX_OBSERVED_CHARS: usize = 80;

/// What went wrong with a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// Output could not be parsed as JSON
    #[error("response is not valid JSON ({reason})")]
    Unparseable { reason: String },

    /// Top-level value is not an object
    #[error("response must be a single JSON object")]
    NotAnObject,

    /// Required field absent or null
    #[error("required field is missing")]
    Missing,

    /// Value has the wrong JSON type
    #[error("must be of type {expected}")]
    WrongType { expected: String },

    /// String is empty or whitespace
    #[error("must be a non-empty string")]
    Empty,

    /// Integer outside its declared interval
    #[error("must be an integer between {min} and {max} inclusive")]
    OutOfRange { min: i64, max: i64 },

    /// Label outside its declared value set
    #[error("must be exactly one of: {}", quoted_list(.allowed))]
    NotAllowed { allowed: Vec<String> },

    /// Array shorter than required
    #[error("must contain at least {min} item(s)")]
    TooFewItems { min: usize },

    /// Wrong number of items carrying a given value
    #[error("must contain exactly {expected} item(s) with \"{key}\" = \"{value}\", found {actual}")]
    WrongCount {
        key: String,
        value: String,
        expected: usize,
        actual: usize,
    },
}

/// A single (field, constraint, observed value) mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct FieldViolation {
    /// Field path, e.g. `energy_level` or `recommendations[1].title`
    pub field: String,
    /// Violated constraint
    pub kind: ViolationKind,
    /// Offending value as compact JSON, truncated
    pub observed: Option<String>,
}

impl FieldViolation {
    /// Create a violation.
    pub fn new(field: impl Into<String>, kind: ViolationKind, observed: Option<&Value>) -> Self {
        Self {
            field: field.into(),
            kind,
            observed: observed.map(render_observed),
        }
    }

    /// Violation for output that is not JSON at all.
    pub fn unparseable(reason: impl Into<String>) -> Self {
        Self::new(
            ROOT_PATH,
            ViolationKind::Unparseable {
                reason: reason.into(),
            },
            None,
        )
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "field \"{}\" {}", self.field, self.kind)?;
        if let Some(observed) = &self.observed {
            write!(f, " (got {})", observed)?;
        }
        Ok(())
    }
}

/// Cut the JSON object out of a raw model response.
///
/// Models often wrap JSON in code fences or a sentence of prose; everything
/// outside the first `{` and the last `}` is dropped.
pub fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parse raw model output into a JSON value.
pub fn parse_output(raw: &str) -> Result<Value, FieldViolation> {
    let json = extract_json(raw)
        .ok_or_else(|| FieldViolation::unparseable("no JSON object found"))?;
    serde_json::from_str(json).map_err(|e| FieldViolation::unparseable(e.to_string()))
}

/// Check a parsed value against a schema.
///
/// Returns every violation, ordered by field declaration order (list items
/// by index, then the list's own constraints). Keys not named by the
/// schema are ignored.
pub fn validate(schema: &SchemaDescriptor, value: &Value) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    match value.as_object() {
        Some(obj) => check_fields(&schema.fields, obj, "", &mut violations),
        None => violations.push(FieldViolation::new(
            ROOT_PATH,
            ViolationKind::NotAnObject,
            Some(value),
        )),
    }
    violations
}

/// Parse, validate and deserialize raw model output in one step.
pub fn parse_record<T: DeserializeOwned>(
    schema: &SchemaDescriptor,
    raw: &str,
) -> Result<T, Vec<FieldViolation>> {
    let value = parse_output(raw).map_err(|v| vec![v])?;

    let violations = validate(schema, &value);
    if !violations.is_empty() {
        return Err(violations);
    }

    serde_json::from_value(value).map_err(|e| vec![FieldViolation::unparseable(e.to_string())])
}

fn check_fields(
    fields: &[FieldDescriptor],
    obj: &Map<String, Value>,
    prefix: &str,
    out: &mut Vec<FieldViolation>,
) {
    for field in fields {
        let path = if prefix.is_empty() {
            field.name.to_string()
        } else {
            format!("{}.{}", prefix, field.name)
        };

        match obj.get(field.name) {
            None | Some(Value::Null) => {
                out.push(FieldViolation::new(path, ViolationKind::Missing, None))
            }
            Some(value) => check_value(field, value, &path, out),
        }
    }
}

fn check_value(field: &FieldDescriptor, value: &Value, path: &str, out: &mut Vec<FieldViolation>) {
    let wrong_type = || {
        FieldViolation::new(
            path,
            ViolationKind::WrongType {
                expected: field.field_type.type_name().to_string(),
            },
            Some(value),
        )
    };

    match &field.field_type {
        FieldType::Text | FieldType::Label => {
            let Some(text) = value.as_str() else {
                out.push(wrong_type());
                return;
            };
            for constraint in &field.constraints {
                match constraint {
                    Constraint::NonEmpty if text.trim().is_empty() => {
                        out.push(FieldViolation::new(path, ViolationKind::Empty, Some(value)));
                    }
                    Constraint::OneOf(allowed) if !allowed.contains(&text) => {
                        out.push(FieldViolation::new(
                            path,
                            ViolationKind::NotAllowed {
                                allowed: allowed.iter().map(|s| s.to_string()).collect(),
                            },
                            Some(value),
                        ));
                    }
                    _ => {}
                }
            }
        }
        FieldType::Integer => {
            let Some(n) = value.as_i64() else {
                out.push(wrong_type());
                return;
            };
            for constraint in &field.constraints {
                if let Constraint::Range { min, max } = constraint {
                    if n < *min || n > *max {
                        out.push(FieldViolation::new(
                            path,
                            ViolationKind::OutOfRange {
                                min: *min,
                                max: *max,
                            },
                            Some(value),
                        ));
                    }
                }
            }
        }
        FieldType::List(items) => {
            let Some(array) = value.as_array() else {
                out.push(wrong_type());
                return;
            };
            for (i, item) in array.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                match item.as_object() {
                    Some(obj) => check_fields(items, obj, &item_path, out),
                    None => out.push(FieldViolation::new(
                        item_path,
                        ViolationKind::WrongType {
                            expected: "object".to_string(),
                        },
                        Some(item),
                    )),
                }
            }
            for constraint in &field.constraints {
                match constraint {
                    Constraint::MinItems(min) if array.len() < *min => {
                        out.push(FieldViolation::new(
                            path,
                            ViolationKind::TooFewItems { min: *min },
                            None,
                        ));
                    }
                    Constraint::CountPerValue { key, counts } => {
                        for (wanted, expected) in counts {
                            let actual = array
                                .iter()
                                .filter(|item| item.get(*key).and_then(Value::as_str) == Some(*wanted))
                                .count();
                            if actual != *expected {
                                out.push(FieldViolation::new(
                                    path,
                                    ViolationKind::WrongCount {
                                        key: key.to_string(),
                                        value: wanted.to_string(),
                                        expected: *expected,
                                        actual,
                                    },
                                    None,
                                ));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

fn render_observed(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() <= MAX_OBSERVED_CHARS {
        return rendered;
    }
    let mut cut: String = rendered.chars().take(MAX_OBSERVED_CHARS).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new(
            "Sample",
            vec![
                FieldDescriptor::label("color", &["red", "blue"], "A color."),
                FieldDescriptor::integer("size", "A size.").range(1, 10),
                FieldDescriptor::text("note", "A note.").non_empty(),
            ],
        )
    }

    #[test]
    fn test_extract_json_strips_fences_and_prose() {
        let raw = "Sure! Here it is:\n```json\n{\"a\": 1}\n```\nHope that helps.";
        assert_eq!(extract_json(raw), Some("{\"a\": 1}"));
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_valid_object_has_no_violations() {
        let value = json!({"color": "red", "size": 4, "note": "fine", "extra": true});
        assert!(validate(&schema(), &value).is_empty());
    }

    #[test]
    fn test_violations_follow_declaration_order() {
        let value = json!({"note": "  ", "size": 15, "color": "green"});
        let violations = validate(&schema(), &value);

        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["color", "size", "note"]);
        assert_eq!(violations[1].kind, ViolationKind::OutOfRange { min: 1, max: 10 });
        assert_eq!(violations[1].observed.as_deref(), Some("15"));
        assert_eq!(violations[2].kind, ViolationKind::Empty);
    }

    #[test]
    fn test_missing_and_null_fields() {
        let value = json!({"color": "red", "size": null});
        let violations = validate(&schema(), &value);

        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].field, "size");
        assert_eq!(violations[0].kind, ViolationKind::Missing);
        assert_eq!(violations[1].field, "note");
        assert_eq!(violations[1].kind, ViolationKind::Missing);
    }

    #[test]
    fn test_wrong_types() {
        let value = json!({"color": 3, "size": "seven", "note": ["x"]});
        let violations = validate(&schema(), &value);

        assert_eq!(violations.len(), 3);
        assert!(violations
            .iter()
            .all(|v| matches!(v.kind, ViolationKind::WrongType { .. })));
    }

    #[test]
    fn test_integer_rejects_floats() {
        let violations = validate(&schema(), &json!({"color": "red", "size": 7.5, "note": "x"}));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "size");
        assert_eq!(
            violations[0].kind,
            ViolationKind::WrongType {
                expected: "integer".to_string()
            }
        );
    }

    #[test]
    fn test_list_items_and_counts() {
        let schema = SchemaDescriptor::new(
            "List",
            vec![FieldDescriptor::list(
                "entries",
                vec![
                    FieldDescriptor::text("title", "Title.").non_empty(),
                    FieldDescriptor::label("kind", &["book", "movie"], "Kind."),
                ],
                "Entries.",
            )
            .min_items(1)
            .with(Constraint::CountPerValue {
                key: "kind",
                counts: vec![("movie", 1), ("book", 1)],
            })],
        );

        let value = json!({"entries": [
            {"title": "Up", "kind": "movie"},
            {"title": "", "kind": "movie"},
            "not an object"
        ]});
        let violations = validate(&schema, &value);
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();

        assert_eq!(
            fields,
            vec!["entries[1].title", "entries[2]", "entries", "entries"]
        );
        assert_eq!(
            violations[2].kind,
            ViolationKind::WrongCount {
                key: "kind".to_string(),
                value: "movie".to_string(),
                expected: 1,
                actual: 2,
            }
        );

        let empty = validate(&schema, &json!({"entries": []}));
        assert_eq!(empty[0].kind, ViolationKind::TooFewItems { min: 1 });
    }

    #[test]
    fn test_not_an_object() {
        let violations = validate(&schema(), &json!([1, 2]));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, ROOT_PATH);
        assert_eq!(violations[0].kind, ViolationKind::NotAnObject);
    }

    #[test]
    fn test_parse_output_reports_unparseable() {
        let err = parse_output("{\"color\": }").unwrap_err();
        assert!(matches!(err.kind, ViolationKind::Unparseable { .. }));

        let err = parse_output("I cannot help with that.").unwrap_err();
        assert_eq!(
            err.kind,
            ViolationKind::Unparseable {
                reason: "no JSON object found".to_string()
            }
        );
    }

    #[test]
    fn test_violation_display() {
        let violation = FieldViolation::new(
            "size",
            ViolationKind::OutOfRange { min: 1, max: 10 },
            Some(&json!(15)),
        );
        assert_eq!(
            violation.to_string(),
            "field \"size\" must be an integer between 1 and 10 inclusive (got 15)"
        );
    }

    #[test]
    fn test_observed_is_truncated() {
        let long = "x".repeat(200);
        let violation = FieldViolation::new("note", ViolationKind::Empty, Some(&json!(long)));
        let observed = violation.observed.unwrap();
        assert_eq!(observed.chars().count(), MAX_OBSERVED_CHARS + 1);
        assert!(observed.ends_with('…'));
    }
}
