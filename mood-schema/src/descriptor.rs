//! Schema descriptors.
//!
//! A [`SchemaDescriptor`] is an ordered table of fields, each with a type
//! and a list of constraints. The same table is rendered into prompt text,
//! rendered into a JSON Schema for backends that accept one, and walked by
//! the validator, so the model is always told exactly what will be checked.

use std::fmt;

use serde_json::{json, Map, Value};

/// Primitive type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Free text
    Text,
    /// Whole number
    Integer,
    /// String drawn from a fixed label set (see [`Constraint::OneOf`])
    Label,
    /// Array of objects, each described by the nested fields
    List(Vec<FieldDescriptor>),
}

impl FieldType {
    /// JSON type name used in prompts and violation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Text | FieldType::Label => "string",
            FieldType::Integer => "integer",
            FieldType::List(_) => "array of objects",
        }
    }
}

/// A constraint on a field's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// String must contain non-whitespace characters
    NonEmpty,
    /// Integer must lie in the closed interval `min..=max`
    Range { min: i64, max: i64 },
    /// String must be one of the listed values (case-sensitive)
    OneOf(&'static [&'static str]),
    /// Array must hold at least this many items
    MinItems(usize),
    /// Array must hold exactly `expected` items whose `key` equals `value`,
    /// for every listed pair
    CountPerValue {
        key: &'static str,
        counts: Vec<(&'static str, usize)>,
    },
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::NonEmpty => write!(f, "must be a non-empty string"),
            Constraint::Range { min, max } => {
                write!(f, "must be an integer between {} and {} inclusive", min, max)
            }
            Constraint::OneOf(values) => {
                write!(f, "must be exactly one of: {}", quoted_list(values))
            }
            Constraint::MinItems(n) => write!(f, "must contain at least {} item(s)", n),
            Constraint::CountPerValue { key, counts } => {
                let parts: Vec<String> = counts
                    .iter()
                    .map(|(value, n)| format!("exactly {} item(s) with \"{}\" = \"{}\"", n, key, value))
                    .collect();
                write!(f, "must contain {}", parts.join(" and "))
            }
        }
    }
}

/// Description of a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// JSON key
    pub name: &'static str,
    /// Value type
    pub field_type: FieldType,
    /// Constraints, checked in order
    pub constraints: Vec<Constraint>,
    /// What the model should put here
    pub description: &'static str,
}

impl FieldDescriptor {
    fn new(name: &'static str, field_type: FieldType, description: &'static str) -> Self {
        Self {
            name,
            field_type,
            constraints: Vec::new(),
            description,
        }
    }

    /// A free-text field.
    pub fn text(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldType::Text, description)
    }

    /// An integer field.
    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldType::Integer, description)
    }

    /// A label field restricted to `values`.
    pub fn label(
        name: &'static str,
        values: &'static [&'static str],
        description: &'static str,
    ) -> Self {
        Self::new(name, FieldType::Label, description).with(Constraint::OneOf(values))
    }

    /// A list of objects described by `items`.
    pub fn list(
        name: &'static str,
        items: Vec<FieldDescriptor>,
        description: &'static str,
    ) -> Self {
        Self::new(name, FieldType::List(items), description)
    }

    /// Add a constraint.
    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Require a non-empty string.
    pub fn non_empty(self) -> Self {
        self.with(Constraint::NonEmpty)
    }

    /// Require an integer within `min..=max`.
    pub fn range(self, min: i64, max: i64) -> Self {
        self.with(Constraint::Range { min, max })
    }

    /// Require at least `n` list items.
    pub fn min_items(self, n: usize) -> Self {
        self.with(Constraint::MinItems(n))
    }
}

/// Machine-checkable description of a record's shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    /// Record name, used in prompts and JSON Schema titles
    pub name: &'static str,
    /// Fields in declaration order
    pub fields: Vec<FieldDescriptor>,
}

impl SchemaDescriptor {
    /// Create a descriptor.
    pub fn new(name: &'static str, fields: Vec<FieldDescriptor>) -> Self {
        Self { name, fields }
    }

    /// Top-level field names in declaration order.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Render the schema as prompt text.
    pub fn render_prompt(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "The {} object has exactly these fields, in this order:\n",
            self.name
        ));
        render_fields(&self.fields, 0, &mut out);
        out
    }

    /// Render the schema as a JSON Schema document.
    pub fn to_json_schema(&self) -> Value {
        let mut schema = object_schema(&self.fields);
        if let Some(obj) = schema.as_object_mut() {
            obj.insert("title".to_string(), Value::String(self.name.to_string()));
        }
        schema
    }
}

fn render_fields(fields: &[FieldDescriptor], depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for field in fields {
        out.push_str(&format!(
            "{}- \"{}\" ({}): {}",
            indent,
            field.name,
            field.field_type.type_name(),
            field.description
        ));
        if !field.constraints.is_empty() {
            let rules: Vec<String> = field.constraints.iter().map(|c| c.to_string()).collect();
            out.push_str(&format!(" [{}]", rules.join("; ")));
        }
        out.push('\n');

        if let FieldType::List(items) = &field.field_type {
            out.push_str(&format!("{}  Each item is an object with these fields:\n", indent));
            render_fields(items, depth + 2, out);
        }
    }
}

fn object_schema(fields: &[FieldDescriptor]) -> Value {
    let mut properties = Map::new();
    for field in fields {
        properties.insert(field.name.to_string(), field_schema(field));
    }
    let required: Vec<&str> = fields.iter().map(|f| f.name).collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn field_schema(field: &FieldDescriptor) -> Value {
    let mut obj = Map::new();
    match &field.field_type {
        FieldType::Text | FieldType::Label => {
            obj.insert("type".to_string(), json!("string"));
        }
        FieldType::Integer => {
            obj.insert("type".to_string(), json!("integer"));
        }
        FieldType::List(items) => {
            obj.insert("type".to_string(), json!("array"));
            obj.insert("items".to_string(), object_schema(items));
        }
    }
    obj.insert("description".to_string(), json!(field.description));

    for constraint in &field.constraints {
        match constraint {
            Constraint::NonEmpty => {
                obj.insert("minLength".to_string(), json!(1));
            }
            Constraint::Range { min, max } => {
                obj.insert("minimum".to_string(), json!(min));
                obj.insert("maximum".to_string(), json!(max));
            }
            Constraint::OneOf(values) => {
                obj.insert("enum".to_string(), json!(values));
            }
            Constraint::MinItems(n) => {
                obj.insert("minItems".to_string(), json!(n));
            }
            // No JSON Schema equivalent; carried by the prompt text only.
            Constraint::CountPerValue { .. } => {}
        }
    }

    Value::Object(obj)
}

pub(crate) fn quoted_list<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| format!("\"{}\"", v.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}
