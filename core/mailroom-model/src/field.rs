use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Describes one field of a record definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    /// Applied to every record created from the definition, new or persisted,
    /// unless the creation data supplies the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl FieldDescriptor {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            default_value: None,
        }
    }

    /// Shorthand for an untyped field.
    pub fn auto(name: &str) -> Self {
        Self::new(name, FieldType::Auto)
    }

    /// Shorthand for a string field.
    pub fn string(name: &str) -> Self {
        Self::new(name, FieldType::String)
    }

    /// Shorthand for an integer field.
    pub fn int(name: &str) -> Self {
        Self::new(name, FieldType::Int)
    }

    /// Shorthand for a floating point field.
    pub fn float(name: &str) -> Self {
        Self::new(name, FieldType::Float)
    }

    /// Shorthand for a boolean field.
    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    /// Shorthand for a date field (unix seconds on the wire).
    pub fn date(name: &str) -> Self {
        Self::new(name, FieldType::Date)
    }

    /// Attaches a default value.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// The semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Auto,
    String,
    Int,
    Float,
    Boolean,
    Date,
    Json,
}
