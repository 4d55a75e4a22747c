//! Capability input/output schemas
//!
//! A schema describes the ordered parts a message must carry and, for data
//! parts, the fields of the JSON object inside them. Validation is shallow on
//! purpose: it checks presence and shape, never business rules.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    error::SchemaError,
    message::{MessagePart, PartType},
};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parse a timestamp as RFC 3339, falling back to a naive local form taken as UTC
///
/// Accepts `2024-01-01T10:00:00Z`, `2024-01-01T10:00:00+02:00`,
/// `2024-01-01T10:00:00` and `2024-01-01T10:00`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Shape of a single field inside a data part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldKind {
    String,
    Timestamp,
    Integer,
    Number,
    Boolean,
    /// Array whose elements all have the given kind
    Array { items: Box<FieldKind> },
    /// Nested object with its own fields
    Object { fields: Vec<FieldSchema> },
    Any,
}

impl FieldKind {
    /// Array of the given item kind
    pub fn array(items: FieldKind) -> Self {
        FieldKind::Array {
            items: Box::new(items),
        }
    }

    /// Object with the given fields
    pub fn object(fields: Vec<FieldSchema>) -> Self {
        FieldKind::Object { fields }
    }

    fn describe(&self) -> String {
        match self {
            FieldKind::String => "a string".into(),
            FieldKind::Timestamp => "an ISO-8601 timestamp".into(),
            FieldKind::Integer => "an integer".into(),
            FieldKind::Number => "a number".into(),
            FieldKind::Boolean => "a boolean".into(),
            FieldKind::Array { items } => format!("an array of {}", items.describe()),
            FieldKind::Object { .. } => "an object".into(),
            FieldKind::Any => "any value".into(),
        }
    }

    /// Check `value` against this kind; `path` names the field for error reporting
    fn check(&self, index: usize, path: &str, value: &Value) -> Result<(), SchemaError> {
        let ok = match (self, value) {
            (FieldKind::Any, _) => true,
            (FieldKind::String, Value::String(_)) => true,
            (FieldKind::Timestamp, Value::String(s)) => parse_timestamp(s).is_some(),
            (FieldKind::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (FieldKind::Number, Value::Number(_)) => true,
            (FieldKind::Boolean, Value::Bool(_)) => true,
            (FieldKind::Array { items }, Value::Array(values)) => {
                for (i, item) in values.iter().enumerate() {
                    items.check(index, &format!("{path}[{i}]"), item)?;
                }
                true
            }
            (FieldKind::Object { fields }, Value::Object(_)) => {
                check_fields(index, Some(path), fields, value)?;
                true
            }
            _ => false,
        };

        if ok {
            Ok(())
        } else {
            Err(SchemaError::InvalidField {
                index,
                field: path.to_string(),
                expected: self.describe(),
            })
        }
    }
}

/// A named field inside a data part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

impl FieldSchema {
    /// A required field
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    /// An optional field
    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// Expected shape of one message part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartSchema {
    pub part_type: PartType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSchema>,
    #[serde(default = "default_true")]
    pub required: bool,
}

impl PartSchema {
    /// A required text part
    pub fn text() -> Self {
        Self {
            part_type: PartType::Text,
            fields: Vec::new(),
            required: true,
        }
    }

    /// A required file part
    pub fn file() -> Self {
        Self {
            part_type: PartType::File,
            fields: Vec::new(),
            required: true,
        }
    }

    /// A required data part whose object carries `fields`
    pub fn data(fields: Vec<FieldSchema>) -> Self {
        Self {
            part_type: PartType::Data,
            fields,
            required: true,
        }
    }

    /// Mark this part as optional
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn check(&self, index: usize, part: &MessagePart) -> Result<(), SchemaError> {
        let actual = part.part_type();
        if actual != self.part_type {
            return Err(SchemaError::WrongPartType {
                index,
                expected: self.part_type,
                actual,
            });
        }

        match part {
            MessagePart::Text { text } if text.is_empty() => Err(SchemaError::InvalidPart {
                index,
                reason: "text part cannot be empty".into(),
            }),
            MessagePart::File { file } if file.name.is_empty() => Err(SchemaError::InvalidPart {
                index,
                reason: "file name cannot be empty".into(),
            }),
            MessagePart::File { file }
                if file.file_with_uri.is_none() && file.file_with_bytes.is_none() =>
            {
                Err(SchemaError::InvalidPart {
                    index,
                    reason: "file must have either URI or bytes content".into(),
                })
            }
            MessagePart::Data { data } => check_fields(index, None, &self.fields, data),
            _ => Ok(()),
        }
    }
}

fn check_fields(
    index: usize,
    prefix: Option<&str>,
    fields: &[FieldSchema],
    value: &Value,
) -> Result<(), SchemaError> {
    let object = match value.as_object() {
        Some(object) => object,
        None if fields.is_empty() => return Ok(()),
        None => {
            return Err(SchemaError::InvalidPart {
                index,
                reason: "data part must be a JSON object".into(),
            })
        }
    };

    for field in fields {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{}", field.name),
            None => field.name.clone(),
        };
        match object.get(&field.name) {
            Some(Value::Null) | None if field.required => {
                return Err(SchemaError::MissingField { index, field: path })
            }
            Some(Value::Null) | None => {}
            Some(value) => field.kind.check(index, &path, value)?,
        }
    }
    Ok(())
}

/// Ordered description of the parts a capability accepts or produces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySchema {
    pub parts: Vec<PartSchema>,
}

impl CapabilitySchema {
    /// Schema made of the given parts, in order
    pub fn new(parts: Vec<PartSchema>) -> Self {
        Self { parts }
    }

    /// Schema of a single required data part with `fields`
    pub fn data(fields: Vec<FieldSchema>) -> Self {
        Self::new(vec![PartSchema::data(fields)])
    }

    /// Validate `parts` in order against this schema
    pub fn validate(&self, parts: &[MessagePart]) -> Result<(), SchemaError> {
        if parts.len() > self.parts.len() {
            return Err(SchemaError::UnexpectedPart {
                index: self.parts.len(),
                declared: self.parts.len(),
            });
        }

        for (index, expected) in self.parts.iter().enumerate() {
            match parts.get(index) {
                Some(part) => expected.check(index, part)?,
                None if expected.required => {
                    return Err(SchemaError::MissingPart {
                        index,
                        expected: expected.part_type,
                    })
                }
                None => {}
            }
        }
        Ok(())
    }
}
