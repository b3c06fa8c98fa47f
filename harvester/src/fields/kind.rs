//! Field kinds and their type coercion.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::str::FromStr;

use super::relation::Relation;
use crate::error::{ValidationError, ValidationErrorKind, ValidationResult};

/// Values read as `true` by boolean fields.
pub const TRUE_VALUES: &[&str] = &["y", "yes", "t", "true", "1"];

/// Values read as `false` by boolean fields.
pub const FALSE_VALUES: &[&str] = &["n", "no", "f", "false", "0"];

/// Values read as "no answer" by boolean fields.
pub const NULL_VALUES: &[&str] = &[
    "na",
    "nil",
    "not applicable",
    "not available",
    "information unavailable",
    "information not available",
    "unknown",
    "don't know",
    "-",
    "",
];

/// Keyword sets used to read booleans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanKeywords {
    #[serde(default = "default_true_values")]
    pub true_values: Vec<String>,
    #[serde(default = "default_false_values")]
    pub false_values: Vec<String>,
    #[serde(default = "default_null_values")]
    pub null_values: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn default_true_values() -> Vec<String> {
    owned(TRUE_VALUES)
}

fn default_false_values() -> Vec<String> {
    owned(FALSE_VALUES)
}

fn default_null_values() -> Vec<String> {
    owned(NULL_VALUES)
}

impl Default for BooleanKeywords {
    fn default() -> Self {
        Self {
            true_values: default_true_values(),
            false_values: default_false_values(),
            null_values: default_null_values(),
            case_sensitive: false,
        }
    }
}

impl BooleanKeywords {
    /// `Some(Some(b))` for a boolean, `Some(None)` for a null keyword, `None`
    /// when nothing matched.
    fn read(&self, text: &str) -> Option<Option<bool>> {
        let matches = |set: &[String]| {
            set.iter().any(|k| {
                if self.case_sensitive {
                    k == text
                } else {
                    k.to_lowercase() == text.to_lowercase()
                }
            })
        };
        if matches(&self.true_values) {
            Some(Some(true))
        } else if matches(&self.false_values) {
            Some(Some(false))
        } else if matches(&self.null_values) {
            Some(None)
        } else {
            None
        }
    }
}

/// Runtime type of a field, used to key per-type default filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Raw,
    Text,
    Integer,
    Float,
    Decimal,
    Boolean,
    ForeignKey,
    ManyToMany,
}

/// The closed set of field kinds.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// No coercion; typically a multi-column value combined by a hook.
    Raw,
    Text { max_length: Option<usize> },
    Integer,
    Float,
    /// Kept as its canonical text so no precision is lost.
    Decimal,
    Boolean(BooleanKeywords),
    /// Resolves to one related entity.
    ForeignKey(Relation),
    /// Resolves to a list of related entities.
    ManyToMany(Relation),
}

impl FieldKind {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldKind::Raw => FieldType::Raw,
            FieldKind::Text { .. } => FieldType::Text,
            FieldKind::Integer => FieldType::Integer,
            FieldKind::Float => FieldType::Float,
            FieldKind::Decimal => FieldType::Decimal,
            FieldKind::Boolean(_) => FieldType::Boolean,
            FieldKind::ForeignKey(_) => FieldType::ForeignKey,
            FieldKind::ManyToMany(_) => FieldType::ManyToMany,
        }
    }

    pub fn relation(&self) -> Option<&Relation> {
        match self {
            FieldKind::ForeignKey(relation) | FieldKind::ManyToMany(relation) => Some(relation),
            _ => None,
        }
    }

    /// Convert a present value. `Ok(None)` means the value turned out to be
    /// absent and the default/blank rules apply.
    pub(crate) fn coerce(&self, field: &str, value: &Value) -> ValidationResult<Option<Value>> {
        let fail = |kind| Err(ValidationError::new(field, value.clone(), kind));

        match self {
            FieldKind::Raw => Ok(Some(value.clone())),

            FieldKind::Text { max_length } => {
                let text = match scalar_text(value) {
                    Some(text) => text,
                    None => return fail(ValidationErrorKind::NotScalar),
                };
                let length = text.chars().count();
                match max_length {
                    Some(max) if length > *max => fail(ValidationErrorKind::MaxLength {
                        length,
                        max: *max,
                    }),
                    _ => Ok(Some(Value::String(text))),
                }
            }

            FieldKind::Integer => match value {
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Ok(Some(Value::from(i))),
                    None => fail(ValidationErrorKind::NotInteger),
                },
                Value::String(s) => match s.trim().parse::<i64>() {
                    Ok(i) => Ok(Some(Value::from(i))),
                    Err(_) if s.trim().is_empty() => Ok(None),
                    Err(_) => fail(ValidationErrorKind::NotInteger),
                },
                Value::Array(_) | Value::Object(_) => fail(ValidationErrorKind::NotScalar),
                _ => fail(ValidationErrorKind::NotInteger),
            },

            FieldKind::Float => {
                let parsed = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) if s.trim().is_empty() => return Ok(None),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    Value::Array(_) | Value::Object(_) => {
                        return fail(ValidationErrorKind::NotScalar)
                    }
                    _ => None,
                };
                match parsed.and_then(Number::from_f64) {
                    Some(n) => Ok(Some(Value::Number(n))),
                    None => fail(ValidationErrorKind::NotFloat),
                }
            }

            FieldKind::Decimal => {
                let text = match value {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) => s.trim().to_string(),
                    Value::Array(_) | Value::Object(_) => {
                        return fail(ValidationErrorKind::NotScalar)
                    }
                    _ => return fail(ValidationErrorKind::NotDecimal),
                };
                if text.is_empty() {
                    return Ok(None);
                }
                match parse_decimal(&text) {
                    Some(decimal) => Ok(Some(Value::String(decimal.to_string()))),
                    None => fail(ValidationErrorKind::NotDecimal),
                }
            }

            FieldKind::Boolean(keywords) => {
                if let Value::Bool(b) = value {
                    return Ok(Some(Value::Bool(*b)));
                }
                let text = match scalar_text(value) {
                    Some(text) => text,
                    None => return fail(ValidationErrorKind::NotScalar),
                };
                match keywords.read(&text) {
                    Some(Some(b)) => Ok(Some(Value::Bool(b))),
                    Some(None) => Ok(None),
                    None => fail(ValidationErrorKind::NotBoolean),
                }
            }

            FieldKind::ForeignKey(_) => match value {
                Value::Array(_) | Value::Object(_) => fail(ValidationErrorKind::NotScalar),
                Value::String(s) if s.trim().is_empty() => Ok(None),
                Value::String(s) => Ok(Some(Value::String(s.trim().to_string()))),
                other => Ok(Some(other.clone())),
            },

            FieldKind::ManyToMany(relation) => {
                let keys: Vec<Value> = match value {
                    Value::Array(items) => {
                        let mut keys = Vec::new();
                        for item in items {
                            match item {
                                Value::String(s) => {
                                    keys.extend(split_keys(s, relation.separator()))
                                }
                                Value::Array(_) | Value::Object(_) => {
                                    return fail(ValidationErrorKind::NotScalar)
                                }
                                other if !is_absent(other) => keys.push(other.clone()),
                                _ => {}
                            }
                        }
                        keys
                    }
                    Value::String(s) => split_keys(s, relation.separator()).collect(),
                    Value::Object(_) => return fail(ValidationErrorKind::NotScalar),
                    other => vec![other.clone()],
                };
                Ok((!keys.is_empty()).then_some(Value::Array(keys)))
            }
        }
    }
}

/// Whether a value counts as "nothing was given".
pub fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.iter().all(is_absent),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn split_keys<'a>(text: &'a str, separator: &'a str) -> impl Iterator<Item = Value> + 'a {
    text.split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Value::String(s.to_string()))
}

/// Plain or scientific notation.
fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}
