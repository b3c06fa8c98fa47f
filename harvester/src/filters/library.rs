//! Declarative filters.
//!
//! Filters that can be named in a schema file. Each [`FilterSpec`] compiles
//! into a [`Filter`]; string operations are applied element-wise when a
//! multi-column field hands them a list.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::{map_text, Filter};
use crate::error::{ConfigResult, ConfigurationError};

/// All available declarative filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterSpec {
    /// Remove leading and trailing whitespace
    Trim,

    /// Remove the given characters from both ends
    Strip { chars: String },

    /// Convert to uppercase
    Uppercase,

    /// Convert to lowercase
    Lowercase,

    /// Replace using regex pattern
    Replace {
        pattern: String,
        #[serde(default)]
        value: String,
    },

    /// Pad string at start to reach target length
    PadStart {
        length: usize,
        #[serde(default = "default_pad_char")]
        char: String,
    },

    /// Map values using a lookup table
    Map {
        mapping: HashMap<String, String>,
        #[serde(default)]
        case_insensitive: bool,
        /// Value to use when no mapping matches (None = empty, which lets the
        /// field's default apply)
        #[serde(default)]
        default_unmapped: Option<String>,
    },

    /// Split string into a list
    Split {
        #[serde(default = "default_split_separator")]
        separator: String,
    },

    /// Take a character range
    Substring {
        start: usize,
        #[serde(default)]
        length: Option<usize>,
    },

    /// Remove all non-alphanumeric characters
    Alphanumeric,

    /// Remove all non-digit characters
    DigitsOnly,
}

fn default_pad_char() -> String {
    "0".to_string()
}

fn default_split_separator() -> String {
    ",".to_string()
}

impl FilterSpec {
    /// Compile this spec into a filter.
    ///
    /// Fails only for `replace` with an invalid regex.
    pub fn to_filter(&self) -> ConfigResult<Filter> {
        let filter = match self.clone() {
            FilterSpec::Trim => super::strip(),
            FilterSpec::Strip { chars } => super::strip_chars(chars),
            FilterSpec::Uppercase => Filter::new(|v| map_text(v, |s| s.to_uppercase())),
            FilterSpec::Lowercase => Filter::new(|v| map_text(v, |s| s.to_lowercase())),
            FilterSpec::Replace { pattern, value } => {
                let re = Regex::new(&pattern).map_err(|e| {
                    ConfigurationError::InvalidFilter(format!("bad pattern '{}': {}", pattern, e))
                })?;
                Filter::new(move |v| map_text(v, |s| re.replace_all(s, value.as_str()).to_string()))
            }
            FilterSpec::PadStart { length, char } => {
                let pad = char.chars().next().unwrap_or('0');
                Filter::new(move |v| map_text(v, |s| pad_start(s, length, pad)))
            }
            FilterSpec::Map {
                mapping,
                case_insensitive,
                default_unmapped,
            } => Filter::new(move |v| {
                map_text(v, |s| {
                    lookup(&mapping, s, case_insensitive)
                        .or(default_unmapped.as_deref())
                        .unwrap_or_default()
                        .to_string()
                })
            }),
            FilterSpec::Split { separator } => Filter::new(move |v| split(v, &separator)),
            FilterSpec::Substring { start, length } => {
                Filter::new(move |v| map_text(v, |s| substring(s, start, length)))
            }
            FilterSpec::Alphanumeric => Filter::new(|v| {
                map_text(v, |s| s.chars().filter(|c| c.is_alphanumeric()).collect())
            }),
            FilterSpec::DigitsOnly => Filter::new(|v| {
                map_text(v, |s| s.chars().filter(|c| c.is_ascii_digit()).collect())
            }),
        };
        Ok(filter)
    }
}

fn pad_start(s: &str, length: usize, pad: char) -> String {
    let count = s.chars().count();
    if count >= length {
        return s.to_string();
    }
    let padding: String = std::iter::repeat(pad).take(length - count).collect();
    format!("{}{}", padding, s)
}

fn lookup<'a>(
    mapping: &'a HashMap<String, String>,
    key: &str,
    case_insensitive: bool,
) -> Option<&'a str> {
    if case_insensitive {
        let key = key.to_lowercase();
        mapping
            .iter()
            .find(|(k, _)| k.to_lowercase() == key)
            .map(|(_, v)| v.as_str())
    } else {
        mapping.get(key).map(String::as_str)
    }
}

fn split(value: Value, separator: &str) -> Value {
    match value {
        Value::String(s) if s.is_empty() => Value::Array(Vec::new()),
        Value::String(s) => Value::Array(
            s.split(separator)
                .map(|p| Value::String(p.trim().to_string()))
                .collect(),
        ),
        other => other,
    }
}

fn substring(s: &str, start: usize, length: Option<usize>) -> String {
    let chars: Vec<char> = s.chars().collect();
    let end = length
        .map(|l| start.saturating_add(l))
        .unwrap_or(chars.len())
        .min(chars.len());
    chars
        .get(start..end)
        .map(|c| c.iter().collect())
        .unwrap_or_default()
}

/// Get a description of all available filters
pub fn operations_description() -> String {
    r#"Available filters:

| Filter | Description | Parameters |
|--------|-------------|------------|
| trim | Remove leading/trailing whitespace | - |
| strip | Remove given characters from both ends | chars |
| uppercase | Convert to uppercase | - |
| lowercase | Convert to lowercase | - |
| replace | Regex pattern replacement | pattern: regex, value: replacement |
| pad_start | Pad string at start | length: target length, char: pad character (default "0") |
| map | Map values using lookup table | mapping: {source: target}, case_insensitive: bool, default_unmapped |
| split | Split into a list | separator (default ",") |
| substring | Extract substring | start: start index, length: optional length |
| alphanumeric | Keep only alphanumeric chars | - |
| digits_only | Keep only digits | - |

Example filters in JSON:
[
  {"type": "trim"},
  {"type": "replace", "pattern": "[-. ]", "value": ""},
  {"type": "map", "mapping": {"Y": "yes", "N": "no"}, "case_insensitive": true}
]"#
    .to_string()
}
