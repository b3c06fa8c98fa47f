//! Harvest configuration.
//!
//! - [`HarvestOptions`] - how rows are read and how bad rows are treated,
//!   attached to a schema when it is built
//! - [`SchemaConfig`] - a whole schema declared as JSON, for use without code

mod schema_file;

pub use schema_file::{FieldConfig, KindConfig, ModelConfig, SchemaConfig};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigResult, ConfigurationError};

/// What to do with a row that fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidRowPolicy {
    /// Abort the batch with the error.
    #[default]
    Raise,
    /// Drop the row, report it as a warning and carry on.
    Skip,
}

/// Row reading options of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestOptions {
    /// Character encoding label, or `"auto"` to detect it.
    pub encoding: String,

    /// Tab separated instead of comma separated.
    pub tabs: bool,

    /// Explicit delimiter; overrides `tabs`.
    pub delimiter: Option<char>,

    /// 1-based number of the first data row.
    pub start_row: usize,

    /// 1-based number of a row holding column labels.
    pub label_row: Option<usize>,

    /// 1-based number of the first column belonging to the schema.
    pub start_column: usize,

    /// Stop after this many data rows.
    pub max_rows: Option<usize>,

    pub on_invalid: InvalidRowPolicy,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            encoding: "utf-8".to_string(),
            tabs: false,
            delimiter: None,
            start_row: 1,
            label_row: None,
            start_column: 1,
            max_rows: None,
            on_invalid: InvalidRowPolicy::Raise,
        }
    }
}

impl HarvestOptions {
    /// The byte delimiter the reader should use.
    pub fn delimiter_byte(&self) -> ConfigResult<u8> {
        let delimiter = self.delimiter.unwrap_or(if self.tabs { '\t' } else { ',' });
        if delimiter.is_ascii() {
            Ok(delimiter as u8)
        } else {
            Err(ConfigurationError::InvalidOptions(format!(
                "delimiter '{}' is not an ASCII character",
                delimiter
            )))
        }
    }

    /// Number of rows before the first data row.
    pub fn rows_to_skip(&self) -> usize {
        self.start_row.saturating_sub(1)
    }

    /// Number of leading columns that do not belong to the schema.
    pub fn columns_to_skip(&self) -> usize {
        self.start_column.saturating_sub(1)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.start_row == 0 {
            return Err(ConfigurationError::InvalidOptions(
                "start_row is 1-based and must be at least 1".to_string(),
            ));
        }
        if self.start_column == 0 {
            return Err(ConfigurationError::InvalidOptions(
                "start_column is 1-based and must be at least 1".to_string(),
            ));
        }
        if let Some(label_row) = self.label_row {
            if label_row == 0 || label_row >= self.start_row {
                return Err(ConfigurationError::InvalidOptions(format!(
                    "label_row {} must be between 1 and start_row {} (exclusive)",
                    label_row, self.start_row
                )));
            }
        }
        if self.encoding.trim().is_empty() {
            return Err(ConfigurationError::InvalidOptions(
                "encoding may not be empty".to_string(),
            ));
        }
        self.delimiter_byte().map(|_| ())
    }
}
