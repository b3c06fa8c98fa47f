//! Error types for the harvester.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ConfigurationError`] - The schema is malformed (always fatal)
//! - [`ValidationError`] - A single field value could not be cleaned (recoverable per row)
//! - [`PersistError`] - The persistence target refused a write
//! - [`ReaderError`] - The row source failed
//! - [`HarvestError`] - Top-level error wrapping all of the above
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use serde_json::Value;
use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// The schema (or its use) is malformed.
///
/// These indicate a schema-authoring defect rather than bad data, and are
/// never recovered from.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// Two fields were declared with the same name.
    #[error("Field '{field}' is declared more than once in harvester '{schema}'")]
    DuplicateField { schema: String, field: String },

    /// A field spans zero columns.
    #[error("Field '{field}' in harvester '{schema}' must span at least one column")]
    InvalidColspan { schema: String, field: String },

    /// A field targets a field that does not exist.
    #[error("Field '{field}' in harvester '{schema}' targets undefined field '{target}'")]
    UnknownTarget {
        schema: String,
        field: String,
        target: String,
    },

    /// A field targets itself.
    #[error("Field '{field}' in harvester '{schema}' cannot target itself")]
    SelfTarget { schema: String, field: String },

    /// Following `target` links leads back to the starting field.
    #[error("Target chain starting at field '{field}' in harvester '{schema}' loops back on itself")]
    TargetCycle { schema: String, field: String },

    /// A persisted field has no matching attribute on the model.
    #[error("The model {model} does not have a field named {field}, which was defined in harvester '{schema}'")]
    MissingModelAttribute {
        schema: String,
        model: String,
        field: String,
    },

    /// A field name was used that the schema does not define.
    #[error("Harvester '{schema}' has no field named '{field}'")]
    UnknownField { schema: String, field: String },

    /// A clean hook was registered for a field that does not exist.
    #[error("Clean hook registered for undefined field '{field}' in harvester '{schema}'")]
    UnknownHookField { schema: String, field: String },

    /// `process_first` or `process_last` names an undefined field.
    #[error("The field '{field}' referred to in '{list}' is undefined in harvester '{schema}'")]
    UnknownProcessingField {
        schema: String,
        list: &'static str,
        field: String,
    },

    /// A field's resolution required its own value.
    #[error("Cyclical dependency detected while resolving field '{field}' of harvester '{schema}'")]
    CyclicDependency { schema: String, field: String },

    /// Saving was requested but no persistence target is configured.
    #[error("No model defined for harvester '{schema}'")]
    NoModel { schema: String },

    /// A filter declaration could not be turned into a filter.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Harvest options are inconsistent.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// A schema file could not be read or parsed.
    #[error("Invalid schema file: {0}")]
    InvalidSchemaFile(String),
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Why a value failed to clean.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationErrorKind {
    /// The value is absent and the field does not allow blanks.
    Blank,
    /// The text is longer than `max_length` characters.
    MaxLength { length: usize, max: usize },
    /// The value is not an integer.
    NotInteger,
    /// The value is not a floating point number.
    NotFloat,
    /// The value is not a decimal number.
    NotDecimal,
    /// The value matched none of the boolean keyword sets.
    NotBoolean,
    /// A list was given where a single value is required.
    NotScalar,
    /// Raised by user code (clean hooks, final clean).
    Custom(String),
}

/// A single field's value could not be cleaned.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub value: Value,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, value: Value, kind: ValidationErrorKind) -> Self {
        Self {
            field: field.into(),
            value,
            kind,
        }
    }

    /// A free-form error raised from a clean hook.
    pub fn custom(field: impl Into<String>, value: Value, message: impl Into<String>) -> Self {
        Self::new(field, value, ValidationErrorKind::Custom(message.into()))
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = display_value(&self.value);
        match &self.kind {
            ValidationErrorKind::Blank => {
                write!(f, "The column {} may not be blank", self.field)
            }
            ValidationErrorKind::MaxLength { length, max } => write!(
                f,
                "The value in column {}, with a length of {}, exceeds maximum allowed length of {}. The value was: {}",
                self.field, length, max, value
            ),
            ValidationErrorKind::NotInteger => write!(
                f,
                "The value in column {} is not an integer. The value was: '{}'",
                self.field, value
            ),
            ValidationErrorKind::NotFloat => write!(
                f,
                "The value in column {} is not a number. The value was: '{}'",
                self.field, value
            ),
            ValidationErrorKind::NotDecimal => write!(
                f,
                "The value in column {} is not a decimal number. The value was: '{}'",
                self.field, value
            ),
            ValidationErrorKind::NotBoolean => write!(
                f,
                "The value in column {} could not be evaluated to boolean. The value was: '{}'",
                self.field, value
            ),
            ValidationErrorKind::NotScalar => write!(
                f,
                "The column {} expects a single value but received a list: {}",
                self.field, value
            ),
            ValidationErrorKind::Custom(message) => {
                write!(f, "The value in column {} is invalid: {}", self.field, message)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// Persistence Errors
// =============================================================================

/// The persistence target rejected an operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersistError {
    /// Commit of a record failed.
    #[error("Failed to save {model}: {message}")]
    SaveFailed { model: String, message: String },

    /// Attaching a related entity failed.
    #[error("Failed to attach {attribute} on {model}: {message}")]
    AssociateFailed {
        model: String,
        attribute: String,
        message: String,
    },
}

// =============================================================================
// Row Source Errors
// =============================================================================

/// The row source could not produce a row.
#[derive(Debug, Error)]
#[error("Line {line}: {message}")]
pub struct ReaderError {
    pub line: usize,
    pub message: String,
}

impl ReaderError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ReaderError {
    fn from(err: std::io::Error) -> Self {
        Self::new(0, format!("Cannot read file: {}", err))
    }
}

impl From<csv::Error> for ReaderError {
    fn from(err: csv::Error) -> Self {
        let line = err
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or_default();
        Self::new(line, format!("Invalid CSV format: {}", err))
    }
}

// =============================================================================
// Harvest Errors (top-level)
// =============================================================================

/// Top-level error returned by record resolution, the processor and saving.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Schema authoring defect.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A field value could not be cleaned.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A row failed validation while harvesting a batch.
    #[error("Row {line}: {source}")]
    InvalidRow {
        line: usize,
        #[source]
        source: ValidationError,
    },

    /// Persistence target failure.
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    /// Row source failure.
    #[error("Read error: {0}")]
    Reader(#[from] ReaderError),
}

impl HarvestError {
    /// Whether this error is bad data (skippable) rather than a defect.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidRow { .. })
    }

    /// The validation failure carried by this error, if any.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) | Self::InvalidRow { source: err, .. } => Some(err),
            _ => None,
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for schema declaration.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Result type for cleaning a single value.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Result type for row source operations.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Result type for harvesting.
pub type HarvestResult<T> = Result<T, HarvestError>;
