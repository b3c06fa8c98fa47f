//! # CSV Harvester - declarative CSV to record harvesting
//!
//! A schema (the "harvester") declares fields in column order. Each CSV row
//! is bound to the schema, its fields are resolved lazily through a filter
//! and validation pipeline, and the resulting records can be saved to a
//! persistence target.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│  RowReader  │────▶│   Record    │────▶│    Model    │
//! │  (any enc.) │     │  (decoded)  │     │ (lazy, per  │     │  (commit +  │
//! │             │     │             │     │   schema)   │     │  associate) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                               ▲
//!                                         ┌─────┴─────┐
//!                                         │  Schema   │
//!                                         │ (fields,  │
//!                                         │ filters,  │
//!                                         │  hooks)   │
//!                                         └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use csv_harvester::{Field, Processor, Schema};
//! use std::sync::Arc;
//!
//! let schema = Schema::builder("People")
//!     .field("name", Field::text().max_length(40))
//!     .field("age", Field::integer())
//!     .build()?;
//!
//! let mut processor = Processor::new(Arc::new(schema));
//! processor.parse_file("people.csv")?;
//! eprintln!("{}", processor.summary());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`fields`] - Field descriptors and kinds
//! - [`filters`] - Value filters and the declarative filter library
//! - [`schema`] - Validated, ordered field collections
//! - [`record`] - Row binding and lazy field resolution
//! - [`persistence`] - Model traits and the in-memory model
//! - [`parser`] - Encoding-aware CSV row reader
//! - [`config`] - Harvest options and JSON schema files
//! - [`processor`] - Batch harvesting and saving
//! - [`logs`] - Warnings channel

// Core modules
pub mod error;
pub mod fields;
pub mod filters;
pub mod schema;

// Binding and resolution
pub mod record;

// Persistence
pub mod persistence;

// Reading
pub mod config;
pub mod parser;
pub mod processor;

// Logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigurationError,
    HarvestError,
    HarvestResult,
    PersistError,
    ReaderError,
    ValidationError,
    ValidationErrorKind,
};

// =============================================================================
// Re-exports - Schema
// =============================================================================

pub use fields::{BooleanKeywords, DefaultsOrder, Field, FieldKind, FieldType, Relation};
pub use filters::{Filter, FilterChain, FilterSpec};
pub use schema::{CleanHook, RecordHook, Schema, SchemaBuilder};

// =============================================================================
// Re-exports - Records
// =============================================================================

pub use record::{EntityBatch, Record};
pub use persistence::{Entity, MemoryModel, Model, ModelInstance, RelatedModel};

// =============================================================================
// Re-exports - Harvesting
// =============================================================================

pub use config::{HarvestOptions, InvalidRowPolicy, SchemaConfig};
pub use parser::{decode_content, detect_encoding, Row, RowReader};
pub use processor::{HarvestSummary, Processor};
pub use logs::{HarvestWarning, LogEntry, LogLevel, WarningCategory, LOG_BROADCASTER};
