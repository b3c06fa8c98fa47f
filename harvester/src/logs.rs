//! Harvest log and warnings channel.
//!
//! Every log entry is written through `tracing` and broadcast to any
//! subscriber, so an embedding application can observe warnings such as
//! column-count mismatches without scraping output.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Named categories of non-fatal warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCategory {
    /// A row has fewer or more cells than the schema reads.
    ColumnCountMismatch,
    /// A row failed validation and was dropped.
    SkippedRow,
}

/// A non-fatal condition met while harvesting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HarvestWarning {
    /// Fewer cells than expected; missing fields resolve to their defaults.
    ShortRow {
        line: Option<usize>,
        expected: usize,
        found: usize,
    },
    /// More cells than expected; the extra ones are ignored.
    TrailingColumns { line: Option<usize>, ignored: usize },
    /// The row was skipped because a field failed validation.
    SkippedRow { line: usize, reason: String },
}

impl HarvestWarning {
    pub fn category(&self) -> WarningCategory {
        match self {
            Self::ShortRow { .. } | Self::TrailingColumns { .. } => {
                WarningCategory::ColumnCountMismatch
            }
            Self::SkippedRow { .. } => WarningCategory::SkippedRow,
        }
    }
}

impl fmt::Display for HarvestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = |line: &Option<usize>| line.map(|l| format!("Line {}: ", l)).unwrap_or_default();
        match self {
            Self::ShortRow {
                line,
                expected,
                found,
            } => write!(
                f,
                "{}row shorter than schema ({} columns defined in harvester, {} in the file)",
                at(line),
                expected,
                found
            ),
            Self::TrailingColumns { line, ignored } => write!(
                f,
                "{}{} trailing column{} will be ignored",
                at(line),
                ignored,
                if *ignored == 1 { "" } else { "s" }
            ),
            Self::SkippedRow { line, reason } => {
                write!(f, "Line {}: row skipped: {}", line, reason)
            }
        }
    }
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Set for warnings
    #[serde(default)]
    pub category: Option<WarningCategory>,
    /// Nesting depth for display
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), category: None, indent: 0 }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into(), category: None, indent: 0 }
    }

    pub fn warning(warning: &HarvestWarning) -> Self {
        Self {
            level: LogLevel::Warning,
            message: warning.to_string(),
            category: Some(warning.category()),
            indent: 0,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into(), category: None, indent: 0 }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all subscribers
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Write an entry through `tracing` and send it to all subscribers
    pub fn log(&self, entry: LogEntry) {
        let indent = "   ".repeat(entry.indent as usize);
        match (entry.level, entry.category) {
            (LogLevel::Info, _) => tracing::info!("{}{}", indent, entry.message),
            (LogLevel::Success, _) => tracing::info!("{}✓ {}", indent, entry.message),
            (LogLevel::Warning, Some(category)) => {
                tracing::warn!(category = ?category, "{}{}", indent, entry.message)
            }
            (LogLevel::Warning, None) => tracing::warn!("{}{}", indent, entry.message),
            (LogLevel::Error, _) => tracing::error!("{}{}", indent, entry.message),
        }

        // No subscribers is fine
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::success(msg));
}

pub fn log_warning(warning: &HarvestWarning) {
    LOG_BROADCASTER.log(LogEntry::warning(warning));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::info(msg).with_indent(indent));
}
