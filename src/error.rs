//! Error types for Keystroke Flux

use thiserror::Error;

/// Errors that can occur during ingestion or computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("keystrokes must have column '{0}'")]
    MissingColumn(String),

    #[error("Row {row}: missing required value for '{field}'")]
    MissingField { row: usize, field: String },

    #[error("Row {row}: unparsable timestamp '{value}'")]
    TimestampParse { row: usize, value: String },

    #[error("Row {row}: unknown event_type '{value}' (expected keydown or keyup)")]
    InvalidEventType { row: usize, value: String },

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl ComputeError {
    /// Row index for row-level errors, `None` for input-wide failures.
    pub fn row(&self) -> Option<usize> {
        match self {
            ComputeError::MissingField { row, .. }
            | ComputeError::TimestampParse { row, .. }
            | ComputeError::InvalidEventType { row, .. } => Some(*row),
            _ => None,
        }
    }
}
