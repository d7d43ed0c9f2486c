//! Error types for the generation pipeline.
//!
//! [`ConfigError`] is fatal to a batch and is reported before any row runs.
//! [`RowError`] affects a single row, which stays unprocessed so a later
//! resume retries it.

use thiserror::Error;

/// Configuration problems that stop a batch before it starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing mandatory columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("titles per row must be between 1 and 10, got {0}")]
    TitlesPerRow(usize),

    #[error("at most 2 starred fields may be configured, got {0}")]
    TooManyStarred(usize),

    #[error("starred field '{0}' is not a column of the input")]
    UnknownStarredField(String),

    #[error("dedup threshold {name} must be within [0, 1], got {value}")]
    Threshold { name: &'static str, value: f64 },

    #[error("history_threshold ({warn}) must not exceed history_reject_threshold ({reject})")]
    ThresholdOrder { warn: f64, reject: f64 },

    #[error("saved progress covers {progress} rows but the input has {input}")]
    ProgressMismatch { progress: usize, input: usize },

    #[error("missing credentials: {0}")]
    MissingCredentials(String),
}

/// Malformed data in a single row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("row {row}: mandatory field '{column}' is empty")]
    MissingField { row: usize, column: &'static str },
}
