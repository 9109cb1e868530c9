//! Typed failures raised by the core.
//!
//! Only two things can go wrong inside the analytics pipeline: the caller
//! asks for an impossible read window, or the exporter is handed data (or a
//! font) it cannot serialize. An empty result set is never an error.

use thiserror::Error;

/// A rejected read window. Surfaced to the caller as a bad request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("skip must not be negative (got {0})")]
    NegativeSkip(i64),

    #[error("limit must be between 1 and {max} (got {got})")]
    LimitOutOfRange { got: i64, max: i64 },

    #[error("invalid {field}: '{value}' is not an ISO 8601 date or timestamp")]
    InvalidDate { field: &'static str, value: String },

    #[error("start_date ({start}) is after end_date ({end})")]
    InvertedDateRange { start: String, end: String },

    #[error("invalid {field}: '{value}' is not a number")]
    InvalidScore { field: &'static str, value: String },

    #[error("{field} must be within [0, 1] (got {value})")]
    ScoreOutOfRange { field: &'static str, value: f64 },

    #[error("min_score ({min}) is greater than max_score ({max})")]
    InvertedScoreRange { min: f64, max: f64 },
}

/// The renderer could not produce a complete document.
///
/// No partial output is ever returned alongside this error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExportError {
    #[error("record {id} for query '{query}' has a non-finite score")]
    NonFiniteScore { id: i64, query: String },

    #[error("summary for '{query}' reports {count} records but carries {details}")]
    InconsistentSummary {
        query: String,
        count: usize,
        details: usize,
    },

    #[error("pdf serialization failed: {0}")]
    Pdf(String),

    #[error("unusable report font: {0}")]
    Font(String),
}
