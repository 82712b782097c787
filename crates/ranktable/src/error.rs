//! Error types for the ranktable library.

use std::path::PathBuf;
use thiserror::Error;

use crate::formula::FormulaError;

/// Main error type for ranktable operations.
///
/// Model mutations never fail with this type: structural misuse is reported
/// through `bool`/`Option` returns and malformed cells degrade to sentinels.
/// Errors are reserved for I/O, persistence and transport boundaries.
#[derive(Debug, Error)]
pub enum RankTableError {
    /// Error reading or writing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Regex compilation error.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A user formula failed to compile.
    #[error("Formula error: {0}")]
    Formula(#[from] FormulaError),

    /// A dump referenced data the provider cannot resolve.
    #[error("Invalid dump: {0}")]
    InvalidDump(String),

    /// A ranking handle no longer refers to a live ranking.
    #[error("Unknown ranking: {0}")]
    UnknownRanking(String),

    /// A column handle or column name could not be resolved.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A data index past the end of the provider's rows.
    #[error("Unknown row: {0}")]
    UnknownRow(usize),

    /// A set of rows did not line up with the indices it was fetched for.
    #[error("Expected {expected} rows, got {actual}")]
    RowMismatch { expected: usize, actual: usize },

    /// Transport error from the HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote backend answered with an error.
    #[error("Remote backend error: {0}")]
    Remote(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RankTableError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RankTableError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for ranktable operations.
pub type Result<T> = std::result::Result<T, RankTableError>;
