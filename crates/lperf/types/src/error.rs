//! Parse errors for textual identifiers.

use thiserror::Error;

/// Failure to parse one of the enumerated identifiers from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown forecast algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("unknown comparator: {0}")]
    UnknownComparator(String),

    #[error("unknown alert severity: {0}")]
    UnknownSeverity(String),
}
