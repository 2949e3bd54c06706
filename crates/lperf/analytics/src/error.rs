use lperf_types::{ForecastAlgorithm, Metric, SubjectId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a metric was rejected for forecast training.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationFailure {
    /// Fewer usable samples than the training minimum.
    #[error("too few samples: {actual} < {required}")]
    TooFewSamples { required: usize, actual: usize },
    /// Too small a share of the samples are finite.
    #[error("too few finite values: {finite} of {total}")]
    TooFewFinite { finite: usize, total: usize },
    /// Physically non-negative metric contains negative values.
    #[error("{count} negative values")]
    NegativeValues { count: usize },
    /// All finite samples are equal.
    #[error("series has no variance")]
    NoVariance,
}

/// Errors from the analytics subsystem.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("insufficient data for {metric}: need {required}, have {actual}")]
    InsufficientData {
        metric: Metric,
        required: usize,
        actual: usize,
    },

    #[error("model not trained: {algorithm} for {metric} on {subject}")]
    ModelNotTrained {
        subject: SubjectId,
        algorithm: ForecastAlgorithm,
        metric: Metric,
    },

    #[error("subject not found: {0}")]
    SubjectNotFound(SubjectId),

    #[error("series not found: {metric} on {subject}")]
    SeriesNotFound { subject: SubjectId, metric: Metric },

    #[error("series for {metric} contains non-finite values")]
    NonFiniteSeries { metric: Metric },

    #[error("analysis cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("analysis task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<toml::de::Error> for AnalyticsError {
    fn from(e: toml::de::Error) -> Self {
        AnalyticsError::Config(e.to_string())
    }
}

/// Convenience type alias for analytics results.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
