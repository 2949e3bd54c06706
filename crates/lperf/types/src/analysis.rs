//! Trend and anomaly results.

use crate::metric::Metric;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction classification of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    /// Too few samples to classify.
    InsufficientData,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
            TrendDirection::InsufficientData => write!(f, "insufficient data"),
        }
    }
}

/// Trend of a single metric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub metric: Metric,
    /// Normalized trend coefficient in `[-1, 1]`.
    pub coefficient: f64,
    pub direction: TrendDirection,
    /// Smoothed series for visualization consumers.
    pub moving_average: Vec<f64>,
    /// Number of samples analyzed.
    pub data_points: usize,
}

impl TrendResult {
    pub fn insufficient(metric: Metric, data_points: usize) -> Self {
        Self {
            metric,
            coefficient: 0.0,
            direction: TrendDirection::InsufficientData,
            moving_average: Vec::new(),
            data_points,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        self.direction == TrendDirection::InsufficientData
    }
}

/// A single outlier. Carries the mean/std it was judged against so the
/// result can be reproduced without the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFinding {
    pub metric: Metric,
    pub index: usize,
    pub value: f64,
    /// Signed z-score `(value - mean) / std`.
    pub z_score: f64,
    pub mean: f64,
    pub std: f64,
}

impl AnomalyFinding {
    /// Whether the outlier lies above the mean.
    pub fn is_spike(&self) -> bool {
        self.z_score > 0.0
    }
}
