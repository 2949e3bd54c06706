//! Forecast algorithms and forecast results.

use crate::analysis::TrendDirection;
use crate::error::ParseError;
use crate::metric::{Metric, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Relative band around the first predicted value inside which a forecast
/// is considered flat.
pub const FLAT_FORECAST_BAND: f64 = 0.05;

/// Closed-form extrapolation used to forecast a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastAlgorithm {
    MovingAverage,
    LinearRegression,
    TrendExtrapolation,
}

impl ForecastAlgorithm {
    pub const ALL: [ForecastAlgorithm; 3] = [
        ForecastAlgorithm::MovingAverage,
        ForecastAlgorithm::LinearRegression,
        ForecastAlgorithm::TrendExtrapolation,
    ];

    /// Fixed reliability weight applied to every confidence score.
    pub fn reliability(self) -> f64 {
        match self {
            ForecastAlgorithm::MovingAverage => 0.8,
            ForecastAlgorithm::LinearRegression => 0.9,
            ForecastAlgorithm::TrendExtrapolation => 0.7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ForecastAlgorithm::MovingAverage => "moving_average",
            ForecastAlgorithm::LinearRegression => "linear_regression",
            ForecastAlgorithm::TrendExtrapolation => "trend_extrapolation",
        }
    }
}

impl fmt::Display for ForecastAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForecastAlgorithm {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "moving_average" | "ma" => Ok(ForecastAlgorithm::MovingAverage),
            "linear_regression" | "lr" => Ok(ForecastAlgorithm::LinearRegression),
            "trend_extrapolation" | "trend" => Ok(ForecastAlgorithm::TrendExtrapolation),
            other => Err(ParseError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Lifecycle of a model entry for one (subject, algorithm, metric).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Untrained,
    Trained,
    /// Trained, but the series has grown since.
    Stale,
}

/// A short-horizon forecast for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub subject: SubjectId,
    pub metric: Metric,
    pub algorithm: ForecastAlgorithm,
    pub horizon: usize,
    /// Predicted values, one per step, always `>= 0`.
    pub predicted_values: Vec<f64>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Backtested accuracy of the model that produced this forecast.
    pub accuracy: f64,
    /// Whether the model was trained on fewer samples than now exist.
    pub stale: bool,
    pub generated_at: DateTime<Utc>,
}

impl Forecast {
    /// Direction of the predicted path, comparing the last step to the first.
    pub fn direction(&self) -> TrendDirection {
        let (first, last) = match (self.predicted_values.first(), self.predicted_values.last()) {
            (Some(first), Some(last)) if self.predicted_values.len() >= 2 => (*first, *last),
            _ => return TrendDirection::InsufficientData,
        };
        let band = first.abs() * FLAT_FORECAST_BAND;
        if last > first + band {
            TrendDirection::Increasing
        } else if last < first - band {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }

    /// Spread between the largest and smallest predicted value.
    pub fn range(&self) -> f64 {
        let max = self
            .predicted_values
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let min = self
            .predicted_values
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        if self.predicted_values.is_empty() {
            0.0
        } else {
            max - min
        }
    }
}
