//! Fitted forecast models and their prediction math.

use super::features::TrainingSeries;
use crate::config::ForecastConfig;
use crate::stats;
use chrono::{DateTime, Utc};
use lperf_types::{ForecastAlgorithm, Metric, SubjectId};
use serde::{Deserialize, Serialize};

/// Fitted parameters, one variant per algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ModelParams {
    MovingAverage {
        window: usize,
        trend: f64,
        volatility: f64,
    },
    LinearRegression {
        slope: f64,
        intercept: f64,
        /// Samples in the fitted window, non-finite ones included; x = 0 is
        /// the oldest of them.
        window_span: usize,
    },
    TrendExtrapolation {
        trend_coefficient: f64,
        trend_strength: f64,
    },
}

impl ModelParams {
    pub fn algorithm(&self) -> ForecastAlgorithm {
        match self {
            ModelParams::MovingAverage { .. } => ForecastAlgorithm::MovingAverage,
            ModelParams::LinearRegression { .. } => ForecastAlgorithm::LinearRegression,
            ModelParams::TrendExtrapolation { .. } => ForecastAlgorithm::TrendExtrapolation,
        }
    }
}

/// A trained model. Immutable once built; retraining produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastModel {
    pub subject: SubjectId,
    pub metric: Metric,
    pub params: ModelParams,
    /// Backtested accuracy in `[0, 1]`.
    pub accuracy: f64,
    /// Stored series length when the model was fitted.
    pub trained_len: usize,
    pub trained_at: DateTime<Utc>,
}

impl ForecastModel {
    /// Fit `algorithm` to a prepared series.
    pub fn fit(
        subject: SubjectId,
        algorithm: ForecastAlgorithm,
        data: &TrainingSeries,
        config: &ForecastConfig,
    ) -> Self {
        let (params, accuracy) = match algorithm {
            ForecastAlgorithm::MovingAverage => fit_moving_average(data, &config.window_candidates),
            ForecastAlgorithm::LinearRegression => fit_linear_regression(data),
            ForecastAlgorithm::TrendExtrapolation => {
                fit_trend_extrapolation(data, config.trend_lookback)
            }
        };
        Self {
            subject,
            metric: data.metric.clone(),
            params,
            accuracy: accuracy.clamp(0.0, 1.0),
            trained_len: data.series_len,
            trained_at: Utc::now(),
        }
    }

    pub fn algorithm(&self) -> ForecastAlgorithm {
        self.params.algorithm()
    }

    /// Whether the series has grown since training.
    pub fn is_stale(&self, current_len: usize) -> bool {
        current_len > self.trained_len
    }

    /// Predict `horizon` steps past the end of `recent`, the finite tail of
    /// the current series whose full length is `current_len`. Every value
    /// is clamped to be non-negative.
    pub fn predict(&self, recent: &[f64], current_len: usize, horizon: usize) -> Vec<f64> {
        let steps = 0..horizon;
        let raw: Vec<f64> = match &self.params {
            ModelParams::MovingAverage { window, trend, .. } => {
                let tail = &recent[recent.len().saturating_sub(*window)..];
                let level = stats::mean(tail);
                steps.map(|i| level + trend * (i + 1) as f64).collect()
            }
            ModelParams::LinearRegression {
                slope,
                intercept,
                window_span,
            } => {
                let grown = current_len.saturating_sub(self.trained_len);
                let origin = (window_span + grown) as f64;
                steps.map(|i| slope * (origin + i as f64) + intercept).collect()
            }
            ModelParams::TrendExtrapolation {
                trend_coefficient, ..
            } => {
                let last = recent.last().copied().unwrap_or(0.0);
                steps
                    .map(|i| last * (1.0 + trend_coefficient * (i + 1) as f64))
                    .collect()
            }
        };
        raw.into_iter().map(|v| v.max(0.0)).collect()
    }

    /// Confidence of a prediction `horizon` steps out.
    pub fn confidence(&self, horizon: usize) -> f64 {
        confidence(self.accuracy, self.algorithm(), horizon)
    }
}

/// `accuracy · max(0.1, 1 − 0.1·horizon) · reliability`, clamped to
/// `[0, 1]`. Non-increasing in `horizon`.
pub fn confidence(accuracy: f64, algorithm: ForecastAlgorithm, horizon: usize) -> f64 {
    let decay = (1.0 - 0.1 * horizon as f64).max(0.1);
    (accuracy * decay * algorithm.reliability()).clamp(0.0, 1.0)
}

/// `max(0, 1 − RMSE / max(actual))`; 0 when the maximum is not positive.
pub fn backtest_accuracy(actual: &[f64], predicted: &[f64]) -> f64 {
    let peak = stats::max(actual);
    if peak <= 0.0 {
        return 0.0;
    }
    (1.0 - stats::rmse(actual, predicted) / peak).max(0.0)
}

/// Pick the candidate window with the best backtest accuracy. Candidates at
/// or above the series length are skipped; ties keep the earlier window.
pub fn select_window(values: &[f64], candidates: &[usize]) -> (usize, f64) {
    let mut best: Option<(usize, f64)> = None;
    for &window in candidates.iter().filter(|w| **w > 0 && **w < values.len()) {
        let accuracy = backtest_accuracy(values, &stats::moving_average(values, window));
        match best {
            Some((_, best_accuracy)) if accuracy <= best_accuracy => {}
            _ => best = Some((window, accuracy)),
        }
    }
    best.unwrap_or_else(|| {
        let window = candidates.first().copied().unwrap_or(1).clamp(1, values.len().max(1));
        (window, backtest_accuracy(values, values))
    })
}

fn fit_moving_average(data: &TrainingSeries, candidates: &[usize]) -> (ModelParams, f64) {
    let (window, accuracy) = select_window(&data.values, candidates);
    (
        ModelParams::MovingAverage {
            window,
            trend: data.features.trend,
            volatility: data.features.volatility,
        },
        accuracy,
    )
}

fn fit_linear_regression(data: &TrainingSeries) -> (ModelParams, f64) {
    let fit = stats::linear_regression_at(&data.positions, &data.values);
    let fitted: Vec<f64> = data.positions.iter().map(|x| fit.at(*x)).collect();
    (
        ModelParams::LinearRegression {
            slope: fit.slope,
            intercept: fit.intercept,
            window_span: data.window_span,
        },
        stats::r_squared(&data.values, &fitted),
    )
}

fn fit_trend_extrapolation(data: &TrainingSeries, lookback: usize) -> (ModelParams, f64) {
    let recent = &data.values[data.values.len().saturating_sub(lookback)..];
    let trend_coefficient = stats::normalized_trend(recent);
    (
        ModelParams::TrendExtrapolation {
            trend_coefficient,
            trend_strength: data.features.trend_strength,
        },
        (0.7 + trend_coefficient.abs() * 0.25).min(0.95),
    )
}
