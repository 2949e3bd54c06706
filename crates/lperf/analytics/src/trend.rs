use crate::config::TrendConfig;
use crate::stats;
use lperf_types::{Metric, TrendDirection, TrendResult};

/// Classifies the direction of a metric series.
#[derive(Debug, Clone, Default)]
pub struct TrendAnalyzer {
    config: TrendConfig,
}

impl TrendAnalyzer {
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    /// Normalized trend and its classification. Short series come back as
    /// [`TrendDirection::InsufficientData`] with a zero coefficient.
    pub fn analyze(&self, metric: &Metric, values: &[f64]) -> TrendResult {
        if values.len() < self.config.min_samples {
            return TrendResult::insufficient(metric.clone(), values.len());
        }

        let coefficient = stats::normalized_trend(values);
        TrendResult {
            metric: metric.clone(),
            coefficient,
            direction: self.classify(coefficient),
            moving_average: stats::moving_average(values, self.config.moving_average_window),
            data_points: values.len(),
        }
    }

    fn classify(&self, coefficient: f64) -> TrendDirection {
        let threshold = self.config.direction_threshold;
        if coefficient > threshold {
            TrendDirection::Increasing
        } else if coefficient < -threshold {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }
}
