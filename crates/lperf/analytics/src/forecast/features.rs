//! Training data validation and feature extraction.

use crate::config::ForecastConfig;
use crate::error::ValidationFailure;
use crate::stats;
use lperf_types::{Metric, MetricSeries};
use serde::{Deserialize, Serialize};

/// Summary features of one training series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub variance: f64,
    pub median: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    /// Normalized trend coefficient.
    pub trend: f64,
    /// `(last - first) / n`.
    pub slope: f64,
    pub trend_strength: f64,
    /// Std of successive relative returns.
    pub volatility: f64,
    pub p25: f64,
    pub p75: f64,
    pub iqr: f64,
    /// Mean gap between consecutive samples, seconds.
    pub time_gap_mean: Option<f64>,
    pub time_gap_variance: Option<f64>,
}

impl FeatureVector {
    /// Extract features from finite values and the matching sample gaps.
    pub fn extract(values: &[f64], time_gaps: &[f64]) -> Self {
        let summary = stats::describe(values);
        let trend = stats::normalized_trend(values);
        let slope = match (values.first(), values.last()) {
            (Some(first), Some(last)) => (last - first) / values.len() as f64,
            _ => 0.0,
        };
        let p25 = stats::percentile(values, 25.0);
        let p75 = stats::percentile(values, 75.0);
        let (time_gap_mean, time_gap_variance) = if time_gaps.is_empty() {
            (None, None)
        } else {
            (Some(stats::mean(time_gaps)), Some(stats::variance(time_gaps)))
        };

        Self {
            mean: summary.mean,
            std: summary.std_dev,
            min: summary.min,
            max: summary.max,
            range: summary.max - summary.min,
            variance: summary.variance,
            median: stats::median(values),
            skewness: stats::skewness(values),
            kurtosis: stats::kurtosis(values),
            trend,
            slope,
            trend_strength: trend.abs(),
            volatility: stats::relative_volatility(values),
            p25,
            p75,
            iqr: p75 - p25,
            time_gap_mean,
            time_gap_variance,
        }
    }
}

/// A validated series ready for model fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSeries {
    pub metric: Metric,
    /// Finite values, oldest first.
    pub values: Vec<f64>,
    /// Offset of each entry of `values` within the training window.
    pub positions: Vec<f64>,
    /// Samples in the training window, non-finite ones included.
    pub window_span: usize,
    pub features: FeatureVector,
    /// Length of the stored series at preparation time.
    pub series_len: usize,
}

/// Check the most recent `training_window` samples of a series and build
/// its training input.
pub fn prepare_series(
    series: &MetricSeries,
    config: &ForecastConfig,
) -> Result<TrainingSeries, ValidationFailure> {
    let samples = series.tail(config.training_window);
    let raw: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let values = validate(&raw, config)?;
    let positions = raw
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, _)| i as f64)
        .collect();

    let time_gaps: Vec<f64> = samples
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_milliseconds() as f64 / 1_000.0)
        .collect();

    Ok(TrainingSeries {
        metric: series.metric().clone(),
        features: FeatureVector::extract(&values, &time_gaps),
        values,
        positions,
        window_span: raw.len(),
        series_len: series.len(),
    })
}

/// Quality checks for training data. Returns the finite values on success.
pub fn validate(values: &[f64], config: &ForecastConfig) -> Result<Vec<f64>, ValidationFailure> {
    let required = config.min_training_samples;
    if values.len() < required {
        return Err(ValidationFailure::TooFewSamples {
            required,
            actual: values.len(),
        });
    }

    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if (finite.len() as f64) < values.len() as f64 * config.min_finite_fraction {
        return Err(ValidationFailure::TooFewFinite {
            finite: finite.len(),
            total: values.len(),
        });
    }
    if finite.len() < required {
        return Err(ValidationFailure::TooFewSamples {
            required,
            actual: finite.len(),
        });
    }

    let negative = finite.iter().filter(|v| **v < 0.0).count();
    if negative > 0 {
        return Err(ValidationFailure::NegativeValues { count: negative });
    }
    if stats::variance(&finite) == 0.0 {
        return Err(ValidationFailure::NoVariance);
    }
    Ok(finite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use lperf_types::MetricSample;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 10.0 + i as f64).collect()
    }

    #[test]
    fn validation_failures() {
        let config = ForecastConfig::default();
        assert_eq!(
            validate(&ramp(19), &config),
            Err(ValidationFailure::TooFewSamples {
                required: 20,
                actual: 19
            })
        );

        let mut with_nan = ramp(20);
        with_nan[0] = f64::NAN;
        with_nan[1] = f64::INFINITY;
        with_nan[2] = f64::NAN;
        assert_eq!(
            validate(&with_nan, &config),
            Err(ValidationFailure::TooFewFinite {
                finite: 17,
                total: 20
            })
        );

        let mut negative = ramp(20);
        negative[4] = -1.0;
        assert_eq!(
            validate(&negative, &config),
            Err(ValidationFailure::NegativeValues { count: 1 })
        );

        assert_eq!(validate(&[7.0; 30], &config), Err(ValidationFailure::NoVariance));
    }

    #[test]
    fn tolerated_nan_is_dropped() {
        let mut values = ramp(30);
        values[10] = f64::NAN;
        let cleaned = validate(&values, &ForecastConfig::default()).unwrap();
        assert_eq!(cleaned.len(), 29);
    }

    #[test]
    fn features_of_ramp() {
        let values = ramp(20);
        let features = FeatureVector::extract(&values, &[]);
        assert_eq!(features.min, 10.0);
        assert_eq!(features.max, 29.0);
        assert_eq!(features.range, 19.0);
        assert!((features.mean - 19.5).abs() < 1e-9);
        assert!((features.slope - 19.0 / 20.0).abs() < 1e-9);
        assert!((features.trend - 0.1).abs() < 1e-9);
        assert_eq!(features.trend_strength, features.trend);
        assert!((features.iqr - (features.p75 - features.p25)).abs() < 1e-12);
        assert!(features.time_gap_mean.is_none());
    }

    #[test]
    fn prepare_uses_training_window_and_gaps() {
        let start = Utc::now();
        let samples = (0..50)
            .map(|i| MetricSample::new(start + Duration::seconds(2 * i), 5.0 + (i % 7) as f64))
            .collect();
        let series = MetricSeries::from_samples(Metric::Cpu, samples);
        let config = ForecastConfig {
            training_window: 30,
            ..ForecastConfig::default()
        };

        let prepared = prepare_series(&series, &config).unwrap();
        assert_eq!(prepared.values.len(), 30);
        assert_eq!(prepared.series_len, 50);
        assert_eq!(prepared.window_span, 30);
        assert_eq!(prepared.features.time_gap_mean, Some(2.0));
        assert_eq!(prepared.features.time_gap_variance, Some(0.0));
    }

    #[test]
    fn prepare_keeps_window_offsets_of_finite_values() {
        let start = Utc::now();
        let samples = (0..25)
            .map(|i| {
                let value = if i == 3 { f64::NAN } else { 10.0 + i as f64 };
                MetricSample::new(start + Duration::seconds(i), value)
            })
            .collect();
        let series = MetricSeries::from_samples(Metric::Memory, samples);

        let prepared = prepare_series(&series, &ForecastConfig::default()).unwrap();
        assert_eq!(prepared.values.len(), 24);
        assert_eq!(prepared.window_span, 25);
        assert_eq!(prepared.positions[2], 2.0);
        assert_eq!(prepared.positions[3], 4.0);
        assert_eq!(prepared.positions.last(), Some(&24.0));
    }
}
