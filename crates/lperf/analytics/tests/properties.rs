//! Property tests for the statistics kernel, detectors and forecasting.

use chrono::{Duration, Utc};
use lperf_analytics::forecast::confidence;
use lperf_analytics::stats;
use lperf_analytics::{
    AnomalyDetector, BottleneckConfig, BottleneckDetector, ForecastEngine, SubjectSnapshot,
    TrendAnalyzer,
};
use lperf_types::{
    BottleneckKind, ForecastAlgorithm, Metric, MetricSample, MetricSeries, SubjectId,
    TrendDirection,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn arb_algorithm() -> impl Strategy<Value = ForecastAlgorithm> {
    prop_oneof![
        Just(ForecastAlgorithm::MovingAverage),
        Just(ForecastAlgorithm::LinearRegression),
        Just(ForecastAlgorithm::TrendExtrapolation),
    ]
}

fn arb_metric() -> impl Strategy<Value = Metric> {
    prop_oneof![
        Just(Metric::Cpu),
        Just(Metric::Memory),
        Just(Metric::Network),
        Just(Metric::Fps),
        Just(Metric::Battery),
    ]
}

/// Non-negative series with some variance, long enough to train on.
fn arb_training_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..500.0, 20..120)
        .prop_filter("needs variance", |v| !stats::is_constant(v))
}

fn series(metric: Metric, values: &[f64]) -> MetricSeries {
    let start = Utc::now();
    let samples = values
        .iter()
        .enumerate()
        .map(|(i, v)| MetricSample::new(start + Duration::seconds(i as i64), *v))
        .collect();
    MetricSeries::from_samples(metric, samples)
}

/// Thresholds low enough that only the constant-series guard can stop
/// volatility and trend rules from firing.
fn hair_trigger_rules() -> BottleneckConfig {
    let mut config = BottleneckConfig::default();
    config.cpu.volatility.max_variance = -1.0;
    config.cpu.volatility.min_samples = 0;
    config.cpu.trend.threshold = -1.0;
    config.cpu.trend.min_samples = 0;
    config.memory.growth.threshold = -1.0;
    config.memory.growth.min_samples = 0;
    config.network.volatility.max_variance = -1.0;
    config.network.volatility.min_samples = 0;
    config
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Variance and std of fewer than two samples are zero.
    #[test]
    fn short_series_have_zero_spread(values in prop::collection::vec(-1e6f64..1e6, 0..2)) {
        prop_assert_eq!(stats::variance(&values), 0.0);
        prop_assert_eq!(stats::std_dev(&values), 0.0);
    }

    /// Constant series have no trend, no anomalies, no volatility or trend
    /// findings, whatever the thresholds.
    #[test]
    fn constant_series_are_quiet(
        level in -1e9f64..1e9,
        len in 3usize..200,
        metric in prop_oneof![Just(Metric::Cpu), Just(Metric::Memory), Just(Metric::Network)],
    ) {
        let values = vec![level; len];
        prop_assert_eq!(stats::normalized_trend(&values), 0.0);
        prop_assert!(AnomalyDetector::with_defaults().detect(&metric, &values).is_empty());

        let trend = TrendAnalyzer::with_defaults().analyze(&metric, &values);
        prop_assert!(matches!(
            trend.direction,
            TrendDirection::Stable | TrendDirection::InsufficientData
        ));

        let findings = BottleneckDetector::new(hair_trigger_rules())
            .detect_metric(&SubjectId::global(), &metric, &values)
            .unwrap();
        prop_assert!(findings.iter().all(|f| !matches!(
            f.kind,
            BottleneckKind::Volatility | BottleneckKind::IncreasingTrend
        )));
    }

    /// A window at least as long as the series is the identity.
    #[test]
    fn oversized_window_is_identity(
        values in prop::collection::vec(-1e3f64..1e3, 0..50),
        extra in 0usize..10,
    ) {
        let window = values.len() + extra;
        prop_assert_eq!(stats::moving_average(&values, window), values);
    }

    /// Normalized trend stays within [-1, 1].
    #[test]
    fn normalized_trend_is_bounded(values in prop::collection::vec(-1e6f64..1e6, 0..100)) {
        let trend = stats::normalized_trend(&values);
        prop_assert!((-1.0..=1.0).contains(&trend));
    }

    /// Confidence never grows with the horizon and stays within [0, 1].
    #[test]
    fn confidence_is_monotone_in_horizon(
        accuracy in 0.0f64..=1.0,
        algorithm in arb_algorithm(),
        h1 in 0usize..30,
        step in 1usize..30,
    ) {
        let near = confidence(accuracy, algorithm, h1);
        let far = confidence(accuracy, algorithm, h1 + step);
        prop_assert!(near >= far);
        prop_assert!((0.0..=1.0).contains(&near));
        prop_assert!((0.0..=1.0).contains(&far));
    }

    /// Trained models never predict negative values and their confidence
    /// respects the horizon ordering.
    #[test]
    fn forecasts_are_non_negative(
        values in arb_training_values(),
        metric in arb_metric(),
        algorithm in arb_algorithm(),
        horizon in 1usize..40,
    ) {
        let subject = SubjectId::global();
        let engine = ForecastEngine::with_defaults();
        let data = series(metric.clone(), &values);
        let snapshot = SubjectSnapshot::from_series(subject.clone(), vec![data.clone()]);

        let set = engine.prepare_training_data(&snapshot);
        prop_assert_eq!(set.accepted.len(), 1);
        engine.train_all(algorithm, &set);

        let near = engine.predict(&subject, algorithm, &data, horizon).unwrap();
        let far = engine.predict(&subject, algorithm, &data, horizon + 1).unwrap();
        prop_assert_eq!(near.predicted_values.len(), horizon);
        prop_assert!(near.predicted_values.iter().all(|v| *v >= 0.0));
        prop_assert!(far.predicted_values.iter().all(|v| *v >= 0.0));
        prop_assert!(near.confidence >= far.confidence);
        prop_assert!((0.0..=1.0).contains(&near.accuracy));
    }

    /// Every anomaly found actually exceeds the threshold it was scored with.
    #[test]
    fn anomalies_exceed_threshold(values in prop::collection::vec(0.0f64..100.0, 20..80)) {
        for finding in AnomalyDetector::with_defaults().detect(&Metric::Cpu, &values) {
            prop_assert!(finding.z_score.abs() > 3.0);
            prop_assert!(finding.std > 0.0);
            prop_assert_eq!(finding.value, values[finding.index]);
        }
    }
}
