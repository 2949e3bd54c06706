use crate::config::AnomalyConfig;
use crate::stats;
use lperf_types::{AnomalyFinding, Metric};

/// Z-score outlier scan.
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    /// Samples whose `|z|` exceeds the configured threshold.
    ///
    /// Yields nothing for short series, zero-variance series and series
    /// containing non-finite values. Each finding carries the mean and std it
    /// was scored against.
    pub fn detect(&self, metric: &Metric, values: &[f64]) -> Vec<AnomalyFinding> {
        if values.len() < self.config.min_samples || values.iter().any(|v| !v.is_finite()) {
            return Vec::new();
        }
        let std = stats::std_dev(values);
        if std == 0.0 {
            return Vec::new();
        }
        let mean = stats::mean(values);

        stats::z_scores(values)
            .into_iter()
            .enumerate()
            .filter(|(_, z)| z.abs() > self.config.z_threshold)
            .map(|(index, z_score)| AnomalyFinding {
                metric: metric.clone(),
                index,
                value: values[index],
                z_score,
                mean,
                std,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spike_series() -> Vec<f64> {
        let mut values = vec![50.0; 20];
        values[12] = 200.0;
        values
    }

    #[test]
    fn single_outlier_found() {
        let findings = AnomalyDetector::with_defaults().detect(&Metric::Cpu, &spike_series());
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.index, 12);
        assert_eq!(finding.value, 200.0);
        assert!((finding.mean - 57.5).abs() < 1e-9);
        assert!((finding.std - 32.69).abs() < 0.01);
        assert!((finding.z_score - 4.36).abs() < 0.01);
        assert!(finding.is_spike());
    }

    #[test]
    fn dip_has_negative_score() {
        let mut values = vec![60.0; 25];
        values[3] = 0.0;
        let findings = AnomalyDetector::with_defaults().detect(&Metric::Fps, &values);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].z_score < -3.0);
        assert!(!findings[0].is_spike());
    }

    #[test]
    fn requires_twenty_samples() {
        let mut values = vec![50.0; 19];
        values[5] = 500.0;
        assert!(AnomalyDetector::with_defaults()
            .detect(&Metric::Cpu, &values)
            .is_empty());
    }

    #[test]
    fn constant_series_has_no_anomalies() {
        assert!(AnomalyDetector::with_defaults()
            .detect(&Metric::Memory, &[123.0; 40])
            .is_empty());
    }

    #[test]
    fn non_finite_series_is_ignored() {
        let mut values = spike_series();
        values[0] = f64::NAN;
        assert!(AnomalyDetector::with_defaults()
            .detect(&Metric::Cpu, &values)
            .is_empty());
    }

    #[test]
    fn lower_threshold_flags_more() {
        let detector = AnomalyDetector::new(AnomalyConfig {
            min_samples: 5,
            z_threshold: 1.0,
        });
        let findings = detector.detect(&Metric::Network, &[1.0, 1.0, 1.0, 1.0, 10.0]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].index, 4);
    }
}
