//! Metric identifiers, subjects, samples and series.
//!
//! A [`Subject`](SubjectId) owns one [`MetricSeries`] per [`Metric`]. Series
//! are append-only: samples arrive from the collector in non-decreasing
//! timestamp order and are never reordered or edited afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A tracked performance metric.
///
/// The built-in metrics have dedicated variants so detectors can match on
/// them; anything else the collector reports is carried as [`Metric::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Metric {
    /// CPU usage in percent.
    Cpu,
    /// Resident memory in MB.
    Memory,
    /// Network throughput in KB/s.
    Network,
    /// Frames per second.
    Fps,
    /// Battery level in percent.
    Battery,
    /// Application startup latency in seconds.
    StartupTime,
    /// Any other metric, by name.
    Custom(String),
}

impl Metric {
    /// The built-in metrics, in report order.
    pub const BUILTIN: [Metric; 6] = [
        Metric::Cpu,
        Metric::Memory,
        Metric::Network,
        Metric::Fps,
        Metric::Battery,
        Metric::StartupTime,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::Network => "network",
            Metric::Fps => "fps",
            Metric::Battery => "battery",
            Metric::StartupTime => "startup_time",
            Metric::Custom(name) => name,
        }
    }

    /// Upper-case label used in generated recommendations, e.g. `CPU`.
    pub fn label(&self) -> String {
        self.as_str().to_uppercase()
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, Metric::Custom(_))
    }

    /// Metric for a collector-supplied name. Built-in names and aliases map
    /// to their variants, so the result never shadows a built-in metric.
    pub fn custom(name: impl AsRef<str>) -> Self {
        Metric::from(name.as_ref())
    }

    /// Serialized form. A custom name that would parse back as something
    /// else (a built-in alias, surrounding whitespace) carries the
    /// `custom:` prefix.
    fn wire_name(&self) -> String {
        match self {
            Metric::Custom(name) if Metric::from(name.as_str()) != *self => {
                format!("{CUSTOM_PREFIX}{name}")
            }
            other => other.as_str().to_string(),
        }
    }
}

const CUSTOM_PREFIX: &str = "custom:";

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Metric {
    fn from(name: &str) -> Self {
        if let Some(custom) = name.strip_prefix(CUSTOM_PREFIX) {
            return Metric::Custom(custom.to_string());
        }
        match name.trim().to_ascii_lowercase().as_str() {
            "cpu" => Metric::Cpu,
            "memory" | "mem" => Metric::Memory,
            "network" | "net" => Metric::Network,
            "fps" => Metric::Fps,
            "battery" => Metric::Battery,
            "startup_time" | "startup" => Metric::StartupTime,
            _ => Metric::Custom(name.trim().to_string()),
        }
    }
}

impl From<String> for Metric {
    fn from(name: String) -> Self {
        Metric::from(name.as_str())
    }
}

impl From<Metric> for String {
    fn from(metric: Metric) -> Self {
        metric.wire_name()
    }
}

impl FromStr for Metric {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Metric::from(s))
    }
}

/// Identifier of a monitored subject: an application id or the reserved
/// device-wide `global` aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Name of the reserved device-wide aggregate subject.
    pub const GLOBAL: &'static str = "global";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn global() -> Self {
        Self(Self::GLOBAL.to_string())
    }

    pub fn is_global(&self) -> bool {
        self.0 == Self::GLOBAL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SubjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single time-stamped observation. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl MetricSample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// A sample stamped with the current wall-clock time.
    pub fn now(value: f64) -> Self {
        Self::new(Utc::now(), value)
    }
}

/// Append-only, chronologically ordered sample log for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    metric: Metric,
    samples: Vec<MetricSample>,
}

impl MetricSeries {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            samples: Vec::new(),
        }
    }

    /// Build a series from already ordered samples.
    pub fn from_samples(metric: Metric, samples: Vec<MetricSample>) -> Self {
        Self { metric, samples }
    }

    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    /// Append a sample. Ordering is the caller's responsibility.
    pub fn push(&mut self, sample: MetricSample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    /// The most recent `n` samples (or all of them if fewer exist).
    pub fn tail(&self, n: usize) -> &[MetricSample] {
        let start = self.samples.len().saturating_sub(n);
        &self.samples[start..]
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn latest(&self) -> Option<&MetricSample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn metric_names_round_trip() {
        for metric in Metric::BUILTIN {
            assert_eq!(Metric::from(metric.as_str()), metric);
        }
        assert_eq!(Metric::from("STARTUP"), Metric::StartupTime);
        assert_eq!(
            Metric::from("gpu_temp"),
            Metric::Custom("gpu_temp".to_string())
        );
    }

    #[test]
    fn metric_serializes_as_plain_string() {
        let json = serde_json::to_string(&Metric::StartupTime).unwrap();
        assert_eq!(json, "\"startup_time\"");
        let back: Metric = serde_json::from_str("\"fps\"").unwrap();
        assert_eq!(back, Metric::Fps);
    }

    #[test]
    fn custom_metric_never_turns_builtin() {
        for metric in [
            Metric::Custom("cpu".to_string()),
            Metric::Custom("mem".to_string()),
            Metric::Custom(" gpu ".to_string()),
            Metric::Custom("custom:cpu".to_string()),
            Metric::Custom("gpu_temp".to_string()),
        ] {
            let json = serde_json::to_string(&metric).unwrap();
            let back: Metric = serde_json::from_str(&json).unwrap();
            assert_eq!(back, metric, "{json}");
        }
        assert_eq!(
            serde_json::to_string(&Metric::Custom("gpu_temp".to_string())).unwrap(),
            "\"gpu_temp\""
        );
        assert_eq!(Metric::custom("CPU"), Metric::Cpu);
        assert_eq!(Metric::custom("gpu_temp"), Metric::Custom("gpu_temp".to_string()));
    }

    #[test]
    fn metric_label_is_upper_case() {
        assert_eq!(Metric::Cpu.label(), "CPU");
        assert_eq!(Metric::StartupTime.label(), "STARTUP_TIME");
    }

    #[test]
    fn global_subject() {
        assert!(SubjectId::global().is_global());
        assert!(!SubjectId::new("com.example.app").is_global());
    }

    #[test]
    fn series_tail_and_latest() {
        let start = Utc::now();
        let mut series = MetricSeries::new(Metric::Cpu);
        for i in 0..5 {
            series.push(MetricSample::new(start + Duration::seconds(i), i as f64));
        }
        assert_eq!(series.len(), 5);
        assert_eq!(series.tail(2).len(), 2);
        assert_eq!(series.tail(10).len(), 5);
        assert_eq!(series.latest().map(|s| s.value), Some(4.0));
        assert_eq!(series.values(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }
}
