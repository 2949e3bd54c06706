//! Append-only time-series store.
//!
//! The collector is the only writer; analysis reads through
//! [`SubjectSnapshot`]s copied under the read lock, so an append running
//! concurrently with analysis is either fully visible or not at all.

use chrono::{DateTime, Utc};
use lperf_types::{Metric, MetricSample, MetricSeries, SubjectId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Immutable copy of one subject's series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectSnapshot {
    pub subject: SubjectId,
    pub taken_at: DateTime<Utc>,
    series: BTreeMap<Metric, MetricSeries>,
}

impl SubjectSnapshot {
    /// Build a snapshot directly from series, for standalone analysis of
    /// data that never went through a store.
    pub fn from_series(subject: SubjectId, series: impl IntoIterator<Item = MetricSeries>) -> Self {
        Self {
            subject,
            taken_at: Utc::now(),
            series: series
                .into_iter()
                .map(|s| (s.metric().clone(), s))
                .collect(),
        }
    }

    pub fn metrics(&self) -> impl Iterator<Item = &Metric> {
        self.series.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Metric, &MetricSeries)> {
        self.series.iter()
    }

    pub fn series(&self, metric: &Metric) -> Option<&MetricSeries> {
        self.series.get(metric)
    }

    pub fn values(&self, metric: &Metric) -> Option<Vec<f64>> {
        self.series.get(metric).map(MetricSeries::values)
    }

    /// Latest value of every non-empty series.
    pub fn latest_values(&self) -> HashMap<Metric, f64> {
        self.series
            .iter()
            .filter_map(|(m, s)| s.latest().map(|sample| (m.clone(), sample.value)))
            .collect()
    }

    /// Total samples across all series.
    pub fn data_points(&self) -> usize {
        self.series.values().map(MetricSeries::len).sum()
    }

    pub fn metric_count(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Per-(subject, metric) append-only sample logs.
#[derive(Default)]
pub struct TimeSeriesStore {
    subjects: RwLock<HashMap<SubjectId, BTreeMap<Metric, MetricSeries>>>,
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample and return the new length of its series.
    ///
    /// Samples must arrive in non-decreasing timestamp order per series; the
    /// store does not reorder them.
    pub fn append_sample(
        &self,
        subject: &SubjectId,
        metric: Metric,
        timestamp: DateTime<Utc>,
        value: f64,
    ) -> usize {
        self.append(subject, metric, MetricSample::new(timestamp, value))
    }

    pub fn append(&self, subject: &SubjectId, metric: Metric, sample: MetricSample) -> usize {
        let mut subjects = self.subjects.write();
        let series = subjects
            .entry(subject.clone())
            .or_default()
            .entry(metric.clone())
            .or_insert_with(|| MetricSeries::new(metric));
        series.push(sample);
        series.len()
    }

    /// Append several samples to one series under a single lock.
    pub fn append_batch(
        &self,
        subject: &SubjectId,
        metric: Metric,
        samples: impl IntoIterator<Item = MetricSample>,
    ) -> usize {
        let mut subjects = self.subjects.write();
        let series = subjects
            .entry(subject.clone())
            .or_default()
            .entry(metric.clone())
            .or_insert_with(|| MetricSeries::new(metric));
        for sample in samples {
            series.push(sample);
        }
        series.len()
    }

    /// Copy of every series of `subject`.
    pub fn snapshot(&self, subject: &SubjectId) -> Option<SubjectSnapshot> {
        self.snapshot_tail(subject, usize::MAX)
    }

    /// Copy of the most recent `max_samples` samples of every series.
    pub fn snapshot_tail(&self, subject: &SubjectId, max_samples: usize) -> Option<SubjectSnapshot> {
        let subjects = self.subjects.read();
        let series = subjects.get(subject)?;
        Some(SubjectSnapshot {
            subject: subject.clone(),
            taken_at: Utc::now(),
            series: series
                .iter()
                .map(|(metric, s)| {
                    (
                        metric.clone(),
                        MetricSeries::from_samples(metric.clone(), s.tail(max_samples).to_vec()),
                    )
                })
                .collect(),
        })
    }

    /// Latest value of every series of `subject`.
    pub fn latest_values(&self, subject: &SubjectId) -> HashMap<Metric, f64> {
        self.subjects
            .read()
            .get(subject)
            .map(|series| {
                series
                    .iter()
                    .filter_map(|(m, s)| s.latest().map(|sample| (m.clone(), sample.value)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn subjects(&self) -> Vec<SubjectId> {
        let mut subjects: Vec<_> = self.subjects.read().keys().cloned().collect();
        subjects.sort();
        subjects
    }

    pub fn contains(&self, subject: &SubjectId) -> bool {
        self.subjects.read().contains_key(subject)
    }

    pub fn series_len(&self, subject: &SubjectId, metric: &Metric) -> usize {
        self.subjects
            .read()
            .get(subject)
            .and_then(|series| series.get(metric))
            .map_or(0, MetricSeries::len)
    }

    pub fn total_samples(&self) -> usize {
        self.subjects
            .read()
            .values()
            .flat_map(|series| series.values())
            .map(MetricSeries::len)
            .sum()
    }

    /// Drop every series of `subject`. Returns whether it existed.
    pub fn clear_subject(&self, subject: &SubjectId) -> bool {
        self.subjects.write().remove(subject).is_some()
    }
}
