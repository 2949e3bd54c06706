//! Diagnostic narration of analysis runs.
//!
//! Detectors and forecast math stay silent; the orchestrating layers report
//! what happened through an injected [`AnalysisObserver`]. The default
//! [`TracingObserver`] turns events into `tracing` records.

use crate::error::ValidationFailure;
use lperf_types::{AnalysisStage, ForecastAlgorithm, Metric, SubjectId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Something noteworthy that happened during analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalysisEvent {
    MetricSkipped {
        subject: SubjectId,
        metric: Metric,
        stage: AnalysisStage,
        reason: String,
    },
    BottlenecksDetected {
        subject: SubjectId,
        metric: Metric,
        count: usize,
    },
    AnomaliesDetected {
        subject: SubjectId,
        metric: Metric,
        count: usize,
    },
    TrainingRejected {
        subject: SubjectId,
        metric: Metric,
        failure: ValidationFailure,
    },
    ModelTrained {
        subject: SubjectId,
        algorithm: ForecastAlgorithm,
        metric: Metric,
        accuracy: f64,
        samples: usize,
    },
    ForecastFailed {
        subject: SubjectId,
        algorithm: ForecastAlgorithm,
        metric: Metric,
        reason: String,
    },
    ReportGenerated {
        subject: SubjectId,
        findings: usize,
        anomalies: usize,
        forecasts: usize,
    },
    AnalysisCancelled {
        subject: SubjectId,
        completed_metrics: usize,
    },
}

/// Sink for [`AnalysisEvent`]s.
pub trait AnalysisObserver: Send + Sync {
    fn on_event(&self, event: &AnalysisEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AnalysisObserver for TracingObserver {
    fn on_event(&self, event: &AnalysisEvent) {
        match event {
            AnalysisEvent::MetricSkipped {
                subject,
                metric,
                stage,
                reason,
            } => tracing::debug!(
                subject = %subject,
                metric = %metric,
                stage = ?stage,
                reason = %reason,
                "metric skipped"
            ),
            AnalysisEvent::BottlenecksDetected {
                subject,
                metric,
                count,
            } => tracing::info!(subject = %subject, metric = %metric, count, "bottlenecks detected"),
            AnalysisEvent::AnomaliesDetected {
                subject,
                metric,
                count,
            } => tracing::info!(subject = %subject, metric = %metric, count, "anomalies detected"),
            AnalysisEvent::TrainingRejected {
                subject,
                metric,
                failure,
            } => tracing::debug!(
                subject = %subject,
                metric = %metric,
                failure = %failure,
                "metric rejected for training"
            ),
            AnalysisEvent::ModelTrained {
                subject,
                algorithm,
                metric,
                accuracy,
                samples,
            } => tracing::debug!(
                subject = %subject,
                algorithm = %algorithm,
                metric = %metric,
                accuracy,
                samples,
                "forecast model trained"
            ),
            AnalysisEvent::ForecastFailed {
                subject,
                algorithm,
                metric,
                reason,
            } => tracing::warn!(
                subject = %subject,
                algorithm = %algorithm,
                metric = %metric,
                reason = %reason,
                "forecast failed"
            ),
            AnalysisEvent::ReportGenerated {
                subject,
                findings,
                anomalies,
                forecasts,
            } => tracing::info!(
                subject = %subject,
                findings,
                anomalies,
                forecasts,
                "analysis report generated"
            ),
            AnalysisEvent::AnalysisCancelled {
                subject,
                completed_metrics,
            } => tracing::info!(subject = %subject, completed_metrics, "analysis cancelled"),
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AnalysisObserver for NoopObserver {
    fn on_event(&self, _event: &AnalysisEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<AnalysisEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AnalysisEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl AnalysisObserver for RecordingObserver {
    fn on_event(&self, event: &AnalysisEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_observer_keeps_order() {
        let observer = RecordingObserver::new();
        observer.on_event(&AnalysisEvent::BottlenecksDetected {
            subject: SubjectId::global(),
            metric: Metric::Cpu,
            count: 2,
        });
        observer.on_event(&AnalysisEvent::AnalysisCancelled {
            subject: SubjectId::global(),
            completed_metrics: 1,
        });
        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], AnalysisEvent::AnalysisCancelled { .. }));
        observer.clear();
        assert!(observer.is_empty());
    }

    #[test]
    fn event_serializes_with_tag() {
        let json = serde_json::to_value(AnalysisEvent::AnomaliesDetected {
            subject: SubjectId::global(),
            metric: Metric::Fps,
            count: 1,
        })
        .unwrap();
        assert_eq!(json["event"], "anomalies_detected");
        assert_eq!(json["metric"], "fps");
    }

    #[test]
    fn tracing_observer_handles_every_event() {
        let observer = TracingObserver;
        observer.on_event(&AnalysisEvent::TrainingRejected {
            subject: SubjectId::global(),
            metric: Metric::Battery,
            failure: ValidationFailure::NoVariance,
        });
    }
}
