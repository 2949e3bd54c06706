//! Report assembly over the store, detectors, forecast engine and alerts.

use crate::anomaly::AnomalyDetector;
use crate::bottleneck::BottleneckDetector;
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::forecast::{ForecastEngine, TrainingSet, TrainingSummary};
use crate::monitor::StopSignal;
use crate::observer::{AnalysisEvent, AnalysisObserver, TracingObserver};
use crate::store::{SubjectSnapshot, TimeSeriesStore};
use crate::trend::TrendAnalyzer;
use chrono::{DateTime, Utc};
use lperf_alerts::{AlertEngine, DispatchOutcome};
use lperf_types::{
    AlertEvent, AnalysisReport, AnalysisStage, AnomalyFinding, BottleneckFinding, Forecast,
    ForecastAlgorithm, ForecastFailure, Metric, ReportSummary, Severity, SkippedMetric, SubjectId,
    TrendDirection, TrendResult,
};
use std::collections::BTreeMap;
use std::sync::Arc;

const ALL_CLEAR: &str = "performance looks good, keep monitoring";

/// Single entry point for analysis of stored metric series.
///
/// Owns one instance of every detector and the forecast engine, shares the
/// store and the alert engine with the collector and the monitor, and routes
/// narration through the configured [`AnalysisObserver`].
pub struct PerformanceAnalyzer {
    config: AnalyticsConfig,
    store: Arc<TimeSeriesStore>,
    bottlenecks: BottleneckDetector,
    trends: TrendAnalyzer,
    anomalies: AnomalyDetector,
    forecasts: ForecastEngine,
    alerts: Arc<AlertEngine>,
    observer: Arc<dyn AnalysisObserver>,
}

impl PerformanceAnalyzer {
    pub fn new(config: AnalyticsConfig) -> AnalyticsResult<Self> {
        config.validate()?;
        Ok(Self {
            bottlenecks: BottleneckDetector::new(config.bottleneck.clone()),
            trends: TrendAnalyzer::new(config.trend.clone()),
            anomalies: AnomalyDetector::new(config.anomaly.clone()),
            forecasts: ForecastEngine::new(config.forecast.clone()),
            store: Arc::new(TimeSeriesStore::new()),
            alerts: Arc::new(AlertEngine::with_defaults()),
            observer: Arc::new(TracingObserver),
            config,
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: AnalyticsConfig::default(),
            store: Arc::new(TimeSeriesStore::new()),
            bottlenecks: BottleneckDetector::with_defaults(),
            trends: TrendAnalyzer::with_defaults(),
            anomalies: AnomalyDetector::with_defaults(),
            forecasts: ForecastEngine::with_defaults(),
            alerts: Arc::new(AlertEngine::with_defaults()),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_store(mut self, store: Arc<TimeSeriesStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_alert_engine(mut self, alerts: Arc<AlertEngine>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn AnalysisObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<TimeSeriesStore> {
        &self.store
    }

    pub fn alerts(&self) -> &Arc<AlertEngine> {
        &self.alerts
    }

    pub fn forecast_engine(&self) -> &ForecastEngine {
        &self.forecasts
    }

    fn emit(&self, event: AnalysisEvent) {
        self.observer.on_event(&event);
    }

    // ── Ingestion ───────────────────────────────────────────────────

    /// Append one sample. Returns the new length of its series.
    pub fn append_sample(
        &self,
        subject: &SubjectId,
        metric: Metric,
        timestamp: DateTime<Utc>,
        value: f64,
    ) -> usize {
        self.store.append_sample(subject, metric, timestamp, value)
    }

    pub fn snapshot(&self, subject: &SubjectId) -> AnalyticsResult<SubjectSnapshot> {
        self.store
            .snapshot(subject)
            .ok_or_else(|| AnalyticsError::SubjectNotFound(subject.clone()))
    }

    // ── Per-stage analysis ──────────────────────────────────────────

    pub fn detect_bottlenecks(&self, subject: &SubjectId) -> AnalyticsResult<Vec<BottleneckFinding>> {
        let snapshot = self.snapshot(subject)?;
        let mut findings = Vec::new();
        for (metric, series) in snapshot.iter() {
            findings.extend(self.bottlenecks_for(subject, metric, &series.values(), None));
        }
        Ok(findings)
    }

    pub fn analyze_trends(&self, subject: &SubjectId) -> AnalyticsResult<Vec<TrendResult>> {
        let snapshot = self.snapshot(subject)?;
        Ok(snapshot
            .iter()
            .map(|(metric, series)| self.trends.analyze(metric, &series.values()))
            .collect())
    }

    pub fn detect_anomalies(&self, subject: &SubjectId) -> AnalyticsResult<Vec<AnomalyFinding>> {
        let snapshot = self.snapshot(subject)?;
        let mut anomalies = Vec::new();
        for (metric, series) in snapshot.iter() {
            anomalies.extend(self.anomalies_for(subject, metric, &series.values()));
        }
        Ok(anomalies)
    }

    fn bottlenecks_for(
        &self,
        subject: &SubjectId,
        metric: &Metric,
        values: &[f64],
        skipped: Option<&mut Vec<SkippedMetric>>,
    ) -> Vec<BottleneckFinding> {
        match self.bottlenecks.detect_metric(subject, metric, values) {
            Ok(found) => {
                if !found.is_empty() {
                    self.emit(AnalysisEvent::BottlenecksDetected {
                        subject: subject.clone(),
                        metric: metric.clone(),
                        count: found.len(),
                    });
                }
                found
            }
            Err(e) => {
                self.emit(AnalysisEvent::MetricSkipped {
                    subject: subject.clone(),
                    metric: metric.clone(),
                    stage: AnalysisStage::Bottleneck,
                    reason: e.to_string(),
                });
                if let Some(skipped) = skipped {
                    skipped.push(SkippedMetric {
                        metric: metric.clone(),
                        stage: AnalysisStage::Bottleneck,
                        reason: e.to_string(),
                    });
                }
                Vec::new()
            }
        }
    }

    fn anomalies_for(&self, subject: &SubjectId, metric: &Metric, values: &[f64]) -> Vec<AnomalyFinding> {
        let found = self.anomalies.detect(metric, values);
        if !found.is_empty() {
            self.emit(AnalysisEvent::AnomaliesDetected {
                subject: subject.clone(),
                metric: metric.clone(),
                count: found.len(),
            });
        }
        found
    }

    // ── Forecasting ─────────────────────────────────────────────────

    pub fn prepare_training_data(&self, subject: &SubjectId) -> AnalyticsResult<TrainingSet> {
        let snapshot = self.snapshot(subject)?;
        let set = self.forecasts.prepare_training_data(&snapshot);
        for rejected in &set.rejected {
            self.emit(AnalysisEvent::TrainingRejected {
                subject: subject.clone(),
                metric: rejected.metric.clone(),
                failure: rejected.failure.clone(),
            });
        }
        Ok(set)
    }

    /// Prepare training data for `subject` and fit `algorithm` on every
    /// accepted metric.
    pub fn train(
        &self,
        subject: &SubjectId,
        algorithm: ForecastAlgorithm,
    ) -> AnalyticsResult<TrainingSummary> {
        let set = self.prepare_training_data(subject)?;
        Ok(self.train_set(algorithm, &set))
    }

    fn train_set(&self, algorithm: ForecastAlgorithm, set: &TrainingSet) -> TrainingSummary {
        let summary = self.forecasts.train_all(algorithm, set);
        for trained in &summary.trained {
            self.emit(AnalysisEvent::ModelTrained {
                subject: set.subject.clone(),
                algorithm,
                metric: trained.metric.clone(),
                accuracy: trained.accuracy,
                samples: trained.samples,
            });
        }
        summary
    }

    /// Forecast one metric with an already trained model.
    pub fn predict(
        &self,
        subject: &SubjectId,
        metric: &Metric,
        algorithm: ForecastAlgorithm,
        horizon: usize,
    ) -> AnalyticsResult<Forecast> {
        let snapshot = self.snapshot(subject)?;
        let series = snapshot
            .series(metric)
            .ok_or_else(|| AnalyticsError::SeriesNotFound {
                subject: subject.clone(),
                metric: metric.clone(),
            })?;
        self.forecasts.predict(subject, algorithm, series, horizon)
    }

    // ── Alerts ──────────────────────────────────────────────────────

    /// Evaluate alert rules against the latest stored values of `subject`.
    /// Events are returned, not dispatched.
    pub fn evaluate_alerts(&self, subject: &SubjectId) -> Vec<AlertEvent> {
        self.alerts
            .evaluate(subject, &self.store.latest_values(subject))
    }

    /// Evaluate and dispatch alerts for the latest values of `subject`.
    pub async fn process_alerts(&self, subject: &SubjectId) -> Vec<DispatchOutcome> {
        let latest = self.store.latest_values(subject);
        self.alerts.process(subject, &latest).await
    }

    // ── Reports ─────────────────────────────────────────────────────

    /// Retrain every algorithm on the current data, then build a report.
    /// Metrics rejected for training are listed in the report's skipped
    /// entries.
    pub fn analyze(&self, subject: &SubjectId, stop: &StopSignal) -> AnalyticsResult<AnalysisReport> {
        let set = self.prepare_training_data(subject)?;
        for algorithm in ForecastAlgorithm::ALL {
            if stop.is_stopped() {
                return Err(self.cancelled(subject, 0));
            }
            self.train_set(algorithm, &set);
        }

        let mut report = self.generate_report(subject, stop)?;
        report
            .skipped
            .extend(set.rejected.iter().map(|rejected| SkippedMetric {
                metric: rejected.metric.clone(),
                stage: AnalysisStage::Training,
                reason: rejected.failure.to_string(),
            }));
        Ok(report)
    }

    /// Build a report from the current series and the models already
    /// trained for `subject`. No model is trained here.
    ///
    /// `stop` is checked before every metric; once it fires the report is
    /// abandoned with [`AnalyticsError::Cancelled`]. A failure in one metric
    /// only adds a skipped or failed entry.
    pub fn generate_report(
        &self,
        subject: &SubjectId,
        stop: &StopSignal,
    ) -> AnalyticsResult<AnalysisReport> {
        let snapshot = self.snapshot(subject)?;

        let mut findings = Vec::new();
        let mut trends = Vec::new();
        let mut anomalies = Vec::new();
        let mut skipped = Vec::new();

        for (completed, (metric, series)) in snapshot.iter().enumerate() {
            if stop.is_stopped() {
                return Err(self.cancelled(subject, completed));
            }
            let values = series.values();
            findings.extend(self.bottlenecks_for(subject, metric, &values, Some(&mut skipped)));

            if values.iter().all(|v| v.is_finite()) {
                trends.push(self.trends.analyze(metric, &values));
                anomalies.extend(self.anomalies_for(subject, metric, &values));
            } else {
                let reason = AnalyticsError::NonFiniteSeries {
                    metric: metric.clone(),
                }
                .to_string();
                for stage in [AnalysisStage::Trend, AnalysisStage::Anomaly] {
                    skipped.push(SkippedMetric {
                        metric: metric.clone(),
                        stage,
                        reason: reason.clone(),
                    });
                }
            }
        }

        let mut forecasts = Vec::new();
        let mut forecast_failures = Vec::new();
        let horizon = self.config.forecast.default_horizon;
        for (completed, model) in self.forecasts.models_for(subject).iter().enumerate() {
            if stop.is_stopped() {
                return Err(self.cancelled(subject, snapshot.metric_count() + completed));
            }
            let algorithm = model.algorithm();
            let result = match snapshot.series(&model.metric) {
                Some(series) => self.forecasts.predict(subject, algorithm, series, horizon),
                None => Err(AnalyticsError::SeriesNotFound {
                    subject: subject.clone(),
                    metric: model.metric.clone(),
                }),
            };
            match result {
                Ok(forecast) => forecasts.push(forecast),
                Err(e) => {
                    self.emit(AnalysisEvent::ForecastFailed {
                        subject: subject.clone(),
                        algorithm,
                        metric: model.metric.clone(),
                        reason: e.to_string(),
                    });
                    forecast_failures.push(ForecastFailure {
                        metric: model.metric.clone(),
                        algorithm,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let alerts = self
            .alerts
            .history_for(subject, self.config.monitor.report_alert_limit);
        let recommendations = recommendations(&findings, &trends, &anomalies);

        let summary = ReportSummary {
            total_bottlenecks: findings.len(),
            high_severity_findings: findings
                .iter()
                .filter(|f| f.severity == Severity::High)
                .count(),
            total_anomalies: anomalies.len(),
            total_alerts: alerts.len(),
            total_forecasts: forecasts.len(),
            data_points: snapshot.data_points(),
            metrics_analyzed: snapshot.metric_count(),
        };

        self.emit(AnalysisEvent::ReportGenerated {
            subject: subject.clone(),
            findings: findings.len(),
            anomalies: anomalies.len(),
            forecasts: forecasts.len(),
        });

        Ok(AnalysisReport {
            subject: subject.clone(),
            generated_at: Utc::now(),
            summary,
            findings,
            trends,
            anomalies,
            forecasts,
            forecast_failures,
            alerts,
            skipped,
            recommendations,
        })
    }

    fn cancelled(&self, subject: &SubjectId, completed_metrics: usize) -> AnalyticsError {
        self.emit(AnalysisEvent::AnalysisCancelled {
            subject: subject.clone(),
            completed_metrics,
        });
        AnalyticsError::Cancelled
    }
}

/// Recommendation lines for a report, in finding, trend, anomaly order.
pub fn recommendations(
    findings: &[BottleneckFinding],
    trends: &[TrendResult],
    anomalies: &[AnomalyFinding],
) -> Vec<String> {
    let mut lines: Vec<String> = findings
        .iter()
        .map(|f| format!("[{}] {}", f.metric.label(), f.recommendation))
        .collect();

    lines.extend(
        trends
            .iter()
            .filter(|t| t.direction == TrendDirection::Decreasing)
            .map(|t| format!("[{}] declining trend, monitor closely", t.metric.label())),
    );

    let mut per_metric: BTreeMap<&Metric, usize> = BTreeMap::new();
    for anomaly in anomalies {
        *per_metric.entry(&anomaly.metric).or_default() += 1;
    }
    lines.extend(
        per_metric
            .into_iter()
            .map(|(metric, count)| format!("[{}] detected {} anomalies", metric.label(), count)),
    );

    if lines.is_empty() {
        lines.push(ALL_CLEAR.to_string());
    }
    lines
}
