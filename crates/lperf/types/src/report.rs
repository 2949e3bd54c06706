//! Aggregated analysis report for one subject.

use crate::alert::AlertEvent;
use crate::analysis::{AnomalyFinding, TrendResult};
use crate::finding::{BottleneckFinding, Severity};
use crate::forecast::{Forecast, ForecastAlgorithm};
use crate::metric::{Metric, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Analysis stage a metric was skipped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Bottleneck,
    Trend,
    Anomaly,
    Training,
    Forecast,
}

/// A metric excluded from one stage of a report, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedMetric {
    pub metric: Metric,
    pub stage: AnalysisStage,
    pub reason: String,
}

/// A forecast that could not be produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastFailure {
    pub metric: Metric,
    pub algorithm: ForecastAlgorithm,
    pub reason: String,
}

/// Headline counts of a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_bottlenecks: usize,
    pub high_severity_findings: usize,
    pub total_anomalies: usize,
    pub total_alerts: usize,
    pub total_forecasts: usize,
    /// Samples across all analyzed series.
    pub data_points: usize,
    pub metrics_analyzed: usize,
}

/// Everything known about one subject at report time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub subject: SubjectId,
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub findings: Vec<BottleneckFinding>,
    pub trends: Vec<TrendResult>,
    pub anomalies: Vec<AnomalyFinding>,
    pub forecasts: Vec<Forecast>,
    pub forecast_failures: Vec<ForecastFailure>,
    pub alerts: Vec<AlertEvent>,
    pub skipped: Vec<SkippedMetric>,
    pub recommendations: Vec<String>,
}

impl AnalysisReport {
    pub fn findings_for(&self, metric: &Metric) -> impl Iterator<Item = &BottleneckFinding> {
        let metric = metric.clone();
        self.findings.iter().filter(move |f| f.metric == metric)
    }

    pub fn anomalies_for(&self, metric: &Metric) -> impl Iterator<Item = &AnomalyFinding> {
        let metric = metric.clone();
        self.anomalies.iter().filter(move |a| a.metric == metric)
    }

    pub fn trend_for(&self, metric: &Metric) -> Option<&TrendResult> {
        self.trends.iter().find(|t| &t.metric == metric)
    }

    /// Whether any high-severity finding is present.
    pub fn has_critical_findings(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::High)
    }

    /// Multi-line plain-text rendering of the report.
    pub fn summary_text(&self) -> String {
        let mut out = String::new();
        let s = &self.summary;
        let _ = writeln!(out, "Performance analysis report");
        let _ = writeln!(out, "===========================");
        let _ = writeln!(out, "Subject: {}", self.subject);
        let _ = writeln!(
            out,
            "Generated: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(out, "Data points: {}", s.data_points);
        let _ = writeln!(out, "Metrics analyzed: {}", s.metrics_analyzed);
        let _ = writeln!(
            out,
            "Bottlenecks: {} (high severity: {})",
            s.total_bottlenecks, s.high_severity_findings
        );
        let _ = writeln!(out, "Anomalies: {}", s.total_anomalies);
        let _ = writeln!(out, "Alerts: {}", s.total_alerts);
        let _ = writeln!(out, "Forecasts: {}", s.total_forecasts);

        if !self.findings.is_empty() {
            let _ = writeln!(out, "\nFindings:");
            for finding in &self.findings {
                let _ = writeln!(
                    out,
                    "  - [{}] {}: {}",
                    finding.severity.to_string().to_uppercase(),
                    finding.code(),
                    finding.description
                );
            }
        }

        let classified: Vec<_> = self.trends.iter().filter(|t| !t.is_insufficient()).collect();
        if !classified.is_empty() {
            let _ = writeln!(out, "\nTrends:");
            for trend in classified {
                let _ = writeln!(
                    out,
                    "  - {}: {} ({:.3})",
                    trend.metric.label(),
                    trend.direction,
                    trend.coefficient
                );
            }
        }

        if !self.forecasts.is_empty() {
            let _ = writeln!(out, "\nForecasts:");
            for forecast in &self.forecasts {
                let _ = writeln!(
                    out,
                    "  - {} via {}: {} steps, confidence {:.2}",
                    forecast.metric.label(),
                    forecast.algorithm,
                    forecast.horizon,
                    forecast.confidence
                );
            }
        }

        if !self.recommendations.is_empty() {
            let _ = writeln!(out, "\nRecommendations:");
            for rec in &self.recommendations {
                let _ = writeln!(out, "  - {}", rec);
            }
        }
        out
    }
}
