//! Core type definitions for LPerf performance analytics.
//!
//! This crate holds the data model shared by the analytics and alerting
//! crates: metric and subject identifiers, samples and series, bottleneck
//! findings, trend/anomaly results, forecasts, alert rules and events, and
//! the aggregated [`AnalysisReport`].

#![deny(unsafe_code)]

pub mod alert;
pub mod analysis;
pub mod error;
pub mod finding;
pub mod forecast;
pub mod metric;
pub mod report;
pub mod retry;

// Re-export primary types at crate root for ergonomic use.
pub use alert::{AlertEvent, AlertRule, AlertSeverity, Comparator, EQ_TOLERANCE};
pub use analysis::{AnomalyFinding, TrendDirection, TrendResult};
pub use error::ParseError;
pub use finding::{BottleneckFinding, BottleneckKind, Evidence, Severity};
pub use forecast::{Forecast, ForecastAlgorithm, ModelState};
pub use metric::{Metric, MetricSample, MetricSeries, SubjectId};
pub use report::{AnalysisReport, AnalysisStage, ForecastFailure, ReportSummary, SkippedMetric};
pub use retry::RetryPolicy;
