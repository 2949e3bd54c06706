//! LPerf analytics: bottleneck, trend and anomaly detection with
//! short-horizon forecasting over performance telemetry.
//!
//! ```text
//! collector ──append──► TimeSeriesStore ──snapshot──┐
//!                                                   ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    PerformanceAnalyzer                       │
//! │  BottleneckDetector   TrendAnalyzer   AnomalyDetector        │
//! │            │                │                │               │
//! │            └────────────────┼────────────────┘               │
//! │                             ▼                                │
//! │  ForecastEngine ──► Forecast          AlertEngine ──► events │
//! │                             │                                │
//! │                      AnalysisReport                          │
//! └──────────────────────────────────────────────────────────────┘
//!            ▲                                      │
//!            └──── Monitor (interval, StopSignal) ◄─┘
//! ```
//!
//! Numeric code ([`stats`], the detectors, forecast math) is pure. Everything
//! noteworthy is reported through an [`AnalysisObserver`]; the default one
//! writes `tracing` records.

#![deny(unsafe_code)]

pub mod analyzer;
pub mod anomaly;
pub mod bottleneck;
pub mod config;
pub mod error;
pub mod forecast;
pub mod monitor;
pub mod observer;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod trend;

// ── Re-exports ──────────────────────────────────────────────────────

pub use analyzer::{recommendations, PerformanceAnalyzer};
pub use anomaly::AnomalyDetector;
pub use bottleneck::BottleneckDetector;
pub use config::{
    AnalyticsConfig, AnomalyConfig, BottleneckConfig, ForecastConfig, MonitorConfig, TrendConfig,
};
pub use error::{AnalyticsError, AnalyticsResult, ValidationFailure};
pub use forecast::{
    ForecastEngine, ForecastModel, InMemoryModelStore, JsonFileModelStore, ModelStore,
    PredictionReport, TrainingSet, TrainingSummary,
};
pub use monitor::{IncomingSample, Ingested, Monitor, MonitorStats, StopSignal};
pub use observer::{
    AnalysisEvent, AnalysisObserver, NoopObserver, RecordingObserver, TracingObserver,
};
pub use store::{SubjectSnapshot, TimeSeriesStore};
pub use telemetry::{init_tracing, TracingConfig};
pub use trend::TrendAnalyzer;
