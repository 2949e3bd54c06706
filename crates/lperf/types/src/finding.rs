//! Bottleneck findings.

use crate::metric::{Metric, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Severity of a bottleneck finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// What kind of degradation a finding describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BottleneckKind {
    /// Samples above a usage threshold.
    HighUsage,
    /// Sample variance above a volatility threshold.
    Volatility,
    /// Normalized trend coefficient above a growth threshold.
    IncreasingTrend,
    /// Frame rate samples below a floor.
    LowFrameRate,
    /// First startup sample slower than the limit.
    SlowStartup,
    /// Battery level dropped faster than the limit.
    HighBatteryDrain,
}

impl BottleneckKind {
    /// Stable finding code for a metric/kind pair, e.g. `high_cpu_usage`.
    pub fn code(self, metric: &Metric) -> String {
        match (self, metric) {
            (BottleneckKind::IncreasingTrend, Metric::Memory) => "memory_growth_trend".to_string(),
            (BottleneckKind::HighUsage, m) => format!("high_{}_usage", m),
            (BottleneckKind::Volatility, m) => format!("{}_volatility", m),
            (BottleneckKind::IncreasingTrend, m) => format!("{}_trend_increase", m),
            (BottleneckKind::LowFrameRate, _) => "low_fps".to_string(),
            (BottleneckKind::SlowStartup, _) => "slow_startup".to_string(),
            (BottleneckKind::HighBatteryDrain, _) => "high_battery_consumption".to_string(),
        }
    }

    /// Fixed recommendation text for a metric/kind pair.
    pub fn recommendation(self, metric: &Metric) -> &'static str {
        match (self, metric) {
            (BottleneckKind::HighUsage, Metric::Cpu) => {
                "check background processes, scheduled tasks and CPU-intensive operations"
            }
            (BottleneckKind::Volatility, Metric::Cpu) => {
                "check background processes and scheduled tasks, optimize CPU scheduling"
            }
            (BottleneckKind::IncreasingTrend, Metric::Cpu) => {
                "check for memory leaks or resource contention"
            }
            (BottleneckKind::HighUsage, Metric::Memory) => {
                "check for memory leaks, optimize allocation strategy"
            }
            (BottleneckKind::IncreasingTrend, Metric::Memory) => {
                "possible memory leak, check object references"
            }
            (BottleneckKind::Volatility, Metric::Network) => {
                "check network stability and background network activity"
            }
            (BottleneckKind::LowFrameRate, _) => {
                "optimize rendering, reduce UI complexity, check GPU usage"
            }
            (BottleneckKind::SlowStartup, _) => {
                "optimize startup flow, lazy-load non-critical resources"
            }
            (BottleneckKind::HighBatteryDrain, _) => {
                "optimize background processes, reduce network and location usage"
            }
            (BottleneckKind::HighUsage, _) => "reduce sustained load on this resource",
            (BottleneckKind::Volatility, _) => "investigate sources of fluctuation",
            (BottleneckKind::IncreasingTrend, _) => "investigate steadily growing usage",
        }
    }
}

/// Numbers backing a finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Maximum over the whole series.
    pub max: f64,
    /// Minimum over the whole series.
    pub min: f64,
    /// Mean over the whole series.
    pub avg: f64,
    /// Population variance, for volatility findings.
    pub variance: Option<f64>,
    /// Normalized trend coefficient, for trend findings.
    pub trend: Option<f64>,
    /// Single observation a check was applied to (first startup sample,
    /// battery drop).
    pub observed: Option<f64>,
    /// Threshold the check compared against.
    pub threshold: f64,
}

/// One detected bottleneck. Produced fresh on every detection call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleneckFinding {
    pub subject: SubjectId,
    pub metric: Metric,
    pub kind: BottleneckKind,
    pub severity: Severity,
    pub evidence: Evidence,
    /// Sample indices that breached the threshold (usage and low-rate checks).
    pub periods: BTreeSet<usize>,
    pub description: String,
    pub recommendation: String,
    pub detected_at: DateTime<Utc>,
}

impl BottleneckFinding {
    pub fn code(&self) -> String {
        self.kind.code(&self.metric)
    }
}
