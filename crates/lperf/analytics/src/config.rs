//! Analytics configuration.
//!
//! Every threshold, minimum sample count and forecast parameter is
//! overridable; the defaults reproduce the stock rule set. Configuration is
//! loaded from TOML; any section may be omitted:
//!
//! ```toml
//! [bottleneck.cpu.usage]
//! threshold = 70.0
//! high_severity_above = 90.0
//!
//! [anomaly]
//! z_threshold = 2.5
//!
//! [forecast]
//! window_candidates = [3, 5, 7, 10, 15]
//! ```

use crate::error::{AnalyticsError, AnalyticsResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ── Defaults ────────────────────────────────────────────────────────

pub const DEFAULT_TREND_MIN_SAMPLES: usize = 5;
pub const DEFAULT_TREND_DIRECTION_THRESHOLD: f64 = 0.1;
pub const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 5;

pub const DEFAULT_ANOMALY_MIN_SAMPLES: usize = 20;
/// 3-sigma rule.
pub const DEFAULT_Z_SCORE_THRESHOLD: f64 = 3.0;

pub const DEFAULT_MIN_TRAINING_SAMPLES: usize = 20;
pub const DEFAULT_MIN_FINITE_FRACTION: f64 = 0.9;
pub const DEFAULT_WINDOW_CANDIDATES: [usize; 4] = [3, 5, 7, 10];
/// Most recent samples used for training.
pub const DEFAULT_TRAINING_WINDOW: usize = 500;
pub const DEFAULT_TREND_LOOKBACK: usize = 10;
pub const DEFAULT_FORECAST_HORIZON: usize = 5;
pub const DEFAULT_MAX_PREDICTION_LOG: usize = 1_000;

pub const DEFAULT_ANALYSIS_INTERVAL: usize = 10;
pub const DEFAULT_REPORT_ALERT_LIMIT: usize = 100;

// ── Bottleneck rules ────────────────────────────────────────────────

/// Samples above `threshold` breach; severity is High when the series
/// maximum exceeds `high_severity_above`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRule {
    pub threshold: f64,
    pub high_severity_above: f64,
}

/// Fires when population variance exceeds `max_variance`, given at least
/// `min_samples` samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityRule {
    pub max_variance: f64,
    pub min_samples: usize,
}

/// Fires when the normalized trend exceeds `threshold`, given at least
/// `min_samples` samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRule {
    pub threshold: f64,
    pub min_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuRules {
    pub usage: UsageRule,
    pub volatility: VolatilityRule,
    pub trend: TrendRule,
}

impl Default for CpuRules {
    fn default() -> Self {
        Self {
            usage: UsageRule {
                threshold: 80.0,
                high_severity_above: 95.0,
            },
            volatility: VolatilityRule {
                max_variance: 100.0,
                min_samples: 11,
            },
            trend: TrendRule {
                threshold: 0.5,
                min_samples: 21,
            },
        }
    }
}

/// Memory thresholds are in MB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryRules {
    pub usage: UsageRule,
    pub growth: TrendRule,
}

impl Default for MemoryRules {
    fn default() -> Self {
        Self {
            usage: UsageRule {
                threshold: 85.0,
                high_severity_above: 200.0,
            },
            growth: TrendRule {
                threshold: 0.3,
                min_samples: 16,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkRules {
    pub volatility: VolatilityRule,
}

impl Default for NetworkRules {
    fn default() -> Self {
        Self {
            volatility: VolatilityRule {
                max_variance: 1000.0,
                min_samples: 11,
            },
        }
    }
}

/// Samples below `floor` breach; severity is High when the series minimum
/// is below `high_severity_below`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FpsRules {
    pub floor: f64,
    pub high_severity_below: f64,
}

impl Default for FpsRules {
    fn default() -> Self {
        Self {
            floor: 30.0,
            high_severity_below: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupRules {
    /// Seconds.
    pub slow_after: f64,
}

impl Default for StartupRules {
    fn default() -> Self {
        Self { slow_after: 5.0 }
    }
}

/// Fires when `first - last` exceeds `max_drain` percentage points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryRules {
    pub max_drain: f64,
    pub min_samples: usize,
}

impl Default for BatteryRules {
    fn default() -> Self {
        Self {
            max_drain: 20.0,
            min_samples: 11,
        }
    }
}

/// Per-metric rule set of the bottleneck detector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BottleneckConfig {
    pub cpu: CpuRules,
    pub memory: MemoryRules,
    pub network: NetworkRules,
    pub fps: FpsRules,
    pub startup: StartupRules,
    pub battery: BatteryRules,
}

// ── Stage configs ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub min_samples: usize,
    /// `|coefficient|` above this classifies as Increasing/Decreasing.
    pub direction_threshold: f64,
    pub moving_average_window: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            min_samples: DEFAULT_TREND_MIN_SAMPLES,
            direction_threshold: DEFAULT_TREND_DIRECTION_THRESHOLD,
            moving_average_window: DEFAULT_MOVING_AVERAGE_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub min_samples: usize,
    pub z_threshold: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            min_samples: DEFAULT_ANOMALY_MIN_SAMPLES,
            z_threshold: DEFAULT_Z_SCORE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub min_training_samples: usize,
    pub min_finite_fraction: f64,
    pub window_candidates: Vec<usize>,
    pub training_window: usize,
    /// Samples used by trend extrapolation.
    pub trend_lookback: usize,
    pub default_horizon: usize,
    pub max_prediction_log: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_training_samples: DEFAULT_MIN_TRAINING_SAMPLES,
            min_finite_fraction: DEFAULT_MIN_FINITE_FRACTION,
            window_candidates: DEFAULT_WINDOW_CANDIDATES.to_vec(),
            training_window: DEFAULT_TRAINING_WINDOW,
            trend_lookback: DEFAULT_TREND_LOOKBACK,
            default_horizon: DEFAULT_FORECAST_HORIZON,
            max_prediction_log: DEFAULT_MAX_PREDICTION_LOG,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Samples appended to a subject between periodic reports.
    pub analysis_interval: usize,
    /// Alerts included in a report.
    pub report_alert_limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            analysis_interval: DEFAULT_ANALYSIS_INTERVAL,
            report_alert_limit: DEFAULT_REPORT_ALERT_LIMIT,
        }
    }
}

// ── Top level ───────────────────────────────────────────────────────

/// Complete analytics configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub bottleneck: BottleneckConfig,
    pub trend: TrendConfig,
    pub anomaly: AnomalyConfig,
    pub forecast: ForecastConfig,
    pub monitor: MonitorConfig,
}

impl AnalyticsConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> AnalyticsResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> AnalyticsResult<Self> {
        let config: AnalyticsConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> AnalyticsResult<String> {
        toml::to_string_pretty(self).map_err(|e| AnalyticsError::Config(e.to_string()))
    }

    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> AnalyticsResult<()> {
        let f = &self.forecast;
        if f.window_candidates.is_empty() || f.window_candidates.contains(&0) {
            return Err(AnalyticsError::Config(
                "forecast.window_candidates must be non-empty and positive".into(),
            ));
        }
        if f.training_window < f.min_training_samples {
            return Err(AnalyticsError::Config(format!(
                "forecast.training_window {} is below min_training_samples {}",
                f.training_window, f.min_training_samples
            )));
        }
        if !(0.0..=1.0).contains(&f.min_finite_fraction) {
            return Err(AnalyticsError::Config(format!(
                "forecast.min_finite_fraction {} must be within 0..=1",
                f.min_finite_fraction
            )));
        }
        if f.trend_lookback < 3 {
            return Err(AnalyticsError::Config(
                "forecast.trend_lookback must be at least 3".into(),
            ));
        }
        if self.anomaly.z_threshold <= 0.0 || !self.anomaly.z_threshold.is_finite() {
            return Err(AnalyticsError::Config(format!(
                "anomaly.z_threshold {} must be positive",
                self.anomaly.z_threshold
            )));
        }
        if self.trend.moving_average_window == 0 {
            return Err(AnalyticsError::Config(
                "trend.moving_average_window must be positive".into(),
            ));
        }
        if self.monitor.analysis_interval == 0 {
            return Err(AnalyticsError::Config(
                "monitor.analysis_interval must be positive".into(),
            ));
        }
        Ok(())
    }
}
