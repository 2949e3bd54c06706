//! Alert engine configuration.

use lperf_types::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stored history length at which (and at every multiple of which) the
/// engine warns that history keeps growing.
pub const DEFAULT_HISTORY_WARN_THRESHOLD: usize = 10_000;

/// Alerts listed as "recent" in an alert report.
pub const DEFAULT_RECENT_ALERT_COUNT: usize = 10;

/// Default retrieval window for alert history.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// File the default file channel appends to.
pub const DEFAULT_ALERT_LOG: &str = "performance_alerts.log";

/// Configuration for [`AlertEngine`](crate::AlertEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub history_warn_threshold: usize,
    pub recent_alert_count: usize,
    pub default_history_limit: usize,
    /// Retry policy applied to every channel send.
    pub retry: RetryPolicy,
    /// Path for the default file channel; `None` disables it.
    pub default_log_path: Option<PathBuf>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            history_warn_threshold: DEFAULT_HISTORY_WARN_THRESHOLD,
            recent_alert_count: DEFAULT_RECENT_ALERT_COUNT,
            default_history_limit: DEFAULT_HISTORY_LIMIT,
            retry: RetryPolicy::default(),
            default_log_path: Some(PathBuf::from(DEFAULT_ALERT_LOG)),
        }
    }
}

impl AlertConfig {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_default_log_path(mut self, path: Option<PathBuf>) -> Self {
        self.default_log_path = path;
        self
    }
}
