//! Alert engine status report.

use crate::channel::ChannelKind;
use chrono::{DateTime, Utc};
use lperf_types::{AlertEvent, AlertRule};
use serde::{Deserialize, Serialize};

/// Public view of a registered channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// `{kind}_{n}`.
    pub id: String,
    pub kind: ChannelKind,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of the engine's rules, channels and recent alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertReport {
    pub generated_at: DateTime<Utc>,
    pub monitoring: bool,
    pub total_rules: usize,
    pub enabled_rules: usize,
    pub total_channels: usize,
    pub total_alerts: usize,
    pub recent_alerts: Vec<AlertEvent>,
    pub rules: Vec<AlertRule>,
    pub channels: Vec<ChannelInfo>,
}
