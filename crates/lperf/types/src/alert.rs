//! Threshold alert rules and the events they raise.

use crate::error::ParseError;
use crate::metric::{Metric, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Absolute tolerance used by [`Comparator::Eq`] and [`Comparator::Ne`].
pub const EQ_TOLERANCE: f64 = 0.01;

/// Comparison applied between an observed value and a rule threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    /// Strictly greater than.
    Gt,
    /// Strictly less than.
    Lt,
    /// Within [`EQ_TOLERANCE`].
    Eq,
    /// Outside [`EQ_TOLERANCE`].
    Ne,
}

impl Comparator {
    pub fn matches(self, observed: f64, threshold: f64) -> bool {
        match self {
            Comparator::Gt => observed > threshold,
            Comparator::Lt => observed < threshold,
            Comparator::Eq => (observed - threshold).abs() < EQ_TOLERANCE,
            Comparator::Ne => (observed - threshold).abs() >= EQ_TOLERANCE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Gt => "gt",
            Comparator::Lt => "lt",
            Comparator::Eq => "eq",
            Comparator::Ne => "ne",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Comparator {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gt" | ">" => Ok(Comparator::Gt),
            "lt" | "<" => Ok(Comparator::Lt),
            "eq" | "==" | "=" => Ok(Comparator::Eq),
            "ne" | "!=" => Ok(Comparator::Ne),
            other => Err(ParseError::UnknownComparator(other.to_string())),
        }
    }
}

/// Severity attached to an alert rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(AlertSeverity::Low),
            "medium" => Ok(AlertSeverity::Medium),
            "high" => Ok(AlertSeverity::High),
            "critical" => Ok(AlertSeverity::Critical),
            other => Err(ParseError::UnknownSeverity(other.to_string())),
        }
    }
}

/// A threshold rule evaluated against the latest sample of a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// `{metric}_{comparator}_{threshold}`.
    pub id: String,
    pub metric: Metric,
    pub comparator: Comparator,
    pub threshold: f64,
    pub severity: AlertSeverity,
    pub description: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl AlertRule {
    pub fn new(
        metric: Metric,
        comparator: Comparator,
        threshold: f64,
        severity: AlertSeverity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Self::rule_id(&metric, comparator, threshold),
            metric,
            comparator,
            threshold,
            severity,
            description: description.into(),
            enabled: true,
            created_at: Utc::now(),
        }
    }

    /// Registry key for a rule. Rules with the same key overwrite each other.
    pub fn rule_id(metric: &Metric, comparator: Comparator, threshold: f64) -> String {
        format!("{}_{}_{}", metric, comparator, threshold)
    }

    pub fn matches(&self, observed: f64) -> bool {
        self.comparator.matches(observed, self.threshold)
    }
}

/// A fired alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub rule_id: String,
    pub subject: SubjectId,
    pub metric: Metric,
    pub observed_value: f64,
    pub threshold: f64,
    pub comparator: Comparator,
    pub severity: AlertSeverity,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// Channels that accepted the event during dispatch.
    pub sent_channels: usize,
}

impl AlertEvent {
    pub fn from_rule(rule: &AlertRule, subject: &SubjectId, observed_value: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id: rule.id.clone(),
            subject: subject.clone(),
            metric: rule.metric.clone(),
            observed_value,
            threshold: rule.threshold,
            comparator: rule.comparator,
            severity: rule.severity,
            description: rule.description.clone(),
            timestamp: Utc::now(),
            sent_channels: 0,
        }
    }

    /// One-line human readable rendering.
    pub fn message(&self) -> String {
        format!(
            "[{}] {} {}: {:.2} {} {} ({})",
            self.severity.as_str().to_uppercase(),
            self.subject,
            self.metric,
            self.observed_value,
            self.comparator.symbol(),
            self.threshold,
            self.description
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_comparators() {
        assert!(Comparator::Gt.matches(80.1, 80.0));
        assert!(!Comparator::Gt.matches(80.0, 80.0));
        assert!(Comparator::Lt.matches(29.9, 30.0));
        assert!(!Comparator::Lt.matches(30.0, 30.0));
    }

    #[test]
    fn equality_uses_tolerance() {
        assert!(Comparator::Eq.matches(50.005, 50.0));
        assert!(!Comparator::Eq.matches(50.02, 50.0));
        assert!(Comparator::Ne.matches(50.02, 50.0));
        assert!(!Comparator::Ne.matches(50.005, 50.0));
    }

    #[test]
    fn rule_id_format() {
        assert_eq!(
            AlertRule::rule_id(&Metric::Cpu, Comparator::Gt, 80.0),
            "cpu_gt_80"
        );
        assert_eq!(
            AlertRule::rule_id(&Metric::Fps, Comparator::Lt, 29.5),
            "fps_lt_29.5"
        );
    }

    #[test]
    fn event_from_rule_copies_rule_fields() {
        let rule = AlertRule::new(
            Metric::Memory,
            Comparator::Gt,
            85.0,
            AlertSeverity::High,
            "memory usage too high",
        );
        let event = AlertEvent::from_rule(&rule, &SubjectId::global(), 120.0);
        assert_eq!(event.rule_id, "memory_gt_85");
        assert_eq!(event.observed_value, 120.0);
        assert_eq!(event.sent_channels, 0);
        assert!(event.message().starts_with("[HIGH] global memory"));
    }

    #[test]
    fn comparator_parsing() {
        assert_eq!(">".parse::<Comparator>(), Ok(Comparator::Gt));
        assert_eq!("NE".parse::<Comparator>(), Ok(Comparator::Ne));
        assert!("between".parse::<Comparator>().is_err());
    }
}
