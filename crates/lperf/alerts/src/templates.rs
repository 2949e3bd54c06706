//! Named rule templates for common alert conditions.

use crate::error::{AlertError, AlertResult};
use lperf_types::{AlertRule, AlertSeverity, Comparator, Metric};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder replaced by the effective threshold in template descriptions.
const THRESHOLD_PLACEHOLDER: &str = "{threshold}";

/// Blueprint for an [`AlertRule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTemplate {
    pub name: String,
    pub metric: Metric,
    pub comparator: Comparator,
    pub threshold: f64,
    pub severity: AlertSeverity,
    /// May contain `{threshold}`.
    pub description: String,
}

impl RuleTemplate {
    /// Instantiate the template, optionally overriding its threshold.
    pub fn instantiate(&self, threshold: Option<f64>) -> AlertResult<AlertRule> {
        let threshold = threshold.unwrap_or(self.threshold);
        if !threshold.is_finite() {
            return Err(AlertError::InvalidRule(format!(
                "template {} given non-finite threshold",
                self.name
            )));
        }
        let description = self
            .description
            .replace(THRESHOLD_PLACEHOLDER, &threshold.to_string());
        Ok(AlertRule::new(
            self.metric.clone(),
            self.comparator,
            threshold,
            self.severity,
            description,
        ))
    }
}

/// Registry of rule templates.
#[derive(Debug, Clone)]
pub struct RuleTemplates {
    templates: BTreeMap<String, RuleTemplate>,
}

impl RuleTemplates {
    /// The built-in templates: `cpu_high`, `memory_high`, `fps_low`,
    /// `network_high`.
    pub fn builtin() -> Self {
        let mut templates = Self {
            templates: BTreeMap::new(),
        };
        templates.register(RuleTemplate {
            name: "cpu_high".into(),
            metric: Metric::Cpu,
            comparator: Comparator::Gt,
            threshold: 80.0,
            severity: AlertSeverity::High,
            description: "CPU usage above {threshold}%".into(),
        });
        templates.register(RuleTemplate {
            name: "memory_high".into(),
            metric: Metric::Memory,
            comparator: Comparator::Gt,
            threshold: 85.0,
            severity: AlertSeverity::High,
            description: "memory usage above {threshold}MB".into(),
        });
        templates.register(RuleTemplate {
            name: "fps_low".into(),
            metric: Metric::Fps,
            comparator: Comparator::Lt,
            threshold: 30.0,
            severity: AlertSeverity::Medium,
            description: "frame rate below {threshold}".into(),
        });
        templates.register(RuleTemplate {
            name: "network_high".into(),
            metric: Metric::Network,
            comparator: Comparator::Gt,
            threshold: 1000.0,
            severity: AlertSeverity::Medium,
            description: "network throughput above {threshold}KB/s".into(),
        });
        templates
    }

    /// Add or replace a template.
    pub fn register(&mut self, template: RuleTemplate) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Option<&RuleTemplate> {
        self.templates.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    /// Build a rule from a named template.
    pub fn create_rule(&self, name: &str, threshold: Option<f64>) -> AlertResult<AlertRule> {
        self.templates
            .get(name)
            .ok_or_else(|| AlertError::TemplateNotFound(name.to_string()))?
            .instantiate(threshold)
    }
}

impl Default for RuleTemplates {
    fn default() -> Self {
        Self::builtin()
    }
}
