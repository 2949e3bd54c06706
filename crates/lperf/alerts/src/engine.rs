//! Alert engine: rule registry, evaluation, dispatch and history.
//!
//! ```text
//! latest samples ──► evaluate ──► AlertEvent ──► dispatch ──► channels
//!                       │                            │
//!                    rules (by id)               history (append)
//! ```
//!
//! Evaluation is a pure decision over the rule set. Dispatch fans an event
//! out to channels, retrying each one per the configured [`RetryPolicy`],
//! and records the event with the number of channels that accepted it.
//! History storage is unbounded; retrieval is windowed, and the engine warns
//! every `history_warn_threshold` stored events.
//!
//! [`RetryPolicy`]: lperf_types::RetryPolicy

use crate::channel::{AlertChannel, ChannelKind, ChannelSpec};
use crate::config::AlertConfig;
use crate::error::{AlertError, AlertResult};
use crate::report::{AlertReport, ChannelInfo};
use crate::templates::RuleTemplates;
use chrono::{DateTime, Utc};
use lperf_types::{AlertEvent, AlertRule, AlertSeverity, Comparator, Metric, SubjectId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// The rule set installed by [`AlertEngine::install_default_rules`].
pub fn default_rules() -> Vec<AlertRule> {
    vec![
        AlertRule::new(
            Metric::Cpu,
            Comparator::Gt,
            80.0,
            AlertSeverity::High,
            "CPU usage too high",
        ),
        AlertRule::new(
            Metric::Cpu,
            Comparator::Gt,
            95.0,
            AlertSeverity::Critical,
            "CPU usage critically high",
        ),
        AlertRule::new(
            Metric::Memory,
            Comparator::Gt,
            85.0,
            AlertSeverity::High,
            "memory usage too high",
        ),
        AlertRule::new(
            Metric::Memory,
            Comparator::Gt,
            95.0,
            AlertSeverity::Critical,
            "memory usage critically high",
        ),
        AlertRule::new(
            Metric::Fps,
            Comparator::Lt,
            30.0,
            AlertSeverity::Medium,
            "frame rate too low",
        ),
        AlertRule::new(
            Metric::Fps,
            Comparator::Lt,
            20.0,
            AlertSeverity::High,
            "frame rate critically low",
        ),
    ]
}

/// A channel that did not accept an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFailure {
    pub channel: String,
    /// Attempts made; 0 if the channel was not found.
    pub attempts: u32,
    pub reason: String,
}

/// Result of dispatching one event.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// The recorded event, with `sent_channels` filled in.
    pub event: AlertEvent,
    pub failures: Vec<ChannelFailure>,
}

impl DispatchOutcome {
    pub fn fully_delivered(&self) -> bool {
        self.failures.is_empty()
    }
}

/// On-disk form of the engine's rules and rebuildable channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedAlertConfig {
    rules: Vec<AlertRule>,
    channels: Vec<ChannelSpec>,
    saved_at: DateTime<Utc>,
}

struct RegisteredChannel {
    info: ChannelInfo,
    spec: Option<ChannelSpec>,
    channel: Arc<dyn AlertChannel>,
}

/// Threshold alerting over the freshest samples of each subject.
pub struct AlertEngine {
    config: AlertConfig,
    rules: RwLock<BTreeMap<String, AlertRule>>,
    channels: RwLock<Vec<RegisteredChannel>>,
    channel_seq: AtomicUsize,
    history: RwLock<Vec<AlertEvent>>,
    monitoring: AtomicBool,
}

impl AlertEngine {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            config,
            rules: RwLock::new(BTreeMap::new()),
            channels: RwLock::new(Vec::new()),
            channel_seq: AtomicUsize::new(0),
            history: RwLock::new(Vec::new()),
            monitoring: AtomicBool::new(false),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(AlertConfig::default())
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    // ── Rules ────────────────────────────────────────────────────────

    /// Register a rule and return its id. A rule with the same id is replaced.
    pub fn add_rule(
        &self,
        metric: Metric,
        comparator: Comparator,
        threshold: f64,
        severity: AlertSeverity,
        description: impl Into<String>,
    ) -> AlertResult<String> {
        let rule = AlertRule::new(metric, comparator, threshold, severity, description);
        let id = rule.id.clone();
        self.insert_rule(rule)?;
        Ok(id)
    }

    /// Register a prepared rule, returning the rule it replaced.
    pub fn insert_rule(&self, rule: AlertRule) -> AlertResult<Option<AlertRule>> {
        if !rule.threshold.is_finite() {
            return Err(AlertError::InvalidRule(format!(
                "rule {} has non-finite threshold",
                rule.id
            )));
        }
        tracing::debug!(rule = %rule.id, severity = %rule.severity, "alert rule registered");
        Ok(self.rules.write().insert(rule.id.clone(), rule))
    }

    /// Register a rule built from a named template.
    pub fn add_rule_from_template(
        &self,
        templates: &RuleTemplates,
        name: &str,
        threshold: Option<f64>,
    ) -> AlertResult<String> {
        let rule = templates.create_rule(name, threshold)?;
        let id = rule.id.clone();
        self.insert_rule(rule)?;
        Ok(id)
    }

    pub fn remove_rule(&self, rule_id: &str) -> AlertResult<AlertRule> {
        self.rules
            .write()
            .remove(rule_id)
            .ok_or_else(|| AlertError::RuleNotFound(rule_id.to_string()))
    }

    pub fn set_rule_enabled(&self, rule_id: &str, enabled: bool) -> AlertResult<()> {
        let mut rules = self.rules.write();
        let rule = rules
            .get_mut(rule_id)
            .ok_or_else(|| AlertError::RuleNotFound(rule_id.to_string()))?;
        rule.enabled = enabled;
        Ok(())
    }

    pub fn rule(&self, rule_id: &str) -> Option<AlertRule> {
        self.rules.read().get(rule_id).cloned()
    }

    pub fn rules(&self) -> Vec<AlertRule> {
        self.rules.read().values().cloned().collect()
    }

    /// Install [`default_rules`], keeping any existing rule with the same id.
    /// Returns how many rules were added.
    pub fn install_default_rules(&self) -> usize {
        let mut rules = self.rules.write();
        let mut added = 0;
        for rule in default_rules() {
            if !rules.contains_key(&rule.id) {
                rules.insert(rule.id.clone(), rule);
                added += 1;
            }
        }
        added
    }

    // ── Channels ─────────────────────────────────────────────────────

    /// Register a channel and return its id, `{kind}_{n}`.
    pub fn add_channel(&self, channel: Arc<dyn AlertChannel>) -> String {
        self.register_channel(channel, None)
    }

    /// Register one of the built-in channels from its spec.
    pub fn add_channel_spec(&self, spec: ChannelSpec) -> String {
        let channel = spec.build();
        self.register_channel(channel, Some(spec))
    }

    fn register_channel(&self, channel: Arc<dyn AlertChannel>, spec: Option<ChannelSpec>) -> String {
        let kind = channel.kind();
        let id = format!("{}_{}", kind, self.channel_seq.fetch_add(1, Ordering::SeqCst));
        tracing::debug!(channel = %id, "alert channel registered");
        self.channels.write().push(RegisteredChannel {
            info: ChannelInfo {
                id: id.clone(),
                kind,
                enabled: true,
                created_at: Utc::now(),
            },
            spec,
            channel,
        });
        id
    }

    pub fn remove_channel(&self, channel_id: &str) -> AlertResult<()> {
        let mut channels = self.channels.write();
        let before = channels.len();
        channels.retain(|c| c.info.id != channel_id);
        if channels.len() == before {
            return Err(AlertError::ChannelNotFound(channel_id.to_string()));
        }
        Ok(())
    }

    pub fn set_channel_enabled(&self, channel_id: &str, enabled: bool) -> AlertResult<()> {
        let mut channels = self.channels.write();
        let entry = channels
            .iter_mut()
            .find(|c| c.info.id == channel_id)
            .ok_or_else(|| AlertError::ChannelNotFound(channel_id.to_string()))?;
        entry.info.enabled = enabled;
        Ok(())
    }

    pub fn channels(&self) -> Vec<ChannelInfo> {
        self.channels.read().iter().map(|c| c.info.clone()).collect()
    }

    /// Register console, log and (if configured) file channels.
    pub fn install_default_channels(&self) -> Vec<String> {
        let mut ids = vec![
            self.add_channel_spec(ChannelSpec::Console),
            self.add_channel_spec(ChannelSpec::Log),
        ];
        if let Some(path) = &self.config.default_log_path {
            ids.push(self.add_channel_spec(ChannelSpec::File { path: path.clone() }));
        }
        ids
    }

    // ── Monitoring ───────────────────────────────────────────────────

    /// Mark the engine as monitoring, installing default rules and, if no
    /// channel is registered yet, the default channels.
    pub fn start_monitoring(&self) {
        self.monitoring.store(true, Ordering::SeqCst);
        let added = self.install_default_rules();
        if self.channels.read().is_empty() {
            self.install_default_channels();
        }
        tracing::info!(default_rules_added = added, "alert monitoring started");
    }

    pub fn stop_monitoring(&self) {
        self.monitoring.store(false, Ordering::SeqCst);
        tracing::info!("alert monitoring stopped");
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    // ── Evaluation & dispatch ────────────────────────────────────────

    /// Apply every enabled rule whose metric is present in `latest`.
    /// One event per triggered rule; nothing is recorded.
    pub fn evaluate(&self, subject: &SubjectId, latest: &HashMap<Metric, f64>) -> Vec<AlertEvent> {
        self.rules
            .read()
            .values()
            .filter(|rule| rule.enabled)
            .filter_map(|rule| {
                let observed = *latest.get(&rule.metric)?;
                rule.matches(observed)
                    .then(|| AlertEvent::from_rule(rule, subject, observed))
            })
            .collect()
    }

    /// Send `event` to the given channels (all enabled channels when `None`)
    /// and record it in history.
    pub async fn dispatch(
        &self,
        mut event: AlertEvent,
        channel_ids: Option<&[String]>,
    ) -> DispatchOutcome {
        let mut failures = Vec::new();
        let targets: Vec<(String, Arc<dyn AlertChannel>)> = {
            let channels = self.channels.read();
            match channel_ids {
                None => channels
                    .iter()
                    .filter(|c| c.info.enabled)
                    .map(|c| (c.info.id.clone(), Arc::clone(&c.channel)))
                    .collect(),
                Some(ids) => {
                    let mut targets = Vec::with_capacity(ids.len());
                    for id in ids {
                        match channels.iter().find(|c| &c.info.id == id && c.info.enabled) {
                            Some(c) => targets.push((c.info.id.clone(), Arc::clone(&c.channel))),
                            None => failures.push(ChannelFailure {
                                channel: id.clone(),
                                attempts: 0,
                                reason: AlertError::ChannelNotFound(id.clone()).to_string(),
                            }),
                        }
                    }
                    targets
                }
            }
        };

        let mut sent = 0;
        for (id, channel) in targets {
            match self.send_with_retry(&id, channel.as_ref(), &event).await {
                Ok(()) => sent += 1,
                Err(failure) => failures.push(failure),
            }
        }

        event.sent_channels = sent;
        self.record(event.clone());
        DispatchOutcome { event, failures }
    }

    /// Evaluate `latest` and dispatch every triggered event to all channels.
    pub async fn process(
        &self,
        subject: &SubjectId,
        latest: &HashMap<Metric, f64>,
    ) -> Vec<DispatchOutcome> {
        let events = self.evaluate(subject, latest);
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            tracing::warn!(
                rule = %event.rule_id,
                subject = %subject,
                observed = event.observed_value,
                "alert triggered"
            );
            outcomes.push(self.dispatch(event, None).await);
        }
        outcomes
    }

    async fn send_with_retry(
        &self,
        id: &str,
        channel: &dyn AlertChannel,
        event: &AlertEvent,
    ) -> Result<(), ChannelFailure> {
        let policy = &self.config.retry;
        let attempts = policy.attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(policy.delay_for(attempt - 1)).await;
            }
            match channel.send(event).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(channel = id, attempt, error = %e, "alert channel send failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(ChannelFailure {
            channel: id.to_string(),
            attempts,
            reason: last_error,
        })
    }

    fn record(&self, event: AlertEvent) {
        let stored = {
            let mut history = self.history.write();
            history.push(event);
            history.len()
        };
        let threshold = self.config.history_warn_threshold;
        if threshold > 0 && stored % threshold == 0 {
            tracing::warn!(stored, "alert history keeps growing, clear it to release memory");
        }
    }

    // ── History ──────────────────────────────────────────────────────

    /// The most recent `limit` events, oldest first.
    pub fn history(&self, limit: usize) -> Vec<AlertEvent> {
        let history = self.history.read();
        let start = history.len().saturating_sub(limit);
        history[start..].to_vec()
    }

    /// The most recent `limit` events for one subject, oldest first.
    pub fn history_for(&self, subject: &SubjectId, limit: usize) -> Vec<AlertEvent> {
        let history = self.history.read();
        let mut events: Vec<AlertEvent> = history
            .iter()
            .rev()
            .filter(|e| &e.subject == subject)
            .take(limit)
            .cloned()
            .collect();
        events.reverse();
        events
    }

    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }

    pub fn clear_history(&self) {
        self.history.write().clear();
        tracing::info!("alert history cleared");
    }

    // ── Reporting & persistence ──────────────────────────────────────

    pub fn alert_report(&self) -> AlertReport {
        let rules = self.rules();
        AlertReport {
            generated_at: Utc::now(),
            monitoring: self.is_monitoring(),
            total_rules: rules.len(),
            enabled_rules: rules.iter().filter(|r| r.enabled).count(),
            total_channels: self.channels.read().len(),
            total_alerts: self.history_len(),
            recent_alerts: self.history(self.config.recent_alert_count),
            rules,
            channels: self.channels(),
        }
    }

    /// Save rules and rebuildable channels as JSON. Custom channels are not
    /// persisted.
    pub fn save_config(&self, path: &Path) -> AlertResult<()> {
        let persisted = PersistedAlertConfig {
            rules: self.rules(),
            channels: self
                .channels
                .read()
                .iter()
                .filter_map(|c| c.spec.clone())
                .collect(),
            saved_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&persisted)?;

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Replace rules and rebuildable channels with those saved at `path`.
    /// Returns the number of rules loaded.
    pub fn load_config(&self, path: &Path) -> AlertResult<usize> {
        let content = std::fs::read_to_string(path)?;
        let persisted: PersistedAlertConfig = serde_json::from_str(&content)?;

        {
            let mut rules = self.rules.write();
            rules.clear();
            for rule in &persisted.rules {
                rules.insert(rule.id.clone(), rule.clone());
            }
        }

        self.channels.write().retain(|c| c.spec.is_none());
        for spec in persisted.channels {
            self.add_channel_spec(spec);
        }

        tracing::info!(
            rules = persisted.rules.len(),
            path = %path.display(),
            "alert config loaded"
        );
        Ok(persisted.rules.len())
    }
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}
