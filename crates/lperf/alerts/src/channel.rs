//! Alert channels: pluggable sinks that deliver fired alerts.
//!
//! The engine only needs each channel to report success or failure so it can
//! count how many channels accepted an event. Email, webhook and similar
//! transports are implemented outside this crate against [`AlertChannel`].

use crate::error::{AlertError, AlertResult};
use async_trait::async_trait;
use lperf_types::{AlertEvent, AlertSeverity};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Transport category of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Console,
    Log,
    File,
    Memory,
    Email,
    Webhook,
    Custom,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Console => "console",
            ChannelKind::Log => "log",
            ChannelKind::File => "file",
            ChannelKind::Memory => "memory",
            ChannelKind::Email => "email",
            ChannelKind::Webhook => "webhook",
            ChannelKind::Custom => "custom",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for alert channels
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Transport category, used to derive the channel id.
    fn kind(&self) -> ChannelKind;

    /// Deliver one event.
    async fn send(&self, event: &AlertEvent) -> AlertResult<()>;
}

/// Rebuildable description of a built-in channel, used for config persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelSpec {
    Console,
    Log,
    File { path: PathBuf },
}

impl ChannelSpec {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelSpec::Console => ChannelKind::Console,
            ChannelSpec::Log => ChannelKind::Log,
            ChannelSpec::File { .. } => ChannelKind::File,
        }
    }

    pub fn build(&self) -> Arc<dyn AlertChannel> {
        match self {
            ChannelSpec::Console => Arc::new(ConsoleChannel),
            ChannelSpec::Log => Arc::new(LogChannel),
            ChannelSpec::File { path } => Arc::new(FileChannel::new(path.clone())),
        }
    }
}

/// Writes one line per alert to stdout.
#[derive(Debug, Default)]
pub struct ConsoleChannel;

#[async_trait]
impl AlertChannel for ConsoleChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Console
    }

    async fn send(&self, event: &AlertEvent) -> AlertResult<()> {
        let line = format!("{}\n", event.message());
        let mut stdout = tokio::io::stdout();
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

/// Emits alerts as `tracing` events, levelled by severity.
#[derive(Debug, Default)]
pub struct LogChannel;

#[async_trait]
impl AlertChannel for LogChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Log
    }

    async fn send(&self, event: &AlertEvent) -> AlertResult<()> {
        match event.severity {
            AlertSeverity::Critical | AlertSeverity::High => tracing::error!(
                rule = %event.rule_id,
                subject = %event.subject,
                metric = %event.metric,
                observed = event.observed_value,
                threshold = event.threshold,
                "{}",
                event.description
            ),
            AlertSeverity::Medium => tracing::warn!(
                rule = %event.rule_id,
                subject = %event.subject,
                metric = %event.metric,
                observed = event.observed_value,
                threshold = event.threshold,
                "{}",
                event.description
            ),
            AlertSeverity::Low => tracing::info!(
                rule = %event.rule_id,
                subject = %event.subject,
                metric = %event.metric,
                observed = event.observed_value,
                threshold = event.threshold,
                "{}",
                event.description
            ),
        }
        Ok(())
    }
}

/// Appends alerts to a file as JSON lines.
pub struct FileChannel {
    path: PathBuf,
}

impl FileChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every event written so far.
    pub async fn read_all(&self) -> AlertResult<Vec<AlertEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }

        Ok(events)
    }
}

#[async_trait]
impl AlertChannel for FileChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::File
    }

    async fn send(&self, event: &AlertEvent) -> AlertResult<()> {
        let json = serde_json::to_string(event)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AlertError::ChannelFailed {
                channel: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        Ok(())
    }
}

/// Keeps delivered alerts in memory. Useful for embedding hosts and tests.
#[derive(Default)]
pub struct MemoryChannel {
    events: RwLock<Vec<AlertEvent>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AlertEvent> {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }
}

#[async_trait]
impl AlertChannel for MemoryChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Memory
    }

    async fn send(&self, event: &AlertEvent) -> AlertResult<()> {
        self.events.write().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lperf_types::{AlertRule, Comparator, Metric, SubjectId};
    use tempfile::TempDir;

    fn event() -> AlertEvent {
        let rule = AlertRule::new(
            Metric::Cpu,
            Comparator::Gt,
            80.0,
            AlertSeverity::High,
            "cpu usage too high",
        );
        AlertEvent::from_rule(&rule, &SubjectId::global(), 91.0)
    }

    #[tokio::test]
    async fn memory_channel_collects_events() {
        let channel = MemoryChannel::new();
        channel.send(&event()).await.unwrap();
        channel.send(&event()).await.unwrap();
        assert_eq!(channel.len(), 2);
        channel.clear();
        assert!(channel.is_empty());
    }

    #[tokio::test]
    async fn file_channel_appends_json_lines() {
        let dir = TempDir::new().unwrap();
        let channel = FileChannel::new(dir.path().join("alerts").join("perf.log"));

        let first = event();
        channel.send(&first).await.unwrap();
        channel.send(&event()).await.unwrap();

        let events = channel.read_all().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, first.id);
        assert_eq!(events[0].rule_id, "cpu_gt_80");
    }

    #[tokio::test]
    async fn file_channel_read_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let channel = FileChannel::new(dir.path().join("none.log"));
        assert!(channel.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn log_channel_always_succeeds() {
        assert!(LogChannel.send(&event()).await.is_ok());
    }

    #[test]
    fn spec_builds_matching_kind() {
        let specs = [
            ChannelSpec::Console,
            ChannelSpec::Log,
            ChannelSpec::File {
                path: PathBuf::from("performance_alerts.log"),
            },
        ];
        for spec in specs {
            assert_eq!(spec.build().kind(), spec.kind());
        }
    }

    #[test]
    fn spec_serializes_with_type_tag() {
        let json = serde_json::to_string(&ChannelSpec::File {
            path: PathBuf::from("a.log"),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"file","path":"a.log"}"#);
    }
}
