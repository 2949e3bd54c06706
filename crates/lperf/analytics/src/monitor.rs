//! Continuous monitoring: ingest samples, raise alerts, and produce periodic
//! reports until stopped.

use crate::analyzer::PerformanceAnalyzer;
use crate::error::{AnalyticsError, AnalyticsResult};
use lperf_types::{AnalysisReport, Metric, MetricSample, SubjectId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Shared stop flag. Clones observe the same signal.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Debug, Default)]
struct StopInner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Resolves once [`stop`](Self::stop) has been called.
    pub async fn stopped(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}

/// One sample pushed by the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingSample {
    pub subject: SubjectId,
    pub metric: Metric,
    pub sample: MetricSample,
}

impl IncomingSample {
    pub fn new(subject: SubjectId, metric: Metric, sample: MetricSample) -> Self {
        Self {
            subject,
            metric,
            sample,
        }
    }

    /// A sample stamped with the current time.
    pub fn now(subject: SubjectId, metric: Metric, value: f64) -> Self {
        Self::new(subject, metric, MetricSample::now(value))
    }
}

/// Counters of a finished [`Monitor::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub samples_ingested: usize,
    pub alerts_triggered: usize,
    pub reports_generated: usize,
}

/// Drives a [`PerformanceAnalyzer`] from a stream of samples.
pub struct Monitor {
    analyzer: Arc<PerformanceAnalyzer>,
    stop: StopSignal,
    appended: Mutex<HashMap<SubjectId, usize>>,
}

impl Monitor {
    pub fn new(analyzer: Arc<PerformanceAnalyzer>) -> Self {
        Self {
            analyzer,
            stop: StopSignal::new(),
            appended: Mutex::new(HashMap::new()),
        }
    }

    pub fn analyzer(&self) -> &Arc<PerformanceAnalyzer> {
        &self.analyzer
    }

    /// Handle for stopping the monitor from another task.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Append one sample, dispatch the alerts it triggers, and every
    /// `analysis_interval` samples of its subject return a fresh report.
    ///
    /// Alert rules see only the ingested sample, so rules on other metrics
    /// of the subject do not fire again for values they already reported.
    /// Periodic analysis runs on the blocking pool and is abandoned with
    /// [`AnalyticsError::Cancelled`] as soon as the stop signal fires.
    pub async fn ingest(&self, incoming: IncomingSample) -> AnalyticsResult<Ingested> {
        let IncomingSample {
            subject,
            metric,
            sample,
        } = incoming;
        self.analyzer
            .store()
            .append(&subject, metric.clone(), sample);

        let latest = HashMap::from([(metric, sample.value)]);
        let alerts = self.analyzer.alerts().process(&subject, &latest).await.len();

        let due = {
            let mut appended = self.appended.lock();
            let count = appended.entry(subject.clone()).or_default();
            *count += 1;
            *count % self.analyzer.config().monitor.analysis_interval == 0
        };
        let report = if due {
            Some(self.analyze_blocking(subject).await?)
        } else {
            None
        };
        Ok(Ingested { alerts, report })
    }

    async fn analyze_blocking(&self, subject: SubjectId) -> AnalyticsResult<AnalysisReport> {
        let analyzer = Arc::clone(&self.analyzer);
        let stop = self.stop.clone();
        let task = tokio::task::spawn_blocking(move || analyzer.analyze(&subject, &stop));
        tokio::select! {
            biased;
            _ = self.stop.stopped() => Err(AnalyticsError::Cancelled),
            joined = task => joined?,
        }
    }

    /// Consume samples until the channel closes or the stop signal fires.
    ///
    /// Alert monitoring is switched on for the duration of the loop. Reports
    /// go to `reports`; a closed report receiver does not stop ingestion.
    pub async fn run(
        &self,
        mut samples: mpsc::Receiver<IncomingSample>,
        reports: mpsc::Sender<AnalysisReport>,
    ) -> MonitorStats {
        let alerts = Arc::clone(self.analyzer.alerts());
        alerts.start_monitoring();
        tracing::info!("performance monitor started");

        let mut stats = MonitorStats::default();
        loop {
            let incoming = tokio::select! {
                biased;
                _ = self.stop.stopped() => break,
                next = samples.recv() => match next {
                    Some(incoming) => incoming,
                    None => break,
                },
            };

            let subject = incoming.subject.clone();
            match self.ingest(incoming).await {
                Ok(ingested) => {
                    stats.samples_ingested += 1;
                    stats.alerts_triggered += ingested.alerts;
                    if let Some(report) = ingested.report {
                        stats.reports_generated += 1;
                        if reports.send(report).await.is_err() {
                            tracing::debug!(subject = %subject, "report receiver dropped");
                        }
                    }
                }
                Err(AnalyticsError::Cancelled) => {
                    stats.samples_ingested += 1;
                    break;
                }
                Err(e) => {
                    stats.samples_ingested += 1;
                    tracing::warn!(subject = %subject, error = %e, "periodic analysis failed");
                }
            }
        }

        alerts.stop_monitoring();
        tracing::info!(
            samples = stats.samples_ingested,
            alerts = stats.alerts_triggered,
            reports = stats.reports_generated,
            "performance monitor stopped"
        );
        stats
    }
}

/// Outcome of ingesting one sample.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub alerts: usize,
    pub report: Option<AnalysisReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lperf_alerts::MemoryChannel;
    use std::time::Duration;

    fn monitor(interval: usize) -> (Monitor, Arc<MemoryChannel>) {
        let mut config = crate::config::AnalyticsConfig::default();
        config.monitor.analysis_interval = interval;
        let analyzer = PerformanceAnalyzer::new(config).unwrap();
        let channel = Arc::new(MemoryChannel::new());
        analyzer.alerts().add_channel(channel.clone());
        analyzer.alerts().install_default_rules();
        (Monitor::new(Arc::new(analyzer)), channel)
    }

    #[tokio::test]
    async fn stop_signal_wakes_waiters() {
        let stop = StopSignal::new();
        let waiter = {
            let stop = stop.clone();
            tokio::spawn(async move { stop.stopped().await })
        };
        stop.stop();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(stop.is_stopped());
        stop.stopped().await;
    }

    #[tokio::test]
    async fn ingest_reports_on_interval() {
        let (monitor, _) = monitor(3);
        let app = SubjectId::new("com.example.app");
        for i in 0..2 {
            let ingested = monitor
                .ingest(IncomingSample::now(app.clone(), Metric::Cpu, 10.0 + i as f64))
                .await
                .unwrap();
            assert!(ingested.report.is_none());
        }
        let ingested = monitor
            .ingest(IncomingSample::now(app.clone(), Metric::Cpu, 12.0))
            .await
            .unwrap();
        let report = ingested.report.unwrap();
        assert_eq!(report.subject, app);
        assert_eq!(report.summary.data_points, 3);
    }

    #[tokio::test]
    async fn ingest_dispatches_alerts() {
        let (monitor, channel) = monitor(100);
        let ingested = monitor
            .ingest(IncomingSample::now(SubjectId::global(), Metric::Cpu, 97.0))
            .await
            .unwrap();
        assert_eq!(ingested.alerts, 2);
        assert_eq!(channel.len(), 2);
    }

    #[tokio::test]
    async fn ingest_evaluates_only_the_new_sample() {
        let (monitor, channel) = monitor(100);
        let app = SubjectId::new("com.example.app");
        let cpu = monitor
            .ingest(IncomingSample::now(app.clone(), Metric::Cpu, 97.0))
            .await
            .unwrap();
        assert_eq!(cpu.alerts, 2);

        let memory = monitor
            .ingest(IncomingSample::now(app, Metric::Memory, 10.0))
            .await
            .unwrap();
        assert_eq!(memory.alerts, 0);
        assert_eq!(channel.len(), 2);
    }

    #[tokio::test]
    async fn run_ends_when_channel_closes() {
        let (monitor, _) = monitor(2);
        let (tx, rx) = mpsc::channel(16);
        let (reports_tx, mut reports_rx) = mpsc::channel(16);
        for value in [10.0, 20.0, 30.0, 40.0] {
            tx.send(IncomingSample::now(SubjectId::global(), Metric::Memory, value))
                .await
                .unwrap();
        }
        drop(tx);

        let stats = monitor.run(rx, reports_tx).await;
        assert_eq!(stats.samples_ingested, 4);
        assert_eq!(stats.reports_generated, 2);
        assert!(reports_rx.recv().await.is_some());
        assert!(!monitor.analyzer().alerts().is_monitoring());
    }

    #[tokio::test]
    async fn run_stops_on_signal() {
        let monitor = Arc::new(monitor(10).0);
        let (_tx, rx) = mpsc::channel::<IncomingSample>(4);
        let (reports_tx, _reports_rx) = mpsc::channel(4);

        let handle = {
            let monitor = Arc::clone(&monitor);
            tokio::spawn(async move { monitor.run(rx, reports_tx).await })
        };
        monitor.stop();
        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.samples_ingested, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_interrupts_long_analysis() {
        let (monitor, _) = monitor(1);
        let app = SubjectId::new("com.example.heavy");
        let start = chrono::Utc::now();
        for metric in Metric::BUILTIN {
            for i in 0..50_000 {
                let value = 50.0 + (i % 17) as f64;
                let at = start + chrono::Duration::milliseconds(i);
                monitor
                    .analyzer()
                    .append_sample(&app, metric.clone(), at, value);
            }
        }

        let monitor = Arc::new(monitor);
        let (tx, rx) = mpsc::channel(4);
        let (reports_tx, _reports_rx) = mpsc::channel(4);
        let handle = {
            let monitor = Arc::clone(&monitor);
            tokio::spawn(async move { monitor.run(rx, reports_tx).await })
        };
        tx.send(IncomingSample::now(app, Metric::Cpu, 40.0))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        monitor.stop();

        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(stats.samples_ingested <= 1);
        assert!(!monitor.analyzer().alerts().is_monitoring());
        drop(tx);
    }
}
