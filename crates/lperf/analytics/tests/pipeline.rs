//! End-to-end: collector samples through monitor, alerts, reports and model
//! persistence.

use chrono::{Duration, Utc};
use lperf_alerts::{AlertEngine, FileChannel, MemoryChannel};
use lperf_analytics::{
    AnalysisEvent, AnalyticsConfig, AnalyticsError, IncomingSample, JsonFileModelStore, Monitor,
    PerformanceAnalyzer, RecordingObserver, StopSignal,
};
use lperf_types::{
    AlertSeverity, ForecastAlgorithm, Metric, MetricSample, ModelState, SubjectId, TrendDirection,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn fill(analyzer: &PerformanceAnalyzer, subject: &SubjectId, metric: Metric, values: &[f64]) {
    let start = Utc::now();
    for (i, v) in values.iter().enumerate() {
        analyzer.append_sample(subject, metric.clone(), start + Duration::seconds(i as i64), *v);
    }
}

#[test]
fn report_for_a_degrading_app() {
    let analyzer = PerformanceAnalyzer::with_defaults();
    let app = SubjectId::new("com.example.shop");

    fill(
        &analyzer,
        &app,
        Metric::Cpu,
        &[10.0, 20.0, 30.0, 85.0, 90.0, 40.0, 50.0, 60.0, 70.0, 96.0, 45.0, 55.0],
    );
    let battery: Vec<f64> = (0..30).map(|i| 100.0 - i as f64 * 2.0).collect();
    fill(&analyzer, &app, Metric::Battery, &battery);
    fill(&analyzer, &app, Metric::StartupTime, &[7.5]);

    let report = analyzer.analyze(&app, &StopSignal::new()).unwrap();

    let cpu_usage = report
        .findings_for(&Metric::Cpu)
        .find(|f| f.code() == "high_cpu_usage")
        .unwrap();
    assert_eq!(cpu_usage.periods.iter().copied().collect::<Vec<_>>(), vec![3, 4, 9]);
    assert_eq!(cpu_usage.evidence.max, 96.0);

    assert!(report.findings.iter().any(|f| f.code() == "high_battery_consumption"));
    assert!(report.findings.iter().any(|f| f.code() == "slow_startup"));
    assert_eq!(
        report.trend_for(&Metric::Battery).map(|t| t.direction),
        Some(TrendDirection::Decreasing)
    );
    assert!(report
        .recommendations
        .contains(&"[BATTERY] declining trend, monitor closely".to_string()));

    // battery trains; cpu and startup are too short
    assert_eq!(report.forecasts.len(), 3);
    assert!(report.forecasts.iter().all(|f| f.metric == Metric::Battery));
    assert!(report.summary_text().contains("Subject: com.example.shop"));
}

#[test]
fn subjects_are_analyzed_independently() {
    let analyzer = PerformanceAnalyzer::with_defaults();
    let a = SubjectId::new("a");
    let b = SubjectId::new("b");
    let ramp: Vec<f64> = (0..30).map(|i| 5.0 + i as f64).collect();
    fill(&analyzer, &a, Metric::Memory, &ramp);
    fill(&analyzer, &b, Metric::Memory, &[40.0; 5]);

    analyzer.train(&a, ForecastAlgorithm::LinearRegression).unwrap();
    let engine = analyzer.forecast_engine();
    assert_eq!(
        engine.model_state(&a, ForecastAlgorithm::LinearRegression, &Metric::Memory, 30),
        ModelState::Trained
    );
    assert_eq!(
        engine.model_state(&b, ForecastAlgorithm::LinearRegression, &Metric::Memory, 5),
        ModelState::Untrained
    );

    let report_b = analyzer.generate_report(&b, &StopSignal::new()).unwrap();
    assert!(report_b.forecasts.is_empty());
    assert_eq!(
        report_b.recommendations,
        vec!["performance looks good, keep monitoring".to_string()]
    );
}

#[test]
fn observer_sees_training_narration() {
    let observer = Arc::new(RecordingObserver::new());
    let analyzer = PerformanceAnalyzer::with_defaults().with_observer(observer.clone());
    let app = SubjectId::global();
    let wave: Vec<f64> = (0..40).map(|i| 50.0 + ((i % 6) as f64) * 4.0).collect();
    fill(&analyzer, &app, Metric::Fps, &wave);
    fill(&analyzer, &app, Metric::Network, &[-1.0; 25]);

    let summary = analyzer.train(&app, ForecastAlgorithm::MovingAverage).unwrap();
    assert_eq!(summary.models_trained(), 1);
    assert_eq!(summary.rejected.len(), 1);

    let events = observer.events();
    assert!(events.iter().any(|e| matches!(
        e,
        AnalysisEvent::ModelTrained { metric: Metric::Fps, .. }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        AnalysisEvent::TrainingRejected { metric: Metric::Network, .. }
    )));
}

#[test]
fn models_persist_across_restarts() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileModelStore::new(dir.path().join("models.json"));
    let app = SubjectId::new("com.example.app");
    let ramp: Vec<f64> = (0..25).map(|i| 30.0 + i as f64 * 2.0).collect();

    let first = PerformanceAnalyzer::with_defaults();
    fill(&first, &app, Metric::Cpu, &ramp);
    for algorithm in ForecastAlgorithm::ALL {
        first.train(&app, algorithm).unwrap();
    }
    assert_eq!(first.forecast_engine().save_models(&store).unwrap(), 3);

    let second = PerformanceAnalyzer::with_defaults();
    fill(&second, &app, Metric::Cpu, &ramp);
    assert_eq!(second.forecast_engine().load_models(&store).unwrap(), 3);
    let forecast = second
        .predict(&app, &Metric::Cpu, ForecastAlgorithm::LinearRegression, 2)
        .unwrap();
    assert!((forecast.predicted_values[0] - 80.0).abs() < 1e-6);
}

#[test]
fn config_file_drives_thresholds() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lperf.toml");
    std::fs::write(
        &path,
        "[bottleneck.fps]\nfloor = 50.0\nhigh_severity_below = 10.0\n",
    )
    .unwrap();

    let analyzer = PerformanceAnalyzer::new(AnalyticsConfig::load(&path).unwrap()).unwrap();
    let app = SubjectId::global();
    fill(&analyzer, &app, Metric::Fps, &[60.0, 45.0, 58.0]);
    let findings = analyzer.detect_bottlenecks(&app).unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].code(), "low_fps");
}

#[tokio::test]
async fn monitor_pipeline_with_file_alerts() {
    let dir = TempDir::new().unwrap();
    let alert_log = dir.path().join("alerts.jsonl");

    let alerts = Arc::new(AlertEngine::with_defaults());
    alerts.add_channel(Arc::new(FileChannel::new(&alert_log)));
    let mut config = AnalyticsConfig::default();
    config.monitor.analysis_interval = 5;
    let analyzer = PerformanceAnalyzer::new(config)
        .unwrap()
        .with_alert_engine(Arc::clone(&alerts));
    let monitor = Monitor::new(Arc::new(analyzer));

    let (tx, rx) = mpsc::channel(32);
    let (reports_tx, mut reports_rx) = mpsc::channel(8);
    let app = SubjectId::new("com.example.app");
    let start = Utc::now();
    for (i, value) in [40.0, 45.0, 97.0, 50.0, 42.0].into_iter().enumerate() {
        let sample = MetricSample::new(start + Duration::seconds(i as i64), value);
        tx.send(IncomingSample::new(app.clone(), Metric::Cpu, sample))
            .await
            .unwrap();
    }
    drop(tx);

    let stats = monitor.run(rx, reports_tx).await;
    assert_eq!(stats.samples_ingested, 5);
    assert_eq!(stats.alerts_triggered, 2);
    assert_eq!(stats.reports_generated, 1);

    let report = reports_rx.recv().await.unwrap();
    assert_eq!(report.summary.total_alerts, 2);
    assert!(report
        .alerts
        .iter()
        .any(|a| a.severity == AlertSeverity::Critical));

    let logged = FileChannel::new(&alert_log).read_all().await.unwrap();
    assert_eq!(logged.len(), 2);
    let mut rule_ids: Vec<_> = logged.iter().map(|e| e.rule_id.as_str()).collect();
    rule_ids.sort();
    assert_eq!(rule_ids, vec!["cpu_gt_80", "cpu_gt_95"]);
}

#[tokio::test]
async fn stop_cancels_in_flight_analysis() {
    let analyzer = Arc::new(PerformanceAnalyzer::with_defaults());
    let app = SubjectId::global();
    fill(&analyzer, &app, Metric::Memory, &[10.0, 20.0, 30.0]);
    let alerts = analyzer.alerts();
    alerts.add_channel(Arc::new(MemoryChannel::new()));

    let monitor = Monitor::new(Arc::clone(&analyzer));
    monitor.stop();
    let err = analyzer.generate_report(&app, &monitor.stop_signal()).unwrap_err();
    assert!(matches!(err, AnalyticsError::Cancelled));

    let (tx, rx) = mpsc::channel(1);
    let (reports_tx, _reports_rx) = mpsc::channel(1);
    tx.send(IncomingSample::now(app, Metric::Memory, 99.0))
        .await
        .unwrap();
    let stats = monitor.run(rx, reports_tx).await;
    assert_eq!(stats.samples_ingested, 0);
}
