//! Training and prediction cost on long histories.

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lperf_analytics::{ForecastEngine, PerformanceAnalyzer, StopSignal, SubjectSnapshot};
use lperf_types::{ForecastAlgorithm, Metric, MetricSample, MetricSeries, SubjectId};

fn history(len: usize) -> MetricSeries {
    let start = Utc::now();
    let samples = (0..len)
        .map(|i| {
            let value = 50.0 + (i as f64 * 0.1).sin() * 20.0 + (i % 7) as f64;
            MetricSample::new(start + Duration::milliseconds(i as i64 * 500), value)
        })
        .collect();
    MetricSeries::from_samples(Metric::Cpu, samples)
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("train");
    for len in [1_000usize, 10_000, 100_000] {
        let snapshot = SubjectSnapshot::from_series(SubjectId::global(), vec![history(len)]);
        group.throughput(Throughput::Elements(len as u64));
        for algorithm in ForecastAlgorithm::ALL {
            group.bench_with_input(BenchmarkId::new(algorithm.as_str(), len), &snapshot, |b, s| {
                let engine = ForecastEngine::with_defaults();
                b.iter(|| {
                    let set = engine.prepare_training_data(black_box(s));
                    engine.train_all(algorithm, &set)
                });
            });
        }
    }
    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let subject = SubjectId::global();
    let series = history(10_000);
    let engine = ForecastEngine::with_defaults();
    let snapshot = SubjectSnapshot::from_series(subject.clone(), vec![series.clone()]);
    let set = engine.prepare_training_data(&snapshot);
    for algorithm in ForecastAlgorithm::ALL {
        engine.train_all(algorithm, &set);
    }

    let mut group = c.benchmark_group("predict");
    for algorithm in ForecastAlgorithm::ALL {
        group.bench_function(algorithm.as_str(), |b| {
            b.iter(|| engine.predict(&subject, algorithm, black_box(&series), 10))
        });
    }
    group.finish();
}

fn bench_report(c: &mut Criterion) {
    let analyzer = PerformanceAnalyzer::with_defaults();
    let subject = SubjectId::global();
    let start = Utc::now();
    for metric in [Metric::Cpu, Metric::Memory, Metric::Fps, Metric::Network] {
        for i in 0..5_000 {
            let value = 40.0 + (i as f64 * 0.05).cos() * 30.0;
            analyzer.append_sample(&subject, metric.clone(), start + Duration::seconds(i), value);
        }
    }
    let stop = StopSignal::new();

    c.bench_function("analyze_4x5000", |b| {
        b.iter(|| analyzer.analyze(black_box(&subject), &stop))
    });
}

criterion_group!(benches, bench_training, bench_prediction, bench_report);
criterion_main!(benches);
