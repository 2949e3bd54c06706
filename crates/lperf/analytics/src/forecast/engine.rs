//! Model registry, training and prediction.

use super::features::{self, TrainingSeries};
use super::model::ForecastModel;
use super::persistence::ModelStore;
use crate::config::ForecastConfig;
use crate::error::{AnalyticsError, AnalyticsResult, ValidationFailure};
use crate::store::SubjectSnapshot;
use chrono::{DateTime, Utc};
use lperf_types::{
    Forecast, ForecastAlgorithm, Metric, MetricSeries, ModelState, SubjectId, TrendDirection,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

/// Identity of a model entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey {
    pub subject: SubjectId,
    pub algorithm: ForecastAlgorithm,
    pub metric: Metric,
}

impl ModelKey {
    pub fn new(subject: SubjectId, algorithm: ForecastAlgorithm, metric: Metric) -> Self {
        Self {
            subject,
            algorithm,
            metric,
        }
    }

    fn of(model: &ForecastModel) -> Self {
        Self::new(model.subject.clone(), model.algorithm(), model.metric.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedMetric {
    pub metric: Metric,
    pub failure: ValidationFailure,
}

/// Output of training data preparation for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSet {
    pub subject: SubjectId,
    pub accepted: Vec<TrainingSeries>,
    pub rejected: Vec<RejectedMetric>,
}

impl TrainingSet {
    pub fn get(&self, metric: &Metric) -> Option<&TrainingSeries> {
        self.accepted.iter().find(|s| &s.metric == metric)
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedMetric {
    pub metric: Metric,
    pub accuracy: f64,
    pub samples: usize,
}

/// Result of training one algorithm over a training set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub subject: SubjectId,
    pub algorithm: ForecastAlgorithm,
    pub trained: Vec<TrainedMetric>,
    pub rejected: Vec<RejectedMetric>,
    /// Mean accuracy of the trained models; 0 if none.
    pub overall_accuracy: f64,
    pub trained_at: DateTime<Utc>,
}

impl TrainingSummary {
    pub fn models_trained(&self) -> usize {
        self.trained.len()
    }
}

/// Per-metric view of the prediction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPredictionSummary {
    pub predictions: usize,
    pub mean_accuracy: f64,
    pub mean_confidence: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
    /// Direction of the most recent forecast.
    pub direction: TrendDirection,
    /// Spread of the most recent forecast's values.
    pub range: f64,
    pub latest_confidence: f64,
}

/// Aggregate over every logged forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionReport {
    pub generated_at: DateTime<Utc>,
    pub total_predictions: usize,
    pub metrics: Vec<Metric>,
    pub algorithms: Vec<ForecastAlgorithm>,
    /// Mean model accuracy over all logged forecasts.
    pub overall_accuracy: f64,
    pub per_metric: BTreeMap<Metric, MetricPredictionSummary>,
}

impl PredictionReport {
    pub fn summary_text(&self) -> String {
        if self.total_predictions == 0 {
            return "no predictions recorded".to_string();
        }
        let mut lines = vec![
            format!("predictions: {}", self.total_predictions),
            format!("overall accuracy: {:.2}", self.overall_accuracy),
        ];
        for (metric, summary) in &self.per_metric {
            lines.push(format!(
                "{}: {} (confidence {:.2}, range {:.2})",
                metric.label(),
                summary.direction,
                summary.latest_confidence,
                summary.range
            ));
        }
        lines.join("\n")
    }
}

/// Trains and serves forecast models.
///
/// Entries are keyed by (subject, algorithm, metric) and held as
/// `Arc<ForecastModel>`. Retraining swaps the whole entry under the write
/// lock, so a concurrent `predict` sees either the old or the new model.
pub struct ForecastEngine {
    config: ForecastConfig,
    models: RwLock<HashMap<ModelKey, Arc<ForecastModel>>>,
    predictions: RwLock<VecDeque<Forecast>>,
}

impl ForecastEngine {
    pub fn new(config: ForecastConfig) -> Self {
        Self {
            config,
            models: RwLock::new(HashMap::new()),
            predictions: RwLock::new(VecDeque::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ForecastConfig::default())
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    // ── Training ────────────────────────────────────────────────────

    /// Validate every series of the snapshot and extract features. Metrics
    /// that fail validation are listed in `rejected`.
    pub fn prepare_training_data(&self, snapshot: &SubjectSnapshot) -> TrainingSet {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for (metric, series) in snapshot.iter() {
            match features::prepare_series(series, &self.config) {
                Ok(prepared) => accepted.push(prepared),
                Err(failure) => rejected.push(RejectedMetric {
                    metric: metric.clone(),
                    failure,
                }),
            }
        }
        TrainingSet {
            subject: snapshot.subject.clone(),
            accepted,
            rejected,
        }
    }

    /// Fit one model and install it, replacing any previous entry.
    pub fn train(
        &self,
        subject: &SubjectId,
        algorithm: ForecastAlgorithm,
        data: &TrainingSeries,
    ) -> Arc<ForecastModel> {
        let model = Arc::new(ForecastModel::fit(
            subject.clone(),
            algorithm,
            data,
            &self.config,
        ));
        self.models
            .write()
            .insert(ModelKey::of(&model), Arc::clone(&model));
        model
    }

    /// Fit `algorithm` for every accepted metric of the set.
    pub fn train_all(&self, algorithm: ForecastAlgorithm, set: &TrainingSet) -> TrainingSummary {
        let trained: Vec<TrainedMetric> = set
            .accepted
            .iter()
            .map(|data| {
                let model = self.train(&set.subject, algorithm, data);
                TrainedMetric {
                    metric: data.metric.clone(),
                    accuracy: model.accuracy,
                    samples: data.values.len(),
                }
            })
            .collect();

        let overall_accuracy = if trained.is_empty() {
            0.0
        } else {
            trained.iter().map(|t| t.accuracy).sum::<f64>() / trained.len() as f64
        };

        TrainingSummary {
            subject: set.subject.clone(),
            algorithm,
            trained,
            rejected: set.rejected.clone(),
            overall_accuracy,
            trained_at: Utc::now(),
        }
    }

    // ── Model registry ──────────────────────────────────────────────

    pub fn model(
        &self,
        subject: &SubjectId,
        algorithm: ForecastAlgorithm,
        metric: &Metric,
    ) -> Option<Arc<ForecastModel>> {
        self.models
            .read()
            .get(&ModelKey::new(subject.clone(), algorithm, metric.clone()))
            .cloned()
    }

    /// Lifecycle state of a model given the current series length.
    pub fn model_state(
        &self,
        subject: &SubjectId,
        algorithm: ForecastAlgorithm,
        metric: &Metric,
        current_len: usize,
    ) -> ModelState {
        match self.model(subject, algorithm, metric) {
            None => ModelState::Untrained,
            Some(model) if model.is_stale(current_len) => ModelState::Stale,
            Some(_) => ModelState::Trained,
        }
    }

    /// Every model of `subject`, ordered by metric then algorithm.
    pub fn models_for(&self, subject: &SubjectId) -> Vec<Arc<ForecastModel>> {
        let mut models: Vec<_> = self
            .models
            .read()
            .iter()
            .filter(|(key, _)| &key.subject == subject)
            .map(|(_, model)| Arc::clone(model))
            .collect();
        models.sort_by(|a, b| {
            a.metric
                .cmp(&b.metric)
                .then_with(|| a.algorithm().cmp(&b.algorithm()))
        });
        models
    }

    pub fn model_count(&self) -> usize {
        self.models.read().len()
    }

    /// Drop every model of `subject`. Returns how many were removed.
    pub fn remove_subject(&self, subject: &SubjectId) -> usize {
        let mut models = self.models.write();
        let before = models.len();
        models.retain(|key, _| &key.subject != subject);
        before - models.len()
    }

    // ── Prediction ──────────────────────────────────────────────────

    /// Forecast `horizon` steps of `series` with a trained model.
    ///
    /// Never trains implicitly: a missing model is
    /// [`AnalyticsError::ModelNotTrained`]. A model trained on a shorter
    /// series still predicts, and the forecast is marked stale.
    pub fn predict(
        &self,
        subject: &SubjectId,
        algorithm: ForecastAlgorithm,
        series: &MetricSeries,
        horizon: usize,
    ) -> AnalyticsResult<Forecast> {
        let metric = series.metric();
        let model =
            self.model(subject, algorithm, metric)
                .ok_or_else(|| AnalyticsError::ModelNotTrained {
                    subject: subject.clone(),
                    algorithm,
                    metric: metric.clone(),
                })?;

        let recent: Vec<f64> = series
            .tail(self.config.training_window)
            .iter()
            .map(|s| s.value)
            .filter(|v| v.is_finite())
            .collect();
        if recent.is_empty() {
            return Err(AnalyticsError::InsufficientData {
                metric: metric.clone(),
                required: 1,
                actual: 0,
            });
        }

        let forecast = Forecast {
            subject: subject.clone(),
            metric: metric.clone(),
            algorithm,
            horizon,
            predicted_values: model.predict(&recent, series.len(), horizon),
            confidence: model.confidence(horizon),
            accuracy: model.accuracy,
            stale: model.is_stale(series.len()),
            generated_at: Utc::now(),
        };
        self.record(forecast.clone());
        Ok(forecast)
    }

    fn record(&self, forecast: Forecast) {
        let mut log = self.predictions.write();
        log.push_back(forecast);
        while log.len() > self.config.max_prediction_log {
            log.pop_front();
        }
    }

    /// Logged forecasts, oldest first.
    pub fn prediction_log(&self) -> Vec<Forecast> {
        self.predictions.read().iter().cloned().collect()
    }

    pub fn clear_predictions(&self) {
        self.predictions.write().clear();
    }

    pub fn prediction_report(&self) -> PredictionReport {
        let log = self.predictions.read();

        let mut by_metric: BTreeMap<Metric, Vec<&Forecast>> = BTreeMap::new();
        let mut algorithms = BTreeSet::new();
        for forecast in log.iter() {
            by_metric
                .entry(forecast.metric.clone())
                .or_default()
                .push(forecast);
            algorithms.insert(forecast.algorithm);
        }

        let per_metric = by_metric
            .iter()
            .filter_map(|(metric, forecasts)| {
                let latest = forecasts.last()?;
                let count = forecasts.len() as f64;
                let confidences = forecasts.iter().map(|f| f.confidence);
                Some((
                    metric.clone(),
                    MetricPredictionSummary {
                        predictions: forecasts.len(),
                        mean_accuracy: forecasts.iter().map(|f| f.accuracy).sum::<f64>() / count,
                        mean_confidence: confidences.clone().sum::<f64>() / count,
                        min_confidence: confidences.clone().fold(f64::INFINITY, f64::min),
                        max_confidence: confidences.fold(f64::NEG_INFINITY, f64::max),
                        direction: latest.direction(),
                        range: latest.range(),
                        latest_confidence: latest.confidence,
                    },
                ))
            })
            .collect();

        let overall_accuracy = if log.is_empty() {
            0.0
        } else {
            log.iter().map(|f| f.accuracy).sum::<f64>() / log.len() as f64
        };

        PredictionReport {
            generated_at: Utc::now(),
            total_predictions: log.len(),
            metrics: by_metric.keys().cloned().collect(),
            algorithms: algorithms.into_iter().collect(),
            overall_accuracy,
            per_metric,
        }
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Write every model to `store`. Returns how many were saved.
    pub fn save_models(&self, store: &dyn ModelStore) -> AnalyticsResult<usize> {
        let mut models: Vec<ForecastModel> = self
            .models
            .read()
            .values()
            .map(|m| ForecastModel::clone(m))
            .collect();
        models.sort_by(|a, b| ModelKey::of(a).cmp(&ModelKey::of(b)));
        store.save(&models)?;
        Ok(models.len())
    }

    /// Install every model found in `store`, replacing entries with the same
    /// key. Returns how many were loaded.
    pub fn load_models(&self, store: &dyn ModelStore) -> AnalyticsResult<usize> {
        let loaded = store.load()?;
        let count = loaded.len();
        let mut models = self.models.write();
        for model in loaded {
            models.insert(ModelKey::of(&model), Arc::new(model));
        }
        Ok(count)
    }
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}
