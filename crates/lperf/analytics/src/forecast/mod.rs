//! Short-horizon forecasting.
//!
//! Training data is validated and summarized per metric ([`features`]),
//! fitted per algorithm ([`model`]) and served from a keyed registry
//! ([`engine`]) that can be saved through a [`ModelStore`].

pub mod engine;
pub mod features;
pub mod model;
pub mod persistence;

pub use engine::{
    ForecastEngine, MetricPredictionSummary, ModelKey, PredictionReport, RejectedMetric,
    TrainedMetric, TrainingSet, TrainingSummary,
};
pub use features::{FeatureVector, TrainingSeries};
pub use model::{confidence, ForecastModel, ModelParams};
pub use persistence::{InMemoryModelStore, JsonFileModelStore, ModelStore};
