//! Model persistence across restarts.
//!
//! [`JsonFileModelStore`] keeps every model in a single JSON file and writes
//! atomically (write to `.tmp`, then rename).

use super::model::ForecastModel;
use crate::error::{AnalyticsError, AnalyticsResult};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Storage backend for trained models.
pub trait ModelStore: Send + Sync {
    /// Replace the stored models with `models`.
    fn save(&self, models: &[ForecastModel]) -> AnalyticsResult<()>;

    /// Stored models; empty if nothing was saved yet.
    fn load(&self) -> AnalyticsResult<Vec<ForecastModel>>;
}

pub struct JsonFileModelStore {
    path: PathBuf,
}

impl JsonFileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModelStore for JsonFileModelStore {
    fn save(&self, models: &[ForecastModel]) -> AnalyticsResult<()> {
        let json = serde_json::to_string_pretty(models)
            .map_err(|e| AnalyticsError::Persistence(format!("serialization failed: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn load(&self) -> AnalyticsResult<Vec<ForecastModel>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents)
            .map_err(|e| AnalyticsError::Persistence(format!("deserialization failed: {}", e)))
    }
}

/// In-memory store, for tests and embedding hosts without a filesystem.
#[derive(Default)]
pub struct InMemoryModelStore {
    models: Mutex<Vec<ForecastModel>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.models.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.lock().is_empty()
    }
}

impl ModelStore for InMemoryModelStore {
    fn save(&self, models: &[ForecastModel]) -> AnalyticsResult<()> {
        *self.models.lock() = models.to_vec();
        Ok(())
    }

    fn load(&self) -> AnalyticsResult<Vec<ForecastModel>> {
        Ok(self.models.lock().clone())
    }
}
