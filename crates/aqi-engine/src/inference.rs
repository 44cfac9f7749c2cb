//! Inference over the persisted artifact trio
//!
//! [`AqiPredictor`] evaluates either model on a validated feature vector and
//! clamps the result onto the AQI scale. [`LazyPredictor`] loads artifacts on
//! first use, exactly once, and hands every caller the same read-only
//! instance afterwards.

use crate::artifacts::{self, LoadedArtifacts, Manifest, DEFAULT_ARTIFACT_DIR};
use crate::error::{EngineError, Result};
use crate::linear::LinearModel;
use crate::models::{clamp_aqi, DualPrediction, FeatureVector};
use crate::observability::EngineMetrics;
use crate::scaler::StandardScaler;
use crate::trainer::TrainedModels;
use crate::tree::RegressionTree;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;
use tracing::{debug, warn};

/// Environment variable naming the artifact directory for [`global_predictor`]
pub const ARTIFACT_DIR_ENV: &str = "AQI_ARTIFACT_DIR";

/// Which trained model produces a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// Ordinary least squares on standardized features
    Linear,
    /// Regression tree on raw features
    Tree,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 2] = [ModelVariant::Linear, ModelVariant::Tree];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Linear => "linear",
            ModelVariant::Tree => "tree",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariant {
    type Err = EngineError;

    /// Accepts the variant names plus the short forms `lr` and `dt`
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "lr" | "linear_regression" => Ok(ModelVariant::Linear),
            "tree" | "dt" | "decision_tree" => Ok(ModelVariant::Tree),
            _ => Err(EngineError::InvalidModelVariant(s.to_string())),
        }
    }
}

/// Read-only holder of one consistent artifact trio
#[derive(Debug, Clone)]
pub struct AqiPredictor {
    scaler: StandardScaler,
    linear: LinearModel,
    tree: RegressionTree,
    manifest: Option<Manifest>,
    metrics: Option<EngineMetrics>,
}

impl AqiPredictor {
    /// Load and verify the artifacts in `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self::from_artifacts(artifacts::load(dir)?))
    }

    pub fn from_artifacts(loaded: LoadedArtifacts) -> Self {
        Self {
            scaler: loaded.scaler,
            linear: loaded.linear,
            tree: loaded.tree,
            manifest: Some(loaded.manifest),
            metrics: None,
        }
    }

    /// Serve freshly trained models without going through disk
    pub fn from_trained(models: &TrainedModels) -> Self {
        Self {
            scaler: models.scaler.clone(),
            linear: models.linear.clone(),
            tree: models.tree.clone(),
            manifest: None,
            metrics: None,
        }
    }

    /// Report prediction counts and latency to Prometheus
    pub fn with_metrics(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub fn training_id(&self) -> Option<&str> {
        self.manifest.as_ref().map(|m| m.training_id.as_str())
    }

    /// Model output before clamping
    pub fn raw_predict(&self, features: &FeatureVector, variant: ModelVariant) -> f64 {
        let x = features.to_array();
        match variant {
            ModelVariant::Linear => self.linear.predict(&self.scaler.transform(&x)),
            ModelVariant::Tree => self.tree.predict(&x),
        }
    }

    /// AQI estimate in [0, 500]
    pub fn predict(&self, features: &FeatureVector, variant: ModelVariant) -> f64 {
        let start = Instant::now();
        let aqi = clamp_aqi(self.raw_predict(features, variant));
        if let Some(metrics) = &self.metrics {
            metrics.observe_prediction(variant.as_str(), start.elapsed().as_secs_f64());
        }
        aqi
    }

    /// Like [`predict`](Self::predict) with the variant given by name
    pub fn predict_named(&self, features: &FeatureVector, variant: &str) -> Result<f64> {
        let variant = variant.parse::<ModelVariant>().inspect_err(|_| {
            if let Some(metrics) = &self.metrics {
                metrics.inc_prediction_errors();
            }
        })?;
        Ok(self.predict(features, variant))
    }

    /// Both models' estimates, their bands and their disagreement
    pub fn predict_both(&self, features: &FeatureVector) -> DualPrediction {
        DualPrediction::new(
            self.predict(features, ModelVariant::Linear),
            self.predict(features, ModelVariant::Tree),
        )
    }
}

type Loader = Box<dyn Fn() -> Result<AqiPredictor> + Send + Sync>;

/// Shared, lazily-initialized, read-only predictor.
///
/// The first call to [`get`](Self::get) runs the loader while holding the
/// init lock; concurrent first callers wait on that lock and then observe the
/// loaded instance. A failed load is reported to its caller and not cached,
/// so a later call retries once artifacts exist.
pub struct LazyPredictor {
    loader: Loader,
    loaded: OnceLock<Arc<AqiPredictor>>,
    init_lock: Mutex<()>,
}

impl LazyPredictor {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<AqiPredictor> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            loaded: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Predictor backed by the artifacts in `dir`, with metrics enabled
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self::new(move || {
            let metrics = EngineMetrics::new();
            match AqiPredictor::load(&dir) {
                Ok(predictor) => {
                    metrics.record_model_load(predictor.manifest());
                    Ok(predictor.with_metrics(metrics))
                }
                Err(e) => {
                    metrics.inc_model_load_failures();
                    Err(e)
                }
            }
        })
    }

    pub fn get(&self) -> Result<Arc<AqiPredictor>> {
        if let Some(predictor) = self.loaded.get() {
            return Ok(Arc::clone(predictor));
        }

        // The guarded value is `()`, so a poisoned lock carries no broken state.
        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(predictor) = self.loaded.get() {
            return Ok(Arc::clone(predictor));
        }

        let predictor = Arc::new((self.loader)().inspect_err(|e| {
            warn!(error = %e, "Failed to load model artifacts");
        })?);
        debug!(training_id = ?predictor.training_id(), "Predictor initialized");
        Ok(Arc::clone(self.loaded.get_or_init(|| predictor)))
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }
}

static GLOBAL_PREDICTOR: OnceLock<LazyPredictor> = OnceLock::new();

/// Process-wide predictor reading artifacts from `AQI_ARTIFACT_DIR`
/// (default `ml_models/models`)
pub fn global_predictor() -> &'static LazyPredictor {
    GLOBAL_PREDICTOR.get_or_init(|| {
        let dir = std::env::var(ARTIFACT_DIR_ENV)
            .unwrap_or_else(|_| DEFAULT_ARTIFACT_DIR.to_string());
        LazyPredictor::from_dir(dir)
    })
}

/// Predict with both models using the process-wide predictor
pub fn predict_both(features: &FeatureVector) -> Result<DualPrediction> {
    Ok(global_predictor().get()?.predict_both(features))
}
