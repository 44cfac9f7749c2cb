//! Error types for the estimation engine

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by training, persistence and inference
#[derive(Debug, Error)]
pub enum EngineError {
    /// A training feature column has zero variance and cannot be standardized
    #[error("feature '{feature}' has zero variance; cannot standardize")]
    DegenerateFeature { feature: String },

    /// Persisted artifacts are missing, corrupt or inconsistent with each other
    #[error("model artifact '{artifact}' unavailable: {reason}")]
    ModelsUnavailable { artifact: String, reason: String },

    /// Caller asked for a model that does not exist
    #[error("unknown model variant '{0}' (expected 'linear' or 'tree')")]
    InvalidModelVariant(String),

    /// Feature vector has the wrong arity or an out-of-domain value
    #[error("invalid feature vector: {0}")]
    InvalidFeatureVector(String),

    /// Model fitting could not complete
    #[error("training failed: {0}")]
    TrainingFailed(String),

    /// A trained model did not satisfy the configured accuracy policy
    #[error("{variant} model rejected by accuracy policy: {reason}")]
    AccuracyGate { variant: String, reason: String },

    /// Dataset file could not be parsed
    #[error("dataset error in {path}: {reason}")]
    Dataset { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unavailable(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelsUnavailable {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by caller input rather than engine state
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidModelVariant(_) | EngineError::InvalidFeatureVector(_)
        )
    }
}
