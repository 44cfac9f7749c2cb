//! AQI estimation engine
//!
//! This crate provides the core functionality for:
//! - Synthetic dataset generation and CSV persistence
//! - Feature standardization, linear and regression-tree models
//! - Training with held-out evaluation and atomic artifact persistence
//! - Lazily-initialized, shared inference and AQI categorization
//! - Prediction history and observability

pub mod artifacts;
pub mod category;
pub mod dataset;
pub mod error;
pub mod history;
pub mod inference;
pub mod linear;
pub mod models;
pub mod observability;
pub mod scaler;
pub mod synth;
pub mod trainer;
pub mod tree;

pub use category::AqiCategory;
pub use error::{EngineError, Result};
pub use history::{InMemoryHistory, Page, PredictionHistory, PredictionRecord};
pub use inference::{global_predictor, predict_both, AqiPredictor, LazyPredictor, ModelVariant};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use trainer::{AccuracyPolicy, ModelMetrics, Trainer, TrainerConfig, TrainingReport};
