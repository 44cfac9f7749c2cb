//! Observability infrastructure for the estimation engine
//!
//! Provides:
//! - Prometheus metrics (prediction latency, prediction counts, model loads, training accuracy)
//! - Structured logging of engine events with tracing

use crate::artifacts::Manifest;
use crate::models::{DualPrediction, FeatureVector};
use crate::trainer::TrainingReport;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for prediction latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions: IntCounterVec,
    prediction_errors: IntCounter,
    model_loads: IntCounter,
    model_load_failures: IntCounter,
    model_info: GaugeVec,
    training_mae: GaugeVec,
    training_r2: GaugeVec,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "aqi_prediction_latency_seconds",
                "Time spent evaluating a single model",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions: register_int_counter_vec!(
                "aqi_predictions_total",
                "Predictions served, by model variant",
                &["variant"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors: register_int_counter!(
                "aqi_prediction_errors_total",
                "Prediction requests rejected with an error"
            )
            .expect("Failed to register prediction_errors_total"),

            model_loads: register_int_counter!(
                "aqi_model_loads_total",
                "Successful loads of the model artifact set"
            )
            .expect("Failed to register model_loads_total"),

            model_load_failures: register_int_counter!(
                "aqi_model_load_failures_total",
                "Failed attempts to load the model artifact set"
            )
            .expect("Failed to register model_load_failures_total"),

            model_info: register_gauge_vec!(
                "aqi_model_info",
                "Information about the currently loaded artifact set",
                &["training_id"]
            )
            .expect("Failed to register model_info"),

            training_mae: register_gauge_vec!(
                "aqi_training_mae",
                "Held-out mean absolute error recorded at training time",
                &["variant"]
            )
            .expect("Failed to register training_mae"),

            training_r2: register_gauge_vec!(
                "aqi_training_r2",
                "Held-out coefficient of determination recorded at training time",
                &["variant"]
            )
            .expect("Failed to register training_r2"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Debug, Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn observe_prediction(&self, variant: &str, duration_secs: f64) {
        let inner = self.inner();
        inner.prediction_latency_seconds.observe(duration_secs);
        inner.predictions.with_label_values(&[variant]).inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors.inc();
    }

    pub fn inc_model_load_failures(&self) {
        self.inner().model_load_failures.inc();
    }

    /// Record a successful load and publish the manifest's training figures
    pub fn record_model_load(&self, manifest: Option<&Manifest>) {
        let inner = self.inner();
        inner.model_loads.inc();
        inner.model_info.reset();

        let Some(manifest) = manifest else {
            inner.model_info.with_label_values(&["untracked"]).set(1.0);
            return;
        };
        inner
            .model_info
            .with_label_values(&[manifest.training_id.as_str()])
            .set(1.0);
        for (variant, metrics) in [
            ("linear", &manifest.report.linear),
            ("tree", &manifest.report.tree),
        ] {
            inner.training_mae.with_label_values(&[variant]).set(metrics.mae);
            inner.training_r2.with_label_values(&[variant]).set(metrics.r2);
        }
    }

    pub fn predictions_served(&self, variant: &str) -> u64 {
        self.inner().predictions.with_label_values(&[variant]).get()
    }
}

/// Structured logger for engine events
///
/// Provides consistent, field-based logging for training runs, model
/// loading and predictions.
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Log the evaluation of a finished training run
    pub fn log_training_complete(&self, report: &TrainingReport, training_id: &str) {
        info!(
            event = "training_completed",
            component = %self.component,
            training_id = %training_id,
            train_rows = report.train_rows,
            test_rows = report.test_rows,
            linear_mae = report.linear.mae,
            linear_r2 = report.linear.r2,
            tree_mae = report.tree.mae,
            tree_r2 = report.tree.r2,
            tree_depth = report.tree_depth,
            tree_leaves = report.tree_leaves,
            "Training run completed"
        );
    }

    /// Log a training run that did not produce artifacts
    pub fn log_training_failed(&self, reason: &str) {
        error!(
            event = "training_failed",
            component = %self.component,
            reason = %reason,
            "Training run failed, artifacts left untouched"
        );
    }

    /// Log a served dual prediction
    pub fn log_prediction(&self, features: &FeatureVector, prediction: &DualPrediction) {
        info!(
            event = "prediction_served",
            component = %self.component,
            pm25 = features.pm25(),
            pm10 = features.pm10(),
            linear_aqi = prediction.linear.aqi,
            linear_category = %prediction.linear.category.id(),
            tree_aqi = prediction.tree.aqi,
            tree_category = %prediction.tree.category.id(),
            difference = prediction.difference,
            "Served AQI prediction"
        );
    }

    /// Log a model artifact load attempt
    pub fn log_model_load(&self, training_id: Option<&str>, error: Option<&str>) {
        match error {
            None => info!(
                event = "models_loaded",
                component = %self.component,
                training_id = ?training_id,
                "Model artifacts loaded"
            ),
            Some(error) => warn!(
                event = "models_unavailable",
                component = %self.component,
                error = %error,
                "Model artifacts unavailable"
            ),
        }
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "started",
            component = %self.component,
            version = %version,
            "AQI estimation service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "shutdown",
            component = %self.component,
            reason = %reason,
            "AQI estimation service shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_metrics_creation() {
        let metrics = EngineMetrics::new();
        let before = metrics.predictions_served("metrics-test");
        metrics.observe_prediction("metrics-test", 0.0001);
        metrics.inc_prediction_errors();
        metrics.inc_model_load_failures();
        metrics.record_model_load(None);
        assert_eq!(metrics.predictions_served("metrics-test"), before + 1);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-engine");
        assert_eq!(logger.component(), "test-engine");
    }
}
