//! Offline training of the linear and tree models
//!
//! The dataset is split into train and test partitions once. The scaler and
//! both models only ever see the train partition; the test partition is used
//! for evaluation and nothing else.

use crate::error::{EngineError, Result};
use crate::linear::LinearModel;
use crate::models::Dataset;
use crate::scaler::StandardScaler;
use crate::tree::{RegressionTree, TreeConfig};
use crate::ModelVariant;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default share of rows held out for evaluation
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Default seed for the train/test shuffle
pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Optional quality bar a model must clear before it may be persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyPolicy {
    /// Reject a model whose test MAE is above this value
    pub max_mae: Option<f64>,
    /// Reject a model whose test R² is below this value
    pub min_r2: Option<f64>,
}

impl AccuracyPolicy {
    fn check(&self, variant: ModelVariant, metrics: &ModelMetrics) -> Result<()> {
        if let Some(max_mae) = self.max_mae {
            if !(metrics.mae <= max_mae) {
                return Err(EngineError::AccuracyGate {
                    variant: variant.to_string(),
                    reason: format!("MAE {:.3} exceeds {:.3}", metrics.mae, max_mae),
                });
            }
        }
        if let Some(min_r2) = self.min_r2 {
            if !(metrics.r2 >= min_r2) {
                return Err(EngineError::AccuracyGate {
                    variant: variant.to_string(),
                    reason: format!("R² {:.3} below {:.3}", metrics.r2, min_r2),
                });
            }
        }
        Ok(())
    }
}

/// Training configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Fraction of rows placed in the test partition, in (0, 1)
    pub test_fraction: f64,
    pub split_seed: u64,
    pub tree: TreeConfig,
    pub policy: AccuracyPolicy,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
            split_seed: DEFAULT_SPLIT_SEED,
            tree: TreeConfig::default(),
            policy: AccuracyPolicy::default(),
        }
    }
}

/// Out-of-sample accuracy of one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mae: f64,
    pub r2: f64,
}

impl ModelMetrics {
    pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Self {
        Self {
            mae: mean_absolute_error(y_true, y_pred),
            r2: r2_score(y_true, y_pred),
        }
    }
}

/// Summary of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub train_rows: usize,
    pub test_rows: usize,
    pub linear: ModelMetrics,
    pub tree: ModelMetrics,
    pub tree_depth: usize,
    pub tree_leaves: usize,
}

/// The fitted artifact trio plus its evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModels {
    pub scaler: StandardScaler,
    pub linear: LinearModel,
    pub tree: RegressionTree,
    pub report: TrainingReport,
}

/// Mean absolute error; 0 for empty input
pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

/// Coefficient of determination.
///
/// With a constant target, a perfect prediction scores 1 and anything else 0.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Shuffle row indices with `seed` and split them into (train, test).
///
/// The test partition holds `ceil(len * test_fraction)` rows.
pub fn train_test_split(
    dataset: &Dataset,
    test_fraction: f64,
    seed: u64,
) -> Result<(Dataset, Dataset)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(EngineError::TrainingFailed(format!(
            "test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }
    let n = dataset.len();
    let test_rows = (n as f64 * test_fraction).ceil() as usize;
    if test_rows == 0 || test_rows >= n {
        return Err(EngineError::TrainingFailed(format!(
            "{} rows cannot be split with test fraction {}",
            n, test_fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(test_rows);
    Ok((dataset.select(train_idx), dataset.select(test_idx)))
}

/// Fits and evaluates both models
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Split `dataset`, then fit and evaluate on the partitions
    pub fn train(&self, dataset: &Dataset) -> Result<TrainedModels> {
        let (train, test) =
            train_test_split(dataset, self.config.test_fraction, self.config.split_seed)?;
        debug!(
            train_rows = train.len(),
            test_rows = test.len(),
            "Partitioned dataset"
        );
        self.fit_partitions(&train, &test)
    }

    /// Fit on `train` only and evaluate on `test`.
    ///
    /// Fitted parameters depend on `train` alone, so swapping `test` for any
    /// other partition leaves the scaler and both models unchanged.
    pub fn fit_partitions(&self, train: &Dataset, test: &Dataset) -> Result<TrainedModels> {
        if test.is_empty() {
            return Err(EngineError::TrainingFailed(
                "test partition is empty".to_string(),
            ));
        }

        let scaler = StandardScaler::fit(train)?;
        let linear = LinearModel::fit(&scaler.transform_all(train.features()), train.labels())?;
        let tree = RegressionTree::fit(train.features(), train.labels(), self.config.tree)?;

        let linear_pred: Vec<f64> = test
            .features()
            .iter()
            .map(|row| linear.predict(&scaler.transform(row)))
            .collect();
        let tree_pred: Vec<f64> = test.features().iter().map(|row| tree.predict(row)).collect();

        let report = TrainingReport {
            train_rows: train.len(),
            test_rows: test.len(),
            linear: ModelMetrics::evaluate(test.labels(), &linear_pred),
            tree: ModelMetrics::evaluate(test.labels(), &tree_pred),
            tree_depth: tree.depth(),
            tree_leaves: tree.leaf_count(),
        };

        info!(
            linear_mae = report.linear.mae,
            linear_r2 = report.linear.r2,
            tree_mae = report.tree.mae,
            tree_r2 = report.tree.r2,
            tree_depth = report.tree_depth,
            "Models evaluated on held-out partition"
        );

        self.config.policy.check(ModelVariant::Linear, &report.linear)?;
        self.config.policy.check(ModelVariant::Tree, &report.tree)?;

        Ok(TrainedModels {
            scaler,
            linear,
            tree,
            report,
        })
    }
}
