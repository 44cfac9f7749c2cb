//! Training command

use anyhow::{Context, Result};
use aqi_engine::{
    artifacts, dataset, tree::TreeConfig, AccuracyPolicy, ModelMetrics, StructuredLogger, Trainer,
    TrainerConfig,
};
use colored::Colorize;
use std::path::PathBuf;
use tabled::Tabled;

use crate::output::{color_r2, print_info, print_json, print_success, print_table, OutputFormat};

/// Options for a training run
#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub dataset: PathBuf,
    pub artifact_dir: PathBuf,
    pub rows: usize,
    pub seed: u64,
    pub max_depth: usize,
    pub max_mae: Option<f64>,
    pub min_r2: Option<f64>,
}

/// Row for the evaluation table
#[derive(Tabled)]
struct MetricsRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "MAE")]
    mae: String,
    #[tabled(rename = "R²")]
    r2: String,
}

impl MetricsRow {
    fn new(model: &str, metrics: &ModelMetrics) -> Self {
        Self {
            model: model.to_string(),
            mae: format!("{:.3}", metrics.mae),
            r2: color_r2(metrics.r2),
        }
    }
}

/// Load or synthesize the dataset, train both models and persist them
pub fn train(options: &TrainOptions, format: OutputFormat) -> Result<()> {
    let logger = StructuredLogger::new("aqi-cli");

    let ds = dataset::load_or_generate(&options.dataset, options.rows, options.seed)
        .with_context(|| format!("Failed to prepare dataset {}", options.dataset.display()))?;

    let trainer = Trainer::new(TrainerConfig {
        tree: TreeConfig {
            max_depth: options.max_depth,
            ..TreeConfig::default()
        },
        policy: AccuracyPolicy {
            max_mae: options.max_mae,
            min_r2: options.min_r2,
        },
        ..TrainerConfig::default()
    });

    let models = trainer.train(&ds).inspect_err(|e| {
        logger.log_training_failed(&e.to_string());
    })?;
    let manifest = artifacts::save(&options.artifact_dir, &models).with_context(|| {
        format!(
            "Failed to persist artifacts to {}",
            options.artifact_dir.display()
        )
    })?;
    logger.log_training_complete(&manifest.report, &manifest.training_id);

    match format {
        OutputFormat::Json => print_json(&manifest)?,
        OutputFormat::Table => {
            let report = &manifest.report;
            print_info(&format!(
                "Trained on {} rows, evaluated on {} held-out rows",
                report.train_rows, report.test_rows
            ));
            print_table(&[
                MetricsRow::new("Linear Regression", &report.linear),
                MetricsRow::new("Decision Tree", &report.tree),
            ]);
            println!(
                "Tree: depth {}, {} leaves",
                report.tree_depth, report.tree_leaves
            );
            print_success(&format!(
                "Saved training run {} to {}",
                manifest.training_id.cyan(),
                options.artifact_dir.display()
            ));
        }
    }

    Ok(())
}
