//! AQI Estimation CLI
//!
//! A command-line tool for synthesizing training data, training the two
//! AQI models, and running predictions against the persisted artifacts.

mod commands;
mod output;

use anyhow::Result;
use aqi_engine::{artifacts, dataset, synth, tree};
use clap::{Parser, Subcommand, ValueEnum};
use commands::{generate, predict, train};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// AQI Estimation CLI
#[derive(Parser)]
#[command(name = "aqi")]
#[command(author, version, about = "CLI for the AQI Estimation Engine", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize a training dataset and write it as CSV
    Generate {
        /// Number of samples
        #[arg(long, default_value_t = synth::DEFAULT_SAMPLES)]
        rows: usize,

        /// Random seed
        #[arg(long, default_value_t = synth::DEFAULT_SEED)]
        seed: u64,

        /// Output CSV path
        #[arg(long, short, env = "AQI_DATASET_PATH", default_value = dataset::DEFAULT_DATASET_PATH)]
        output: PathBuf,
    },

    /// Train both models and persist the artifacts
    Train {
        /// Dataset CSV; synthesized and saved here if missing
        #[arg(long, env = "AQI_DATASET_PATH", default_value = dataset::DEFAULT_DATASET_PATH)]
        dataset: PathBuf,

        /// Directory receiving the model artifacts
        #[arg(long, env = "AQI_ARTIFACT_DIR", default_value = artifacts::DEFAULT_ARTIFACT_DIR)]
        artifact_dir: PathBuf,

        /// Samples to synthesize when the dataset is missing
        #[arg(long, default_value_t = synth::DEFAULT_SAMPLES)]
        rows: usize,

        /// Seed for synthesis when the dataset is missing
        #[arg(long, default_value_t = synth::DEFAULT_SEED)]
        seed: u64,

        /// Maximum depth of the regression tree
        #[arg(long, default_value_t = tree::DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Refuse to persist if either model's test MAE exceeds this
        #[arg(long)]
        max_mae: Option<f64>,

        /// Refuse to persist if either model's test R² is below this
        #[arg(long, allow_hyphen_values = true)]
        min_r2: Option<f64>,
    },

    /// Predict the AQI for one set of measurements
    Predict {
        #[command(flatten)]
        reading: predict::Reading,

        /// Which model to use
        #[arg(long, short, value_enum, default_value = "both")]
        model: ModelChoice,

        /// Directory holding the model artifacts
        #[arg(long, env = "AQI_ARTIFACT_DIR", default_value = artifacts::DEFAULT_ARTIFACT_DIR)]
        artifact_dir: PathBuf,
    },

    /// Show the AQI band for a value
    Categorize {
        /// AQI value
        #[arg(allow_hyphen_values = true)]
        value: f64,
    },
}

/// Model selection for `predict`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelChoice {
    Linear,
    Tree,
    Both,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli) {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Generate { rows, seed, output } => {
            generate::generate(rows, seed, &output, cli.format)?;
        }
        Commands::Train {
            dataset,
            artifact_dir,
            rows,
            seed,
            max_depth,
            max_mae,
            min_r2,
        } => {
            let options = train::TrainOptions {
                dataset,
                artifact_dir,
                rows,
                seed,
                max_depth,
                max_mae,
                min_r2,
            };
            train::train(&options, cli.format)?;
        }
        Commands::Predict {
            reading,
            model,
            artifact_dir,
        } => {
            predict::predict(&reading, model, &artifact_dir, cli.format)?;
        }
        Commands::Categorize { value } => {
            predict::categorize(value, cli.format)?;
        }
    }

    Ok(())
}
