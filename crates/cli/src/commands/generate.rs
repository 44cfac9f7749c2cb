//! Dataset synthesis command

use anyhow::{Context, Result};
use aqi_engine::{dataset, synth, Dataset, FEATURE_NAMES, LABEL_NAME};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::output::{print_json, print_success, print_table, OutputFormat};

/// Row for the column summary table
#[derive(Tabled)]
struct ColumnRow {
    #[tabled(rename = "Column")]
    column: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
}

#[derive(Serialize)]
struct GenerateSummary<'a> {
    path: &'a Path,
    rows: usize,
    seed: u64,
}

fn summarize(name: &str, values: &[f64]) -> ColumnRow {
    let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    ColumnRow {
        column: name.to_string(),
        mean: format!("{:.2}", mean),
        min: format!("{:.2}", min),
        max: format!("{:.2}", max),
    }
}

fn column_summary(ds: &Dataset) -> Vec<ColumnRow> {
    let mut rows: Vec<ColumnRow> = FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| summarize(name, &ds.column(i)))
        .collect();
    rows.push(summarize(LABEL_NAME, ds.labels()));
    rows
}

/// Synthesize `rows` samples and write them to `output`
pub fn generate(rows: usize, seed: u64, output: &Path, format: OutputFormat) -> Result<()> {
    let ds = synth::generate(rows, seed).context("Failed to synthesize dataset")?;
    dataset::save_csv(&ds, output)
        .with_context(|| format!("Failed to write dataset to {}", output.display()))?;

    match format {
        OutputFormat::Json => print_json(&GenerateSummary {
            path: output,
            rows: ds.len(),
            seed,
        })?,
        OutputFormat::Table => {
            print_success(&format!(
                "Wrote {} samples (seed {}) to {}",
                ds.len(),
                seed,
                output.display()
            ));
            print_table(&column_summary(&ds));
        }
    }

    Ok(())
}
