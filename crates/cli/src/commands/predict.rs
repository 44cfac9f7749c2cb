//! Prediction and categorization commands

use anyhow::{Context, Result};
use aqi_engine::{AqiCategory, AqiPredictor, FeatureVector, ModelVariant, Prediction};
use clap::Args;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    color_category, format_aqi, print_info, print_json, print_table, print_warning, OutputFormat,
};
use crate::ModelChoice;

/// Disagreement above which the two models are flagged
const DISAGREEMENT_WARNING: f64 = 50.0;

/// One set of measurements given on the command line
#[derive(Debug, Clone, Args)]
pub struct Reading {
    /// PM2.5 concentration (µg/m³)
    #[arg(long)]
    pub pm25: f64,
    /// PM10 concentration (µg/m³)
    #[arg(long)]
    pub pm10: f64,
    /// NO2 concentration (ppb)
    #[arg(long)]
    pub no2: f64,
    /// SO2 concentration (ppb)
    #[arg(long)]
    pub so2: f64,
    /// CO concentration (ppm)
    #[arg(long)]
    pub co: f64,
    /// O3 concentration (ppb)
    #[arg(long)]
    pub o3: f64,
    /// Temperature (°C)
    #[arg(long, allow_hyphen_values = true)]
    pub temperature: f64,
    /// Relative humidity (%)
    #[arg(long)]
    pub humidity: f64,
}

impl Reading {
    fn to_features(&self) -> Result<FeatureVector> {
        Ok(FeatureVector::new(
            self.pm25,
            self.pm10,
            self.no2,
            self.so2,
            self.co,
            self.o3,
            self.temperature,
            self.humidity,
        )?)
    }
}

/// Row for the predictions table
#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "AQI")]
    aqi: String,
    #[tabled(rename = "Category")]
    category: String,
}

impl PredictionRow {
    fn new(variant: ModelVariant, prediction: &Prediction) -> Self {
        Self {
            model: variant_label(variant).to_string(),
            aqi: format_aqi(prediction.aqi),
            category: color_category(prediction.category),
        }
    }
}

#[derive(Serialize)]
struct PredictOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    training_id: Option<String>,
    predictions: Vec<VariantPrediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    difference: Option<f64>,
}

#[derive(Serialize)]
struct VariantPrediction {
    model: ModelVariant,
    aqi: f64,
    category: AqiCategory,
}

fn variant_label(variant: ModelVariant) -> &'static str {
    match variant {
        ModelVariant::Linear => "Linear Regression",
        ModelVariant::Tree => "Decision Tree",
    }
}

fn selected_variants(choice: ModelChoice) -> &'static [ModelVariant] {
    match choice {
        ModelChoice::Linear => &[ModelVariant::Linear],
        ModelChoice::Tree => &[ModelVariant::Tree],
        ModelChoice::Both => &ModelVariant::ALL,
    }
}

/// Load the artifacts in `artifact_dir` and predict for one reading
pub fn predict(
    reading: &Reading,
    choice: ModelChoice,
    artifact_dir: &Path,
    format: OutputFormat,
) -> Result<()> {
    let features = reading.to_features()?;
    let predictor = AqiPredictor::load(artifact_dir).with_context(|| {
        format!(
            "No usable models in {}; run `aqi train` first",
            artifact_dir.display()
        )
    })?;

    let results: Vec<(ModelVariant, Prediction)> = selected_variants(choice)
        .iter()
        .map(|&v| (v, Prediction::new(predictor.predict(&features, v))))
        .collect();
    let difference = match results.as_slice() {
        [(_, a), (_, b)] => Some((a.aqi - b.aqi).abs()),
        _ => None,
    };

    match format {
        OutputFormat::Json => print_json(&PredictOutput {
            training_id: predictor.training_id().map(str::to_string),
            predictions: results
                .iter()
                .map(|(model, p)| VariantPrediction {
                    model: *model,
                    aqi: p.aqi,
                    category: p.category,
                })
                .collect(),
            difference,
        })?,
        OutputFormat::Table => {
            if let Some(manifest) = predictor.manifest() {
                print_info(&format!(
                    "Models from training run {} ({})",
                    manifest.training_id,
                    manifest.created_at.format("%Y-%m-%d %H:%M:%S UTC")
                ));
            }
            let rows: Vec<PredictionRow> = results
                .iter()
                .map(|(v, p)| PredictionRow::new(*v, p))
                .collect();
            print_table(&rows);
            if let Some(difference) = difference {
                println!("Difference: {}", format_aqi(difference));
                if difference > DISAGREEMENT_WARNING {
                    print_warning("The two models disagree strongly for this reading");
                }
            }
        }
    }

    Ok(())
}

/// Print the band an AQI value falls into
pub fn categorize(value: f64, format: OutputFormat) -> Result<()> {
    let category = AqiCategory::categorize(value);
    match format {
        OutputFormat::Json => print_json(&category)?,
        OutputFormat::Table => {
            println!(
                "AQI {} is {} (level {} of 6)",
                format_aqi(value),
                color_category(category),
                category.rank()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_variants() {
        assert_eq!(selected_variants(ModelChoice::Linear), &[ModelVariant::Linear]);
        assert_eq!(selected_variants(ModelChoice::Both).len(), 2);
    }

    #[test]
    fn test_reading_validation() {
        let mut reading = Reading {
            pm25: 50.0,
            pm10: 70.0,
            no2: 40.0,
            so2: 20.0,
            co: 1.2,
            o3: 45.0,
            temperature: -5.0,
            humidity: 65.0,
        };
        assert!(reading.to_features().is_ok());
        reading.humidity = 140.0;
        assert!(reading.to_features().is_err());
    }
}
