//! Synthetic training data
//!
//! Produces a labeled table when no measured dataset is available. Each
//! feature column is drawn from its own normal distribution, clipped to the
//! physically valid range, and the label is a fixed positive combination of
//! the clipped features plus Gaussian noise.

use crate::error::{EngineError, Result};
use crate::models::{Dataset, AQI_MAX, AQI_MIN, NUM_FEATURES};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

/// Default number of synthetic rows
pub const DEFAULT_SAMPLES: usize = 1500;

/// Default generator seed
pub const DEFAULT_SEED: u64 = 42;

/// (mean, std) per feature, in `FEATURE_NAMES` order
const COLUMN_DISTRIBUTIONS: [(f64, f64); NUM_FEATURES] = [
    (50.0, 30.0), // pm25
    (70.0, 35.0), // pm10
    (40.0, 20.0), // no2
    (20.0, 10.0), // so2
    (1.2, 0.8),   // co
    (45.0, 25.0), // o3
    (25.0, 10.0), // temperature
    (65.0, 20.0), // humidity
];

const TEMPERATURE: usize = 6;
const HUMIDITY: usize = 7;

/// Label noise standard deviation
const LABEL_NOISE_STD: f64 = 20.0;

/// Noise-free label for one clipped feature row.
///
/// CO is reported in mg/m³, two orders of magnitude below the other
/// pollutants, so it is scaled by 100 before weighting.
pub fn label_formula(row: &[f64; NUM_FEATURES]) -> f64 {
    let [pm25, pm10, no2, so2, co, o3, temperature, humidity] = *row;
    0.4 * pm25
        + 0.3 * pm10
        + 0.1 * no2
        + 0.05 * so2
        + 0.1 * co * 100.0
        + 0.05 * o3
        + 0.05 * (temperature - 25.0).abs()
        + 0.05 * humidity
}

/// Generate exactly `n` rows; the same seed always yields the same table
pub fn generate(n: usize, seed: u64) -> Result<Dataset> {
    if n == 0 {
        return Err(EngineError::TrainingFailed(
            "synthetic dataset size must be positive".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut features = vec![[0.0; NUM_FEATURES]; n];

    for (col, &(mean, std)) in COLUMN_DISTRIBUTIONS.iter().enumerate() {
        let dist = normal(mean, std)?;
        for row in features.iter_mut() {
            row[col] = clip_feature(col, dist.sample(&mut rng));
        }
    }

    let noise = normal(0.0, LABEL_NOISE_STD)?;
    let labels: Vec<f64> = features
        .iter()
        .map(|row| (label_formula(row) + noise.sample(&mut rng)).clamp(AQI_MIN, AQI_MAX))
        .collect();

    debug!(rows = n, seed = seed, "Generated synthetic dataset");
    Dataset::new(features, labels)
}

fn normal(mean: f64, std: f64) -> Result<Normal<f64>> {
    Normal::new(mean, std)
        .map_err(|e| EngineError::TrainingFailed(format!("invalid distribution: {}", e)))
}

fn clip_feature(col: usize, value: f64) -> f64 {
    match col {
        TEMPERATURE => value,
        HUMIDITY => value.clamp(0.0, 100.0),
        _ => value.max(0.0),
    }
}
