//! Dataset file I/O
//!
//! One row per sample, nine header-named columns: the eight features in
//! canonical order followed by the `aqi` label.

use crate::artifacts::write_atomic;
use crate::error::{EngineError, Result};
use crate::models::{Dataset, FeatureVector, FEATURE_NAMES, LABEL_NAME, NUM_FEATURES};
use crate::synth;
use std::path::Path;
use tracing::{info, warn};

/// Default location of the training table
pub const DEFAULT_DATASET_PATH: &str = "ml_models/data/aqi_dataset.csv";

fn dataset_error(path: &Path, reason: impl Into<String>) -> EngineError {
    EngineError::Dataset {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Write the dataset as CSV, replacing any existing file atomically
pub fn save_csv(dataset: &Dataset, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let header = FEATURE_NAMES.iter().copied().chain(std::iter::once(LABEL_NAME));
    writer
        .write_record(header)
        .map_err(|e| dataset_error(path, e.to_string()))?;

    for (row, label) in dataset.features().iter().zip(dataset.labels()) {
        let record = row
            .iter()
            .chain(std::iter::once(label))
            .map(|v| v.to_string());
        writer
            .write_record(record)
            .map_err(|e| dataset_error(path, e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| dataset_error(path, e.to_string()))?;
    write_atomic(path, &bytes)
}

/// Read a dataset previously written by [`save_csv`] or prepared by hand
pub fn load_csv(path: &Path) -> Result<Dataset> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| match e.kind() {
        csv::ErrorKind::Io(io) => {
            EngineError::io(path, std::io::Error::new(io.kind(), io.to_string()))
        }
        _ => dataset_error(path, e.to_string()),
    })?;

    let headers = reader
        .headers()
        .map_err(|e| dataset_error(path, e.to_string()))?
        .clone();
    let expected: Vec<&str> = FEATURE_NAMES
        .iter()
        .copied()
        .chain(std::iter::once(LABEL_NAME))
        .collect();
    let actual: Vec<&str> = headers.iter().map(str::trim).collect();
    if actual != expected {
        return Err(dataset_error(
            path,
            format!("expected columns {:?}, found {:?}", expected, actual),
        ));
    }

    let mut features = Vec::new();
    let mut labels = Vec::new();
    for (index, record) in reader.records().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let record = record.map_err(|e| dataset_error(path, format!("line {}: {}", line, e)))?;

        let mut values = [0.0; NUM_FEATURES + 1];
        for (slot, field) in values.iter_mut().zip(record.iter()) {
            *slot = field.trim().parse::<f64>().map_err(|_| {
                dataset_error(path, format!("line {}: '{}' is not a number", line, field))
            })?;
        }

        let mut row = [0.0; NUM_FEATURES];
        row.copy_from_slice(&values[..NUM_FEATURES]);
        let row = FeatureVector::from_array(row)
            .map_err(|e| dataset_error(path, format!("line {}: {}", line, e)))?
            .to_array();
        let label = values[NUM_FEATURES];
        if !label.is_finite() {
            return Err(dataset_error(path, format!("line {}: label is not finite", line)));
        }

        features.push(row);
        labels.push(label);
    }

    if labels.is_empty() {
        return Err(dataset_error(path, "dataset contains no rows"));
    }

    Dataset::new(features, labels)
}

/// Load the dataset at `path`, or synthesize and persist one if absent
pub fn load_or_generate(path: &Path, samples: usize, seed: u64) -> Result<Dataset> {
    if path.exists() {
        let dataset = load_csv(path)?;
        info!(path = %path.display(), rows = dataset.len(), "Loaded training dataset");
        return Ok(dataset);
    }

    warn!(path = %path.display(), "Dataset not found, creating synthetic data");
    let dataset = synth::generate(samples, seed)?;
    save_csv(&dataset, path)?;
    info!(path = %path.display(), rows = dataset.len(), seed = seed, "Synthetic dataset saved");
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_load_preserves_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("aqi.csv");
        let original = synth::generate(25, 3).unwrap();

        save_csv(&original, &path).unwrap();
        let loaded = load_csv(&path).unwrap();

        // `f64::to_string` is shortest round-trip formatting, so values match exactly.
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_header_is_named() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aqi.csv");
        save_csv(&synth::generate(2, 3).unwrap(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let first = content.lines().next().unwrap();
        assert_eq!(first, "pm25,pm10,no2,so2,co,o3,temperature,humidity,aqi");
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_load_or_generate_creates_then_reuses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aqi.csv");
        assert!(!path.exists());

        let first = load_or_generate(&path, 40, 9).unwrap();
        assert!(path.exists());

        // A different seed must not matter once the file exists.
        let second = load_or_generate(&path, 40, 10).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_wrong_header_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "a,b,c\n1,2,3\n").unwrap();
        assert!(matches!(load_csv(&path), Err(EngineError::Dataset { .. })));
    }

    #[test]
    fn test_out_of_domain_row_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            "pm25,pm10,no2,so2,co,o3,temperature,humidity,aqi\n1,2,3,4,0.5,6,20,140,50\n",
        )
        .unwrap();
        let err = load_csv(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{}", err);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = load_csv(&dir.path().join("missing.csv")).unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }
}
