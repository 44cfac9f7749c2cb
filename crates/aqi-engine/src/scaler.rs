//! Feature standardization for the linear model

use crate::error::{EngineError, Result};
use crate::models::{Dataset, FEATURE_NAMES, NUM_FEATURES};
use serde::{Deserialize, Serialize};

/// Per-feature mean and standard deviation fit on training rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: [f64; NUM_FEATURES],
    pub std: [f64; NUM_FEATURES],
}

impl StandardScaler {
    /// Fit column statistics (population standard deviation).
    ///
    /// Constancy is checked on the raw values: a constant column whose value
    /// is not exactly representable leaves a rounding residue in the computed
    /// standard deviation.
    ///
    /// # Errors
    ///
    /// `DegenerateFeature` if the dataset is empty or any column is constant,
    /// which includes every single-row dataset.
    pub fn fit(dataset: &Dataset) -> Result<Self> {
        if dataset.is_empty() {
            return Err(EngineError::DegenerateFeature {
                feature: FEATURE_NAMES[0].to_string(),
            });
        }

        let first = dataset.features()[0];
        for (i, value) in first.iter().enumerate() {
            if dataset.features().iter().all(|row| row[i] == *value) {
                return Err(EngineError::DegenerateFeature {
                    feature: FEATURE_NAMES[i].to_string(),
                });
            }
        }

        let n = dataset.len() as f64;
        let mut mean = [0.0; NUM_FEATURES];
        for row in dataset.features() {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut std = [0.0; NUM_FEATURES];
        for row in dataset.features() {
            for ((s, x), m) in std.iter_mut().zip(row).zip(&mean) {
                *s += (x - m).powi(2);
            }
        }
        for (i, s) in std.iter_mut().enumerate() {
            *s = (*s / n).sqrt();
            if *s == 0.0 {
                return Err(EngineError::DegenerateFeature {
                    feature: FEATURE_NAMES[i].to_string(),
                });
            }
        }

        Ok(Self { mean, std })
    }

    /// Apply `(x - mean) / std` element-wise
    pub fn transform(&self, row: &[f64; NUM_FEATURES]) -> [f64; NUM_FEATURES] {
        let mut out = [0.0; NUM_FEATURES];
        for (i, o) in out.iter_mut().enumerate() {
            *o = (row[i] - self.mean[i]) / self.std[i];
        }
        out
    }

    pub fn transform_all(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<[f64; NUM_FEATURES]> {
        rows.iter().map(|row| self.transform(row)).collect()
    }

    /// Reject parameters that could not have come from a successful fit
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        for (i, (m, s)) in self.mean.iter().zip(&self.std).enumerate() {
            if !m.is_finite() || !s.is_finite() || *s <= 0.0 {
                return Err(format!(
                    "invalid statistics for '{}': mean={}, std={}",
                    FEATURE_NAMES[i], m, s
                ));
            }
        }
        Ok(())
    }
}
