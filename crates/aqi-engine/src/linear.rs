//! Ordinary least squares regression
//!
//! Fits `y = w·x + b` by solving the normal equations `(XᵀX)β = Xᵀy` with a
//! Cholesky factorization, where `X` carries a leading column of ones for the
//! intercept. Inputs are expected to be standardized already.

use crate::error::{EngineError, Result};
use crate::models::NUM_FEATURES;
use serde::{Deserialize, Serialize};

const DIM: usize = NUM_FEATURES + 1;

/// Fitted linear model: one weight per feature plus a bias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: [f64; NUM_FEATURES],
    pub bias: f64,
}

impl LinearModel {
    pub fn fit(x: &[[f64; NUM_FEATURES]], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(EngineError::TrainingFailed(format!(
                "{} rows but {} targets",
                x.len(),
                y.len()
            )));
        }
        if x.len() < DIM {
            return Err(EngineError::TrainingFailed(format!(
                "linear model needs at least {} rows, got {}",
                DIM,
                x.len()
            )));
        }

        let mut xtx = [[0.0; DIM]; DIM];
        let mut xty = [0.0; DIM];
        for (row, &target) in x.iter().zip(y) {
            let mut augmented = [1.0; DIM];
            augmented[1..].copy_from_slice(row);
            for i in 0..DIM {
                xty[i] += augmented[i] * target;
                for j in 0..=i {
                    xtx[i][j] += augmented[i] * augmented[j];
                }
            }
        }
        for i in 0..DIM {
            for j in (i + 1)..DIM {
                xtx[i][j] = xtx[j][i];
            }
        }

        let beta = cholesky_solve(&xtx, &xty).ok_or_else(|| {
            EngineError::TrainingFailed(
                "normal equations are singular (collinear features)".to_string(),
            )
        })?;

        let mut weights = [0.0; NUM_FEATURES];
        weights.copy_from_slice(&beta[1..]);
        Ok(Self {
            weights,
            bias: beta[0],
        })
    }

    pub fn predict(&self, x: &[f64; NUM_FEATURES]) -> f64 {
        self.bias + self.weights.iter().zip(x).map(|(w, v)| w * v).sum::<f64>()
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.bias.is_finite() && self.weights.iter().all(|w| w.is_finite()) {
            Ok(())
        } else {
            Err("non-finite coefficients".to_string())
        }
    }
}

/// Solve `A x = b` for symmetric positive-definite `A`.
///
/// Returns `None` when `A` is not numerically positive definite.
fn cholesky_solve(a: &[[f64; DIM]; DIM], b: &[f64; DIM]) -> Option<[f64; DIM]> {
    // A = L Lᵀ
    let mut l = [[0.0; DIM]; DIM];
    for i in 0..DIM {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let diag = a[i][i] - sum;
                if diag <= 1e-12 * a[i][i].abs().max(1.0) {
                    return None;
                }
                l[i][i] = diag.sqrt();
            } else {
                l[i][j] = (a[i][j] - sum) / l[j][j];
            }
        }
    }

    // L z = b
    let mut z = [0.0; DIM];
    for i in 0..DIM {
        let sum: f64 = (0..i).map(|k| l[i][k] * z[k]).sum();
        z[i] = (b[i] - sum) / l[i][i];
    }

    // Lᵀ x = z
    let mut x = [0.0; DIM];
    for i in (0..DIM).rev() {
        let sum: f64 = ((i + 1)..DIM).map(|k| l[k][i] * x[k]).sum();
        x[i] = (z[i] - sum) / l[i][i];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_rows(n: usize) -> Vec<[f64; NUM_FEATURES]> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                [
                    t.sin(),
                    (t * 0.7).cos(),
                    (t * 1.3).sin(),
                    (t * 0.3).cos(),
                    (t * 2.1).sin(),
                    (t * 0.9).cos(),
                    (t * 1.7).sin(),
                    (t * 0.5).cos(),
                ]
            })
            .collect()
    }

    #[test]
    fn test_recovers_exact_coefficients() {
        let true_w = [3.0, -2.0, 0.5, 1.0, 4.0, -1.5, 0.25, 2.0];
        let x = grid_rows(200);
        let y: Vec<f64> = x
            .iter()
            .map(|r| 10.0 + r.iter().zip(&true_w).map(|(a, b)| a * b).sum::<f64>())
            .collect();

        let model = LinearModel::fit(&x, &y).unwrap();
        assert!((model.bias - 10.0).abs() < 1e-6, "bias {}", model.bias);
        for (got, want) in model.weights.iter().zip(&true_w) {
            assert!((got - want).abs() < 1e-6, "weight {} vs {}", got, want);
        }
        assert!((model.predict(&x[5]) - y[5]).abs() < 1e-6);
    }

    #[test]
    fn test_collinear_features_rejected() {
        let x: Vec<[f64; NUM_FEATURES]> = grid_rows(50)
            .into_iter()
            .map(|mut r| {
                r[1] = r[0] * 2.0;
                r
            })
            .collect();
        let y = vec![1.0; x.len()];
        assert!(matches!(
            LinearModel::fit(&x, &y),
            Err(EngineError::TrainingFailed(_))
        ));
    }

    #[test]
    fn test_too_few_rows_rejected() {
        let x = grid_rows(4);
        let y = vec![1.0; 4];
        assert!(LinearModel::fit(&x, &y).is_err());
    }

    #[test]
    fn test_constant_target_gives_bias_only() {
        let x = grid_rows(100);
        let y = vec![42.0; 100];
        let model = LinearModel::fit(&x, &y).unwrap();
        assert!((model.bias - 42.0).abs() < 1e-6);
        assert!(model.weights.iter().all(|w| w.abs() < 1e-6));
    }
}
