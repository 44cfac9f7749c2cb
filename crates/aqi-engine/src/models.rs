//! Core data models for the estimation engine

use crate::category::AqiCategory;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Number of input features expected by both models
pub const NUM_FEATURES: usize = 8;

/// Canonical feature order, shared by the dataset file and the models
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "pm25",
    "pm10",
    "no2",
    "so2",
    "co",
    "o3",
    "temperature",
    "humidity",
];

/// Name of the label column in the dataset file
pub const LABEL_NAME: &str = "aqi";

/// Lower and upper bound of the AQI scale
pub const AQI_MIN: f64 = 0.0;
pub const AQI_MAX: f64 = 500.0;

/// Clamp a raw model output onto the AQI scale.
///
/// NaN can only arise from overflowing inputs and saturates to the top.
pub fn clamp_aqi(raw: f64) -> f64 {
    if raw.is_nan() {
        return AQI_MAX;
    }
    raw.clamp(AQI_MIN, AQI_MAX)
}

/// Validated environmental measurements for one prediction
///
/// Pollutant concentrations and humidity are non-negative, humidity is at
/// most 100 and every value is finite. Instances can only be obtained
/// through validation, so downstream code never re-checks them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFeatureVector")]
pub struct FeatureVector {
    pm25: f64,
    pm10: f64,
    no2: f64,
    so2: f64,
    co: f64,
    o3: f64,
    temperature: f64,
    humidity: f64,
}

/// Unvalidated wire form of [`FeatureVector`]
#[derive(Debug, Clone, Copy, Deserialize)]
struct RawFeatureVector {
    pm25: f64,
    pm10: f64,
    no2: f64,
    so2: f64,
    co: f64,
    o3: f64,
    temperature: f64,
    humidity: f64,
}

impl TryFrom<RawFeatureVector> for FeatureVector {
    type Error = EngineError;

    fn try_from(raw: RawFeatureVector) -> Result<Self> {
        FeatureVector::new(
            raw.pm25,
            raw.pm10,
            raw.no2,
            raw.so2,
            raw.co,
            raw.o3,
            raw.temperature,
            raw.humidity,
        )
    }
}

impl FeatureVector {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pm25: f64,
        pm10: f64,
        no2: f64,
        so2: f64,
        co: f64,
        o3: f64,
        temperature: f64,
        humidity: f64,
    ) -> Result<Self> {
        Self::from_array([pm25, pm10, no2, so2, co, o3, temperature, humidity])
    }

    /// Build from values in [`FEATURE_NAMES`] order
    pub fn from_array(values: [f64; NUM_FEATURES]) -> Result<Self> {
        for (name, value) in FEATURE_NAMES.iter().zip(values.iter()) {
            if !value.is_finite() {
                return Err(EngineError::InvalidFeatureVector(format!(
                    "{} must be a finite number, got {}",
                    name, value
                )));
            }
            if *name != "temperature" && *value < 0.0 {
                return Err(EngineError::InvalidFeatureVector(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        let humidity = values[7];
        if humidity > 100.0 {
            return Err(EngineError::InvalidFeatureVector(format!(
                "humidity must be within [0, 100], got {}",
                humidity
            )));
        }

        Ok(Self {
            pm25: values[0],
            pm10: values[1],
            no2: values[2],
            so2: values[3],
            co: values[4],
            o3: values[5],
            temperature: values[6],
            humidity,
        })
    }

    /// Values in [`FEATURE_NAMES`] order
    pub fn to_array(&self) -> [f64; NUM_FEATURES] {
        [
            self.pm25,
            self.pm10,
            self.no2,
            self.so2,
            self.co,
            self.o3,
            self.temperature,
            self.humidity,
        ]
    }

    pub fn pm25(&self) -> f64 {
        self.pm25
    }

    pub fn pm10(&self) -> f64 {
        self.pm10
    }

    pub fn no2(&self) -> f64 {
        self.no2
    }

    pub fn so2(&self) -> f64 {
        self.so2
    }

    pub fn co(&self) -> f64 {
        self.co
    }

    pub fn o3(&self) -> f64 {
        self.o3
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn humidity(&self) -> f64 {
        self.humidity
    }
}

impl TryFrom<&[f64]> for FeatureVector {
    type Error = EngineError;

    fn try_from(values: &[f64]) -> Result<Self> {
        let array: [f64; NUM_FEATURES] = values.try_into().map_err(|_| {
            EngineError::InvalidFeatureVector(format!(
                "expected {} values, got {}",
                NUM_FEATURES,
                values.len()
            ))
        })?;
        Self::from_array(array)
    }
}

/// Labeled training table: one feature row and one AQI label per sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    features: Vec<[f64; NUM_FEATURES]>,
    labels: Vec<f64>,
}

impl Dataset {
    pub fn new(features: Vec<[f64; NUM_FEATURES]>, labels: Vec<f64>) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(EngineError::TrainingFailed(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn features(&self) -> &[[f64; NUM_FEATURES]] {
        &self.features
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn row(&self, index: usize) -> Option<(&[f64; NUM_FEATURES], f64)> {
        Some((self.features.get(index)?, *self.labels.get(index)?))
    }

    /// All values of one feature column
    pub fn column(&self, feature: usize) -> Vec<f64> {
        self.features.iter().map(|row| row[feature]).collect()
    }

    /// New dataset made of the given rows, in the given order
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: indices.iter().map(|&i| self.features[i]).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// One model's clamped AQI estimate and its severity band
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub aqi: f64,
    pub category: AqiCategory,
}

impl Prediction {
    pub fn new(aqi: f64) -> Self {
        Self {
            aqi,
            category: AqiCategory::categorize(aqi),
        }
    }
}

/// Both models' estimates for the same input
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DualPrediction {
    pub linear: Prediction,
    pub tree: Prediction,
    /// Absolute disagreement between the two models
    pub difference: f64,
}

impl DualPrediction {
    pub fn new(linear_aqi: f64, tree_aqi: f64) -> Self {
        Self {
            linear: Prediction::new(linear_aqi),
            tree: Prediction::new(tree_aqi),
            difference: (linear_aqi - tree_aqi).abs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureVector {
        FeatureVector::new(50.0, 70.0, 40.0, 20.0, 1.2, 45.0, 25.0, 65.0).unwrap()
    }

    #[test]
    fn test_valid_vector_round_trips_array() {
        let v = sample();
        assert_eq!(v.to_array(), [50.0, 70.0, 40.0, 20.0, 1.2, 45.0, 25.0, 65.0]);
        assert_eq!(v.humidity(), 65.0);
    }

    #[test]
    fn test_negative_temperature_allowed() {
        assert!(FeatureVector::new(1.0, 1.0, 1.0, 1.0, 0.1, 1.0, -30.0, 10.0).is_ok());
    }

    #[test]
    fn test_negative_pollutant_rejected() {
        let err = FeatureVector::new(-1.0, 1.0, 1.0, 1.0, 0.1, 1.0, 20.0, 10.0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFeatureVector(ref m) if m.contains("pm25")));
    }

    #[test]
    fn test_humidity_out_of_range_rejected() {
        assert!(FeatureVector::new(1.0, 1.0, 1.0, 1.0, 0.1, 1.0, 20.0, 100.5).is_err());
        assert!(FeatureVector::new(1.0, 1.0, 1.0, 1.0, 0.1, 1.0, 20.0, 100.0).is_ok());
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(FeatureVector::new(f64::NAN, 1.0, 1.0, 1.0, 0.1, 1.0, 20.0, 10.0).is_err());
        assert!(FeatureVector::new(1.0, 1.0, 1.0, 1.0, 0.1, 1.0, f64::INFINITY, 10.0).is_err());
    }

    #[test]
    fn test_wrong_arity_rejected() {
        let values = [1.0, 2.0, 3.0];
        let err = FeatureVector::try_from(&values[..]).unwrap_err();
        assert!(err.to_string().contains("expected 8 values, got 3"));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: FeatureVector = serde_json::from_str(
            r#"{"pm25":50,"pm10":70,"no2":40,"so2":20,"co":1.2,"o3":45,"temperature":25,"humidity":65}"#,
        )
        .unwrap();
        assert_eq!(ok, sample());

        let out_of_domain = serde_json::from_str::<FeatureVector>(
            r#"{"pm25":50,"pm10":70,"no2":40,"so2":20,"co":1.2,"o3":45,"temperature":25,"humidity":165}"#,
        );
        assert!(out_of_domain.is_err());

        let non_numeric = serde_json::from_str::<FeatureVector>(
            r#"{"pm25":"high","pm10":70,"no2":40,"so2":20,"co":1.2,"o3":45,"temperature":25,"humidity":65}"#,
        );
        assert!(non_numeric.is_err());

        let missing = serde_json::from_str::<FeatureVector>(r#"{"pm25":50}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn test_dataset_select_and_column() {
        let ds = Dataset::new(vec![[1.0; 8], [2.0; 8], [3.0; 8]], vec![10.0, 20.0, 30.0]).unwrap();
        let sub = ds.select(&[2, 0]);
        assert_eq!(sub.labels(), &[30.0, 10.0]);
        assert_eq!(sub.column(3), vec![3.0, 1.0]);
        assert!(ds.row(5).is_none());
    }

    #[test]
    fn test_dataset_length_mismatch() {
        assert!(Dataset::new(vec![[1.0; 8]], vec![]).is_err());
    }

    #[test]
    fn test_clamp_aqi() {
        assert_eq!(clamp_aqi(-12.0), 0.0);
        assert_eq!(clamp_aqi(612.0), 500.0);
        assert_eq!(clamp_aqi(77.0), 77.0);
        assert_eq!(clamp_aqi(f64::NAN), 500.0);
        assert_eq!(clamp_aqi(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_dual_prediction_difference() {
        let dual = DualPrediction::new(60.0, 45.5);
        assert!((dual.difference - 14.5).abs() < 1e-12);
        assert_eq!(dual.linear.category, AqiCategory::Moderate);
        assert_eq!(dual.tree.category, AqiCategory::Good);
    }
}
