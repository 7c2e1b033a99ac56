//! Min-max scaling to the unit interval

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Maps values from the fitted `[min, max]` range onto `[0, 1]`.
///
/// Values outside the fitted range map outside `[0, 1]`; nothing is clipped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    /// Fit the scaler on `values`.
    ///
    /// Fails on empty input, non-finite values, or a zero range.
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(MathError::InsufficientData(
                "Cannot fit a scaler on an empty series".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "Cannot fit a scaler on non-finite values".to_string(),
            ));
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max - min <= f64::EPSILON * max.abs().max(1.0) {
            return Err(MathError::CalculationError(format!(
                "Zero range: every value equals {}",
                min
            )));
        }

        Ok(Self { min, max })
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.min) / (self.max - self.min)
    }

    pub fn transform_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.transform(v)).collect()
    }

    pub fn inverse_transform(&self, scaled: f64) -> f64 {
        scaled * (self.max - self.min) + self.min
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
