//! # Trade Math
//!
//! Numeric building blocks used by the forecasting models.
//! Nothing in this crate knows about instruments or models; it works on
//! plain `f64` slices and small state machines.

use thiserror::Error;

pub mod accuracy;
pub mod forecasting;
pub mod moving_averages;
pub mod scaling;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;

pub use accuracy::{forecast_accuracy, rmse, ForecastAccuracy};
pub use forecasting::{HoltLinear, HoltWinters, SmoothingParams};
pub use moving_averages::{lagged, rolling_mean};
pub use scaling::MinMaxScaler;
