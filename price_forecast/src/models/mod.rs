//! Forecasting models for daily closing prices
//!
//! The candidate set is closed: exponential smoothing, a lagged-feature random
//! forest and a recurrent network. Each one owns its fitted state and exposes
//! the same train/predict contract.

use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

pub mod exponential_smoothing;
pub mod random_forest;
pub mod recurrent;

pub use exponential_smoothing::ExponentialSmoothing;
pub use random_forest::RandomForestModel;
pub use recurrent::RecurrentModel;

/// Stable identifier of a model variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "ETS")]
    Smoothing,
    #[serde(rename = "Random Forest")]
    Regression,
    #[serde(rename = "RNN")]
    Recurrent,
}

impl ModelKind {
    /// Variants in registration order
    pub const ALL: [ModelKind; 3] = [
        ModelKind::Smoothing,
        ModelKind::Regression,
        ModelKind::Recurrent,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Smoothing => "ETS",
            ModelKind::Regression => "Random Forest",
            ModelKind::Recurrent => "RNN",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Forecast model that can be trained on a price series
pub trait ForecastModel: Debug + Send {
    /// Identifier of the variant
    fn kind(&self) -> ModelKind;

    /// Shortest series `train` accepts
    fn min_observations(&self) -> usize;

    /// Fit on the leading part of `series`, score the held-out tail, then refit
    /// on all of it. Returns the held-out RMSE.
    fn train(&mut self, series: &PriceSeries) -> Result<f64>;

    /// Forecast `horizon` values following the last observation
    fn predict(&self, horizon: usize) -> Result<Vec<f64>>;

    /// Whether `predict` can be called
    fn is_trained(&self) -> bool;
}

/// Forecast produced by the winning model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub model: ModelKind,
    /// Predicted closes for day offsets 1..=N
    pub values: Vec<f64>,
}

impl ForecastResult {
    pub fn new(model: ModelKind, values: Vec<f64>) -> Self {
        Self { model, values }
    }

    pub fn horizon(&self) -> usize {
        self.values.len()
    }

    /// Largest value and its 1-based day offset. The earliest day wins ties.
    pub fn peak(&self) -> Option<(usize, f64)> {
        self.values
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
                Some((_, max)) if v <= max => best,
                _ => Some((i + 1, v)),
            })
    }
}

/// Reject series the variants cannot learn from
pub(crate) fn check_usable(model: ModelKind, values: &[f64]) -> Result<()> {
    if let Some(bad) = values.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
        return Err(ForecastError::training(
            model,
            format!("degenerate input: prices must be positive and finite, found {}", bad),
        ));
    }
    Ok(())
}

pub(crate) fn check_length(model: ModelKind, required: usize, actual: usize) -> Result<()> {
    if actual < required {
        return Err(ForecastError::insufficient(model.name(), required, actual));
    }
    Ok(())
}

pub(crate) fn check_horizon(horizon: usize) -> Result<()> {
    if horizon == 0 {
        return Err(ForecastError::InvalidParameter(
            "Forecast horizon must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Reject predictions that are not usable as prices
pub(crate) fn check_forecast(model: ModelKind, values: &[f64]) -> Result<()> {
    if let Some(bad) = values.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
        return Err(ForecastError::training(
            model,
            format!("forecast contains a non-positive or non-finite price {}", bad),
        ));
    }
    Ok(())
}
