//! Error types for the price_forecast crate

use crate::models::ModelKind;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the price_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// A series is too short for the component that has to consume it
    #[error("Insufficient data for {subject}: need at least {required} observations, have {actual}")]
    InsufficientData {
        subject: String,
        required: usize,
        actual: usize,
    },

    /// A model variant could not be fitted
    #[error("Training error in {model}: {reason}")]
    Training { model: ModelKind, reason: String },

    /// `predict` was called before a successful `train`
    #[error("Model {0} has not been trained")]
    ModelNotTrained(ModelKind),

    /// Every registered model failed or the training deadline expired
    #[error("No viable model: {0}")]
    NoViableModel(String),

    /// The price provider has no data for the symbol
    #[error("No price data found for symbol {0}")]
    UnknownSymbol(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from numeric building blocks
    #[error("Math error: {0}")]
    Math(#[from] trade_math::MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error while reading configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ForecastError {
    pub(crate) fn training(model: ModelKind, reason: impl Into<String>) -> Self {
        ForecastError::Training {
            model,
            reason: reason.into(),
        }
    }

    pub(crate) fn insufficient(subject: impl Into<String>, required: usize, actual: usize) -> Self {
        ForecastError::InsufficientData {
            subject: subject.into(),
            required,
            actual,
        }
    }

    /// Whether the selector may absorb this error as a failed variant
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ForecastError::InsufficientData { .. }
                | ForecastError::Training { .. }
                | ForecastError::Math(_)
        )
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(err: toml::de::Error) -> Self {
        ForecastError::ConfigError(err.to_string())
    }
}
