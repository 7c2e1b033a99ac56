//! Pipeline configuration
//!
//! Every field has a default, so a TOML file only needs the keys it changes:
//!
//! ```toml
//! split_ratio = 0.75
//!
//! [recurrent]
//! window = 30
//! epochs = 20
//! ```

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Longest forecast a caller may request, in days
pub const MAX_HORIZON: usize = 31;
/// Number of trailing observations returned as the historical tail
pub const HISTORY_TAIL: usize = 30;
/// Leading share of a series used for fitting before validation
pub const DEFAULT_SPLIT_RATIO: f64 = 0.8;

/// Whether a smoothing component is modelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentMode {
    None,
    Additive,
}

/// How the regression forecast builds its inputs for steps after the first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureUpdate {
    /// Re-derive lags and rolling means from history plus earlier predictions
    Recursive,
    /// Reuse the last observed feature row for every step (flat forecast)
    Frozen,
}

/// Top-level configuration consumed by the forecasting core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Train/validation split ratio, by position
    pub split_ratio: f64,
    /// Upper bound on the requested horizon
    pub max_horizon: usize,
    /// Length of the historical tail handed back with the forecast
    pub history_tail: usize,
    /// Train the model variants on the rayon pool instead of sequentially
    pub parallel: bool,
    /// Wall-clock budget for training all variants
    pub training_deadline_secs: Option<u64>,
    pub smoothing: SmoothingConfig,
    pub regression: RegressionConfig,
    pub recurrent: RecurrentConfig,
}

/// Exponential smoothing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub trend: ComponentMode,
    pub seasonal: ComponentMode,
    pub seasonal_periods: usize,
}

/// Lagged-feature tree ensemble settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    pub lags: Vec<usize>,
    pub rolling_windows: Vec<usize>,
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
    pub seed: u64,
    pub feature_update: FeatureUpdate,
    /// Complete feature rows required on top of the longest lag/window
    pub min_feature_rows: usize,
}

/// Recurrent network settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurrentConfig {
    pub window: usize,
    pub hidden_units: usize,
    pub layers: usize,
    pub dropout: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            split_ratio: DEFAULT_SPLIT_RATIO,
            max_horizon: MAX_HORIZON,
            history_tail: HISTORY_TAIL,
            parallel: false,
            training_deadline_secs: None,
            smoothing: SmoothingConfig::default(),
            regression: RegressionConfig::default(),
            recurrent: RecurrentConfig::default(),
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            trend: ComponentMode::Additive,
            seasonal: ComponentMode::Additive,
            seasonal_periods: 12,
        }
    }
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            lags: vec![5, 10, 30],
            rolling_windows: vec![5, 10, 30],
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            seed: 42,
            feature_update: FeatureUpdate::Recursive,
            min_feature_rows: 10,
        }
    }
}

impl Default for RecurrentConfig {
    fn default() -> Self {
        Self {
            window: 60,
            hidden_units: 50,
            layers: 2,
            dropout: 0.2,
            epochs: 50,
            batch_size: 32,
            learning_rate: 0.001,
            seed: 42,
        }
    }
}

impl ForecastConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ForecastConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn training_deadline(&self) -> Option<Duration> {
        self.training_deadline_secs.map(Duration::from_secs)
    }

    /// Check every setting for a usable value
    pub fn validate(&self) -> Result<()> {
        if !(self.split_ratio > 0.0 && self.split_ratio < 1.0) {
            return Err(invalid(format!(
                "split_ratio must be strictly between 0 and 1, got {}",
                self.split_ratio
            )));
        }
        if self.max_horizon == 0 || self.max_horizon > MAX_HORIZON {
            return Err(invalid(format!(
                "max_horizon must be between 1 and {}, got {}",
                MAX_HORIZON, self.max_horizon
            )));
        }
        if self.history_tail < 2 {
            return Err(invalid("history_tail must keep at least 2 observations"));
        }

        if self.smoothing.seasonal_periods < 2 {
            return Err(invalid("smoothing.seasonal_periods must be at least 2"));
        }

        let regression = &self.regression;
        if regression.lags.is_empty() || regression.lags.contains(&0) {
            return Err(invalid("regression.lags must be non-empty and non-zero"));
        }
        if regression.rolling_windows.is_empty() || regression.rolling_windows.contains(&0) {
            return Err(invalid(
                "regression.rolling_windows must be non-empty and non-zero",
            ));
        }
        if regression.n_trees == 0 || regression.max_depth == 0 {
            return Err(invalid("regression.n_trees and max_depth must be positive"));
        }
        if regression.min_samples_split < 2 {
            return Err(invalid("regression.min_samples_split must be at least 2"));
        }
        if regression.min_feature_rows < 2 {
            return Err(invalid("regression.min_feature_rows must be at least 2"));
        }

        let recurrent = &self.recurrent;
        if recurrent.window == 0 || recurrent.hidden_units == 0 || recurrent.layers == 0 {
            return Err(invalid(
                "recurrent.window, hidden_units and layers must be positive",
            ));
        }
        if !(0.0..1.0).contains(&recurrent.dropout) {
            return Err(invalid(format!(
                "recurrent.dropout must be in [0, 1), got {}",
                recurrent.dropout
            )));
        }
        if recurrent.epochs == 0 || recurrent.batch_size == 0 {
            return Err(invalid("recurrent.epochs and batch_size must be positive"));
        }
        if !(recurrent.learning_rate > 0.0 && recurrent.learning_rate.is_finite()) {
            return Err(invalid("recurrent.learning_rate must be positive"));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ForecastError {
    ForecastError::InvalidParameter(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = ForecastConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.regression.lags, vec![5, 10, 30]);
        assert_eq!(config.recurrent.window, 60);
        assert_eq!(config.smoothing.seasonal_periods, 12);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ForecastConfig::from_toml_str(
            r#"
            split_ratio = 0.75

            [smoothing]
            seasonal = "none"

            [regression]
            feature_update = "frozen"

            [recurrent]
            window = 20
            epochs = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.split_ratio, 0.75);
        assert_eq!(config.smoothing.seasonal, ComponentMode::None);
        assert_eq!(config.smoothing.trend, ComponentMode::Additive);
        assert_eq!(config.regression.feature_update, FeatureUpdate::Frozen);
        assert_eq!(config.regression.n_trees, 100);
        assert_eq!(config.recurrent.window, 20);
        assert_eq!(config.recurrent.hidden_units, 50);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            ForecastConfig::from_toml_str("split_ratio = 1.0"),
            Err(ForecastError::InvalidParameter(_))
        ));
        assert!(ForecastConfig::from_toml_str("max_horizon = 40").is_err());
        assert!(ForecastConfig::from_toml_str("[recurrent]\ndropout = 1.0").is_err());
        assert!(ForecastConfig::from_toml_str("[regression]\nlags = []").is_err());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        assert!(matches!(
            ForecastConfig::from_toml_str("split_ratio = "),
            Err(ForecastError::ConfigError(_))
        ));
    }
}
