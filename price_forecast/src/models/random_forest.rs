//! Lagged-feature random forest regression
//!
//! Each training row describes one target day `t` by the closes `t - k` days
//! earlier (one column per lag) and the mean of the `w` closes before `t` (one
//! column per rolling window). Only values strictly before `t` are used.

use crate::config::{FeatureUpdate, RegressionConfig, DEFAULT_SPLIT_RATIO};
use crate::data::{split_index, PriceSeries};
use crate::error::{ForecastError, Result};
use crate::models::{
    check_forecast, check_horizon, check_length, check_usable, ForecastModel, ModelKind,
};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use tracing::{debug, info};
use trade_math::{forecast_accuracy, lagged, rolling_mean};

const KIND: ModelKind = ModelKind::Regression;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Random forest over lag and rolling-mean features
#[derive(Debug)]
pub struct RandomForestModel {
    config: RegressionConfig,
    split_ratio: f64,
    fitted: Option<FittedForest>,
}

#[derive(Debug)]
struct FittedForest {
    forest: Forest,
    /// Closes the forest was refitted on
    history: Vec<f64>,
}

impl RandomForestModel {
    pub fn new(config: RegressionConfig, split_ratio: f64) -> Result<Self> {
        if config.lags.is_empty() || config.lags.contains(&0) {
            return Err(ForecastError::InvalidParameter(
                "Lags must be non-empty and non-zero".to_string(),
            ));
        }
        if config.rolling_windows.is_empty() || config.rolling_windows.contains(&0) {
            return Err(ForecastError::InvalidParameter(
                "Rolling windows must be non-empty and non-zero".to_string(),
            ));
        }
        if config.n_trees == 0 {
            return Err(ForecastError::InvalidParameter(
                "The forest needs at least one tree".to_string(),
            ));
        }

        Ok(Self {
            config,
            split_ratio,
            fitted: None,
        })
    }

    /// Number of prior values a feature row looks back over
    pub fn lookback(&self) -> usize {
        self.config
            .lags
            .iter()
            .chain(&self.config.rolling_windows)
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Features describing the day that follows `history`
    pub fn feature_row(&self, history: &[f64]) -> Result<Vec<f64>> {
        let lags = self.config.lags.iter().map(|&k| lagged(history, k));
        let means = self
            .config
            .rolling_windows
            .iter()
            .map(|&w| rolling_mean(history, w));

        Ok(lags.chain(means).collect::<trade_math::Result<Vec<f64>>>()?)
    }

    /// Feature rows and targets for every day in `targets`
    fn design(
        &self,
        closes: &[f64],
        targets: std::ops::Range<usize>,
    ) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
        let rows = targets
            .clone()
            .map(|t| self.feature_row(&closes[..t]))
            .collect::<Result<Vec<_>>>()?;
        Ok((rows, closes[targets].to_vec()))
    }

    fn fit_forest(&self, closes: &[f64], end: usize) -> Result<Forest> {
        let (rows, targets) = self.design(closes, self.lookback()..end)?;
        check_length(KIND, 2, rows.len())?;

        let x = matrix(&rows)?;
        let params = RandomForestRegressorParameters::default()
            .with_n_trees(self.config.n_trees)
            .with_max_depth(self.config.max_depth)
            .with_min_samples_split(self.config.min_samples_split)
            .with_seed(self.config.seed);

        debug!(
            "Random Forest: fitting {} trees on {} rows x {} features",
            self.config.n_trees,
            rows.len(),
            rows.first().map_or(0, Vec::len)
        );
        Forest::fit(&x, &targets, params)
            .map_err(|e| ForecastError::training(KIND, format!("fit failed: {}", e)))
    }

    /// Lazily forecast `horizon` days ahead of the training history
    pub fn forecast_iter(&self, horizon: usize) -> Result<RecursiveForecast<'_>> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(ForecastError::ModelNotTrained(KIND))?;

        let frozen = match self.config.feature_update {
            FeatureUpdate::Frozen => Some(self.feature_row(&fitted.history)?),
            FeatureUpdate::Recursive => None,
        };

        Ok(RecursiveForecast {
            model: self,
            forest: &fitted.forest,
            history: fitted.history.clone(),
            frozen,
            remaining: horizon,
        })
    }
}

impl ForecastModel for RandomForestModel {
    fn kind(&self) -> ModelKind {
        KIND
    }

    fn min_observations(&self) -> usize {
        self.lookback() + self.config.min_feature_rows
    }

    fn train(&mut self, series: &PriceSeries) -> Result<f64> {
        self.fitted = None;
        let closes = series.closes();
        check_length(KIND, self.min_observations(), closes.len())?;
        check_usable(KIND, closes)?;

        let lookback = self.lookback();
        let split = split_index(closes.len(), self.split_ratio).max(lookback);
        let forest = self.fit_forest(closes, split)?;

        // One-step predictions on the held-out days from their true features
        let (rows, actual) = self.design(closes, split..closes.len())?;
        let predicted = forest
            .predict(&matrix(&rows)?)
            .map_err(|e| ForecastError::training(KIND, format!("predict failed: {}", e)))?;
        check_forecast(KIND, &predicted)?;
        let accuracy = forecast_accuracy(&predicted, &actual)?;
        debug!(
            "Random Forest: held-out MAE {:.4}, MAPE {:.2}%",
            accuracy.mae, accuracy.mape
        );
        let score = accuracy.rmse;

        self.fitted = Some(FittedForest {
            forest: self.fit_forest(closes, closes.len())?,
            history: closes.to_vec(),
        });
        info!(
            "Random Forest: validation RMSE {:.4} on {} held-out days",
            score,
            actual.len()
        );
        Ok(score)
    }

    fn predict(&self, horizon: usize) -> Result<Vec<f64>> {
        check_horizon(horizon)?;
        let values = self.forecast_iter(horizon)?.collect::<Result<Vec<f64>>>()?;
        check_forecast(KIND, &values)?;
        Ok(values)
    }

    fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }
}

impl Default for RandomForestModel {
    fn default() -> Self {
        Self {
            config: RegressionConfig::default(),
            split_ratio: DEFAULT_SPLIT_RATIO,
            fitted: None,
        }
    }
}

/// One-step-ahead predictions fed back into the history.
///
/// Every step rebuilds the feature row from the observed closes plus the
/// predictions made so far. With [`FeatureUpdate::Frozen`] the row built from
/// the observed closes is reused instead, which yields a flat forecast.
#[derive(Debug)]
pub struct RecursiveForecast<'a> {
    model: &'a RandomForestModel,
    forest: &'a Forest,
    history: Vec<f64>,
    frozen: Option<Vec<f64>>,
    remaining: usize,
}

impl RecursiveForecast<'_> {
    fn step(&mut self) -> Result<f64> {
        let row = match &self.frozen {
            Some(row) => row.clone(),
            None => self.model.feature_row(&self.history)?,
        };
        let prediction = self
            .forest
            .predict(&matrix(&[row])?)
            .map_err(|e| ForecastError::training(KIND, format!("predict failed: {}", e)))?
            .first()
            .copied()
            .ok_or_else(|| ForecastError::training(KIND, "empty prediction"))?;

        self.history.push(prediction);
        Ok(prediction)
    }
}

impl Iterator for RecursiveForecast<'_> {
    type Item = Result<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let item = self.step();
        if item.is_err() {
            self.remaining = 0;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

fn matrix(rows: &[Vec<f64>]) -> Result<DenseMatrix<f64>> {
    DenseMatrix::from_2d_vec(&rows.to_vec())
        .map_err(|e| ForecastError::training(KIND, format!("bad feature matrix: {}", e)))
}
