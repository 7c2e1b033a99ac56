//! Recurrent network over sliding windows of scaled closes (RNN)

mod network;

use crate::config::{RecurrentConfig, DEFAULT_SPLIT_RATIO};
use crate::data::{split_index, PriceSeries};
use crate::error::{ForecastError, Result};
use crate::models::{
    check_forecast, check_horizon, check_length, check_usable, ForecastModel, ModelKind,
};
use network::{ElmanNetwork, NetworkSpec};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};
use trade_math::{rmse, MinMaxScaler};

const KIND: ModelKind = ModelKind::Recurrent;

/// Recurrent network forecaster
#[derive(Debug, Clone)]
pub struct RecurrentModel {
    config: RecurrentConfig,
    split_ratio: f64,
    fitted: Option<FittedNetwork>,
}

#[derive(Debug, Clone)]
struct FittedNetwork {
    network: ElmanNetwork,
    scaler: MinMaxScaler,
    /// The last `window` scaled closes
    window: Vec<f64>,
}

impl RecurrentModel {
    pub fn new(config: RecurrentConfig, split_ratio: f64) -> Result<Self> {
        if config.window == 0 || config.hidden_units == 0 || config.layers == 0 {
            return Err(ForecastError::InvalidParameter(
                "Window, hidden units and layers must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&config.dropout) {
            return Err(ForecastError::InvalidParameter(format!(
                "Dropout must be in [0, 1), got {}",
                config.dropout
            )));
        }

        Ok(Self {
            config,
            split_ratio,
            fitted: None,
        })
    }

    fn spec(&self) -> NetworkSpec {
        NetworkSpec {
            hidden_units: self.config.hidden_units,
            layers: self.config.layers,
            dropout: self.config.dropout,
            learning_rate: self.config.learning_rate,
        }
    }

    /// Fit a scaler on `values` and a network on its sliding windows
    fn fit(&self, values: &[f64]) -> Result<(ElmanNetwork, MinMaxScaler)> {
        let window = self.config.window;
        check_length(KIND, window + 1, values.len())?;

        let scaler = MinMaxScaler::fit(values)
            .map_err(|e| ForecastError::training(KIND, format!("degenerate input: {}", e)))?;
        let scaled = scaler.transform_all(values);
        let samples: Vec<(&[f64], f64)> = (window..scaled.len())
            .map(|t| (&scaled[t - window..t], scaled[t]))
            .collect();

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut network = ElmanNetwork::new(self.spec(), &mut rng)
            .ok_or_else(|| ForecastError::training(KIND, "could not initialise weights"))?;
        let mut optimiser = network.optimiser();

        for epoch in 1..=self.config.epochs {
            let loss =
                network.train_epoch(&samples, self.config.batch_size, &mut optimiser, &mut rng);
            if !loss.is_finite() {
                return Err(ForecastError::training(
                    KIND,
                    format!("training diverged at epoch {}", epoch),
                ));
            }
            if epoch % 10 == 0 || epoch == self.config.epochs {
                debug!("RNN: epoch {}/{} loss {:.6}", epoch, self.config.epochs, loss);
            }
        }

        Ok((network, scaler))
    }

    /// Lazily forecast `horizon` days, sliding the window over each prediction
    pub fn forecast_iter(&self, horizon: usize) -> Result<SlidingForecast<'_>> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(ForecastError::ModelNotTrained(KIND))?;

        Ok(SlidingForecast {
            fitted,
            window: fitted.window.clone(),
            remaining: horizon,
        })
    }
}

impl ForecastModel for RecurrentModel {
    fn kind(&self) -> ModelKind {
        KIND
    }

    fn min_observations(&self) -> usize {
        2 * self.config.window + 1
    }

    fn train(&mut self, series: &PriceSeries) -> Result<f64> {
        self.fitted = None;
        let closes = series.closes();
        check_length(KIND, self.min_observations(), closes.len())?;
        check_usable(KIND, closes)?;

        let window = self.config.window;
        let split = split_index(closes.len(), self.split_ratio);
        let (network, scaler) = self.fit(&closes[..split])?;

        // One-step predictions on held-out days, inputs scaled with the training range
        let scaled = scaler.transform_all(closes);
        let predicted: Vec<f64> = (split..closes.len())
            .map(|t| scaler.inverse_transform(network.predict(&scaled[t - window..t])))
            .collect();
        check_forecast(KIND, &predicted)?;
        let score = rmse(&predicted, &closes[split..])?;

        let (network, scaler) = self.fit(closes)?;
        let last = scaler.transform_all(&closes[closes.len() - window..]);
        self.fitted = Some(FittedNetwork {
            network,
            scaler,
            window: last,
        });

        info!(
            "RNN: validation RMSE {:.4} on {} held-out days",
            score,
            closes.len() - split
        );
        Ok(score)
    }

    fn predict(&self, horizon: usize) -> Result<Vec<f64>> {
        check_horizon(horizon)?;
        let values: Vec<f64> = self.forecast_iter(horizon)?.collect();
        check_forecast(KIND, &values)?;
        Ok(values)
    }

    fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }
}

impl Default for RecurrentModel {
    fn default() -> Self {
        Self {
            config: RecurrentConfig::default(),
            split_ratio: DEFAULT_SPLIT_RATIO,
            fitted: None,
        }
    }
}

/// Recursive forecast: each scaled prediction joins the window and the oldest
/// value drops out. Yields prices in original units.
#[derive(Debug)]
pub struct SlidingForecast<'a> {
    fitted: &'a FittedNetwork,
    window: Vec<f64>,
    remaining: usize,
}

impl Iterator for SlidingForecast<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let scaled = self.fitted.network.predict(&self.window);
        self.window.remove(0);
        self.window.push(scaled);
        Some(self.fitted.scaler.inverse_transform(scaled))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for SlidingForecast<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(values: &[f64]) -> PriceSeries {
        PriceSeries::from_closes(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), values).unwrap()
    }

    fn small_config() -> RecurrentConfig {
        RecurrentConfig {
            window: 10,
            hidden_units: 8,
            layers: 2,
            epochs: 5,
            batch_size: 16,
            learning_rate: 0.01,
            ..RecurrentConfig::default()
        }
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 50.0 + 5.0 * (i as f64 * 0.25).sin() + 0.1 * i as f64)
            .collect()
    }

    #[test]
    fn test_trains_and_forecasts() {
        let mut model = RecurrentModel::new(small_config(), 0.8).unwrap();
        let score = model.train(&series(&wave(80))).unwrap();

        assert!(score.is_finite() && score >= 0.0);
        let forecast = model.predict(7).unwrap();
        assert_eq!(forecast.len(), 7);
        assert!(forecast.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_min_observations_is_two_windows() {
        let mut model = RecurrentModel::new(small_config(), 0.8).unwrap();
        assert_eq!(model.min_observations(), 21);
        assert!(matches!(
            model.train(&series(&wave(20))),
            Err(ForecastError::InsufficientData { .. })
        ));
        assert!(!model.is_trained());
    }

    #[test]
    fn test_constant_series_is_degenerate() {
        let mut model = RecurrentModel::new(small_config(), 0.8).unwrap();
        assert!(matches!(
            model.train(&series(&[100.0; 50])),
            Err(ForecastError::Training {
                model: ModelKind::Recurrent,
                ..
            })
        ));
    }

    #[test]
    fn test_same_seed_same_forecast() {
        let values = wave(60);
        let mut first = RecurrentModel::new(small_config(), 0.8).unwrap();
        let mut second = RecurrentModel::new(small_config(), 0.8).unwrap();

        assert_eq!(
            first.train(&series(&values)).unwrap(),
            second.train(&series(&values)).unwrap()
        );
        assert_eq!(first.predict(3).unwrap(), second.predict(3).unwrap());
    }

    #[test]
    fn test_failed_retrain_clears_fit() {
        let mut model = RecurrentModel::new(small_config(), 0.8).unwrap();
        model.train(&series(&wave(80))).unwrap();
        assert!(model.is_trained());

        assert!(model.train(&series(&[50.0; 80])).is_err());
        assert!(!model.is_trained());
        assert!(matches!(
            model.predict(2),
            Err(ForecastError::ModelNotTrained(ModelKind::Recurrent))
        ));
    }

    #[test]
    fn test_predict_before_train() {
        let model = RecurrentModel::default();
        assert!(matches!(
            model.predict(2),
            Err(ForecastError::ModelNotTrained(ModelKind::Recurrent))
        ));
    }
}
