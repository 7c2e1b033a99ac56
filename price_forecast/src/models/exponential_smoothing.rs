//! Exponential smoothing model (ETS)
//!
//! Fits additive Holt-Winters when the series holds two full seasonal cycles and
//! falls back to Holt's linear trend otherwise. Smoothing weights are picked by
//! a coarse grid search on the one-step squared error, refined around the best
//! coarse point.

use crate::config::{ComponentMode, SmoothingConfig, DEFAULT_SPLIT_RATIO};
use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::models::{
    check_forecast, check_horizon, check_length, check_usable, ForecastModel, ModelKind,
};
use tracing::{debug, info};
use trade_math::{rmse, HoltLinear, HoltWinters, SmoothingParams};

const KIND: ModelKind = ModelKind::Smoothing;

/// Shortest series the smoother is trained on
pub const MIN_OBSERVATIONS: usize = 10;

const COARSE_STEPS: usize = 10;
const COARSE_START: f64 = 0.05;
const COARSE_STEP: f64 = 0.1;
const REFINE_STEP: f64 = 0.02;
const REFINE_SPAN: i32 = 2;

/// Exponential smoothing model
#[derive(Debug, Clone)]
pub struct ExponentialSmoothing {
    config: SmoothingConfig,
    split_ratio: f64,
    fitted: Option<FittedSmoother>,
}

/// State left after smoothing the full series
#[derive(Debug, Clone)]
enum FittedSmoother {
    Seasonal(HoltWinters),
    Trend(HoltLinear),
}

impl FittedSmoother {
    fn forecast(&self, horizon: usize) -> Result<Vec<f64>> {
        (1..=horizon)
            .map(|h| {
                let value = match self {
                    FittedSmoother::Seasonal(hw) => hw.forecast(h)?,
                    FittedSmoother::Trend(holt) => holt.forecast(h)?,
                };
                Ok(value)
            })
            .collect()
    }
}

impl ExponentialSmoothing {
    pub fn new(config: SmoothingConfig, split_ratio: f64) -> Result<Self> {
        if config.seasonal_periods < 2 {
            return Err(ForecastError::InvalidParameter(
                "Seasonal period must be at least 2".to_string(),
            ));
        }
        if !(split_ratio > 0.0 && split_ratio < 1.0) {
            return Err(ForecastError::InvalidParameter(
                "Split ratio must be between 0 and 1".to_string(),
            ));
        }

        Ok(Self {
            config,
            split_ratio,
            fitted: None,
        })
    }

    fn trend_enabled(&self) -> bool {
        self.config.trend == ComponentMode::Additive
    }

    /// Fit on `values`, seasonal first
    fn fit(&self, values: &[f64]) -> Result<FittedSmoother> {
        let period = self.config.seasonal_periods;

        if self.config.seasonal == ComponentMode::Additive {
            if values.len() >= 2 * period {
                if let Some(hw) = self.fit_seasonal(values, period)? {
                    return Ok(FittedSmoother::Seasonal(hw));
                }
                debug!("ETS: seasonal fit diverged, falling back to trend-only");
            } else {
                debug!(
                    "ETS: {} values cover fewer than two seasons of {}, falling back to trend-only",
                    values.len(),
                    period
                );
            }
        }

        self.fit_trend(values).map(FittedSmoother::Trend)
    }

    fn fit_seasonal(&self, values: &[f64], period: usize) -> Result<Option<HoltWinters>> {
        let trend = self.trend_enabled();
        let best = grid_search([true, trend, true], |params| {
            let mut hw = HoltWinters::initialize(params, period, trend, values).ok()?;
            sum_squares(values[period..].iter().map(|&y| hw.update(y).ok()))
        });

        let Some((params, sse)) = best else {
            return Ok(None);
        };
        debug!(
            "ETS: seasonal alpha={:.2} beta={:.2} gamma={:.2} sse={:.6}",
            params.alpha, params.beta, params.gamma, sse
        );

        let mut hw = HoltWinters::initialize(params, period, trend, values)?;
        for &y in &values[period..] {
            hw.update(y)?;
        }
        Ok(Some(hw))
    }

    fn fit_trend(&self, values: &[f64]) -> Result<HoltLinear> {
        let trend = self.trend_enabled();
        let warmup = HoltLinear::warmup(trend);
        check_length(KIND, warmup + 1, values.len())?;

        let best = grid_search([true, trend, false], |params| {
            let mut holt = HoltLinear::new(params, trend);
            sum_squares(
                values
                    .iter()
                    .filter_map(|&y| holt.update(y).transpose())
                    .map(|r| r.ok()),
            )
        });

        let (params, sse) = best.ok_or_else(|| {
            ForecastError::training(KIND, "no smoothing weights produced a finite error")
        })?;
        debug!(
            "ETS: trend-only alpha={:.2} beta={:.2} sse={:.6}",
            params.alpha, params.beta, sse
        );

        let mut holt = HoltLinear::new(params, trend);
        for &y in values {
            holt.update(y)?;
        }
        Ok(holt)
    }
}

impl ForecastModel for ExponentialSmoothing {
    fn kind(&self) -> ModelKind {
        KIND
    }

    fn min_observations(&self) -> usize {
        MIN_OBSERVATIONS
    }

    fn train(&mut self, series: &PriceSeries) -> Result<f64> {
        self.fitted = None;
        check_length(KIND, MIN_OBSERVATIONS, series.len())?;
        check_usable(KIND, series.closes())?;

        let (train, valid) = series.split_at_ratio(self.split_ratio);
        let holdout = self.fit(train)?.forecast(valid.len())?;
        check_forecast(KIND, &holdout)?;
        let score = rmse(&holdout, valid)?;

        self.fitted = Some(self.fit(series.closes())?);
        info!("ETS: validation RMSE {:.4} on {} held-out days", score, valid.len());
        Ok(score)
    }

    fn predict(&self, horizon: usize) -> Result<Vec<f64>> {
        check_horizon(horizon)?;
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(ForecastError::ModelNotTrained(KIND))?;

        let values = fitted.forecast(horizon)?;
        check_forecast(KIND, &values)?;
        Ok(values)
    }

    fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }
}

impl Default for ExponentialSmoothing {
    fn default() -> Self {
        Self {
            config: SmoothingConfig::default(),
            split_ratio: DEFAULT_SPLIT_RATIO,
            fitted: None,
        }
    }
}

/// Sum of squared errors, `None` if any step failed or the sum is not finite
fn sum_squares(errors: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let mut total = 0.0;
    for error in errors {
        total += error?.powi(2);
    }
    total.is_finite().then_some(total)
}

/// Minimise `objective` over (alpha, beta, gamma). Weights not marked `free`
/// stay at zero. Ties keep the earliest candidate.
fn grid_search<F>(free: [bool; 3], mut objective: F) -> Option<(SmoothingParams, f64)>
where
    F: FnMut(SmoothingParams) -> Option<f64>,
{
    let coarse: Vec<f64> = (0..COARSE_STEPS)
        .map(|i| COARSE_START + COARSE_STEP * i as f64)
        .collect();
    let axes = free.map(|f| if f { coarse.clone() } else { vec![0.0] });
    let (centre, coarse_best) = best_of(&axes, &mut objective)?;

    let axes = [0, 1, 2].map(|d| {
        if !free[d] {
            return vec![0.0];
        }
        (-REFINE_SPAN..=REFINE_SPAN)
            .map(|k| centre[d] + REFINE_STEP * f64::from(k))
            .filter(|v| (0.0..=1.0).contains(v))
            .collect()
    });

    let (point, sse) = match best_of(&axes, &mut objective) {
        Some((point, sse)) if sse < coarse_best => (point, sse),
        _ => (centre, coarse_best),
    };
    SmoothingParams::new(point[0], point[1], point[2])
        .ok()
        .map(|params| (params, sse))
}

fn best_of<F>(axes: &[Vec<f64>; 3], objective: &mut F) -> Option<([f64; 3], f64)>
where
    F: FnMut(SmoothingParams) -> Option<f64>,
{
    let mut best: Option<([f64; 3], f64)> = None;
    for &a in &axes[0] {
        for &b in &axes[1] {
            for &g in &axes[2] {
                let Ok(params) = SmoothingParams::new(a, b, g) else {
                    continue;
                };
                if let Some(sse) = objective(params) {
                    if best.map_or(true, |(_, current)| sse < current) {
                        best = Some(([a, b, g], sse));
                    }
                }
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn series(values: &[f64]) -> PriceSeries {
        PriceSeries::from_closes(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), values).unwrap()
    }

    #[test]
    fn test_constant_series_forecasts_constant() {
        let mut model = ExponentialSmoothing::default();
        let rmse = model.train(&series(&[100.0; 200])).unwrap();

        assert_eq!(rmse, 0.0);
        let forecast = model.predict(31).unwrap();
        assert!(forecast.iter().all(|&v| v == 100.0));
    }

    #[test]
    fn test_linear_series_extends_trend() {
        let values: Vec<f64> = (0..120).map(|i| 50.0 + 0.5 * i as f64).collect();
        let mut model = ExponentialSmoothing::default();
        let rmse = model.train(&series(&values)).unwrap();

        assert_abs_diff_eq!(rmse, 0.0, epsilon = 1e-6);
        let forecast = model.predict(5).unwrap();
        for (h, value) in forecast.iter().enumerate() {
            assert_abs_diff_eq!(*value, 50.0 + 0.5 * (120 + h) as f64, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_short_series_falls_back_to_trend() {
        // 15 values cannot hold two seasons of 12
        let values: Vec<f64> = (0..15).map(|i| 10.0 + i as f64).collect();
        let mut model = ExponentialSmoothing::default();
        model.train(&series(&values)).unwrap();

        assert!(matches!(model.fitted, Some(FittedSmoother::Trend(_))));
        assert_abs_diff_eq!(model.predict(1).unwrap()[0], 25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_seasonal_pattern_is_used() {
        let pattern = [2.0, -1.0, 0.5, -1.5];
        let values: Vec<f64> = (0..80).map(|i| 30.0 + pattern[i % 4]).collect();
        let config = SmoothingConfig {
            seasonal_periods: 4,
            ..SmoothingConfig::default()
        };
        let mut model = ExponentialSmoothing::new(config, 0.8).unwrap();
        let rmse = model.train(&series(&values)).unwrap();

        assert!(rmse < 1e-6);
        let forecast = model.predict(4).unwrap();
        for (h, value) in forecast.iter().enumerate() {
            assert_abs_diff_eq!(*value, 30.0 + pattern[(80 + h) % 4], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_predict_before_train() {
        let model = ExponentialSmoothing::default();
        assert!(!model.is_trained());
        assert!(matches!(
            model.predict(3),
            Err(ForecastError::ModelNotTrained(ModelKind::Smoothing))
        ));
    }

    #[test]
    fn test_failed_retrain_clears_fit() {
        let mut model = ExponentialSmoothing::default();
        model.train(&series(&[100.0; 40])).unwrap();
        assert!(model.is_trained());

        assert!(model.train(&series(&[0.0; 40])).is_err());
        assert!(!model.is_trained());
        assert!(matches!(
            model.predict(3),
            Err(ForecastError::ModelNotTrained(ModelKind::Smoothing))
        ));
    }

    #[test]
    fn test_degenerate_and_short_input() {
        let mut model = ExponentialSmoothing::default();
        assert!(matches!(
            model.train(&series(&[0.0; 40])),
            Err(ForecastError::Training { .. })
        ));
        assert!(matches!(
            model.train(&series(&[1.0; 5])),
            Err(ForecastError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_grid_search_respects_fixed_weights() {
        let (params, sse) =
            grid_search([true, false, false], |p| Some((p.alpha - 0.33).powi(2))).unwrap();
        assert_abs_diff_eq!(params.alpha, 0.33, epsilon = 1e-9);
        assert_eq!(params.beta, 0.0);
        assert_eq!(params.gamma, 0.0);
        assert!(sse < 1e-12);
    }
}
