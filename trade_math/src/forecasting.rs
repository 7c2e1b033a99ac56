//! Exponential smoothing state machines
//!
//! Contains:
//! - Holt's linear method (level + optional additive trend)
//! - Holt-Winters additive method (level + optional trend + additive season)
//!
//! Both update in error-correction form: every state moves by a multiple of the
//! one-step error, so a series the model already explains exactly (constant or
//! perfectly linear) leaves the state untouched bit for bit.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Smoothing weights for level (`alpha`), trend (`beta`) and season (`gamma`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl SmoothingParams {
    /// Create a parameter set, each weight must lie in [0, 1]
    pub fn new(alpha: f64, beta: f64, gamma: f64) -> Result<Self> {
        for (name, value) in [("alpha", alpha), ("beta", beta), ("gamma", gamma)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MathError::InvalidInput(format!(
                    "{} must be between 0 and 1 (inclusive), got {}",
                    name, value
                )));
            }
        }

        Ok(Self { alpha, beta, gamma })
    }
}

/// Holt's linear method. With `trend` disabled this is simple exponential smoothing.
#[derive(Debug, Clone)]
pub struct HoltLinear {
    alpha: f64,
    beta: f64,
    trend_enabled: bool,
    level: Option<f64>,
    trend: Option<f64>,
    values_seen: usize,
}

impl HoltLinear {
    /// Create a new smoother
    pub fn new(params: SmoothingParams, trend_enabled: bool) -> Self {
        Self {
            alpha: params.alpha,
            beta: params.beta,
            trend_enabled,
            level: None,
            trend: None,
            values_seen: 0,
        }
    }

    /// Number of observations before the first one-step error is produced
    pub fn warmup(trend_enabled: bool) -> usize {
        if trend_enabled {
            2
        } else {
            1
        }
    }

    /// Feed one observation. Returns the one-step-ahead error once warmed up.
    pub fn update(&mut self, value: f64) -> Result<Option<f64>> {
        if !value.is_finite() {
            return Err(MathError::InvalidInput(format!(
                "Cannot smooth non-finite value {}",
                value
            )));
        }
        self.values_seen += 1;

        match (self.level, self.trend) {
            (None, _) => {
                self.level = Some(value);
                if !self.trend_enabled {
                    self.trend = Some(0.0);
                }
                Ok(None)
            }
            (Some(first), None) => {
                // Second observation seeds the trend
                self.trend = Some(value - first);
                self.level = Some(value);
                Ok(None)
            }
            (Some(level), Some(trend)) => {
                let predicted = level + trend;
                let error = value - predicted;
                let new_level = predicted + self.alpha * error;
                let new_trend = if self.trend_enabled {
                    trend + self.beta * (new_level - level - trend)
                } else {
                    0.0
                };

                self.level = Some(new_level);
                self.trend = Some(new_trend);
                Ok(Some(error))
            }
        }
    }

    /// Forecast `h` steps ahead of the last observation
    pub fn forecast(&self, h: usize) -> Result<f64> {
        match (self.level, self.trend) {
            (Some(level), Some(trend)) => Ok(level + h as f64 * trend),
            _ => Err(MathError::InsufficientData(
                "Not enough data to make a forecast".to_string(),
            )),
        }
    }

    /// Current level
    pub fn level(&self) -> Result<f64> {
        self.level.ok_or_else(|| {
            MathError::InsufficientData("Level not calculated yet".to_string())
        })
    }

    /// Current trend (always zero when the trend component is disabled)
    pub fn trend(&self) -> Result<f64> {
        self.trend.ok_or_else(|| {
            MathError::InsufficientData("Trend not calculated yet".to_string())
        })
    }

    pub fn values_seen(&self) -> usize {
        self.values_seen
    }
}

/// Holt-Winters additive seasonal method
#[derive(Debug, Clone)]
pub struct HoltWinters {
    params: SmoothingParams,
    trend_enabled: bool,
    period: usize,
    level: f64,
    trend: f64,
    /// Seasonal offsets indexed by `time % period`
    seasonal: Vec<f64>,
    /// Index of the next observation
    time: usize,
}

impl HoltWinters {
    /// Initialise from the first two full seasons of `history`.
    ///
    /// The level and trend are placed at the end of the first season and the
    /// seasonal offsets are measured against that trend line. Smoothing then
    /// continues from the first observation of the second season.
    pub fn initialize(
        params: SmoothingParams,
        period: usize,
        trend_enabled: bool,
        history: &[f64],
    ) -> Result<Self> {
        if period < 2 {
            return Err(MathError::InvalidInput(
                "Seasonal period must be at least 2".to_string(),
            ));
        }
        if history.len() < 2 * period {
            return Err(MathError::InsufficientData(format!(
                "Seasonal smoothing needs two full cycles ({} values), have {}",
                2 * period,
                history.len()
            )));
        }
        if history.iter().any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "Seasonal smoothing input contains non-finite values".to_string(),
            ));
        }

        let m = period as f64;
        let first_mean = history[..period].iter().sum::<f64>() / m;
        let second_mean = history[period..2 * period].iter().sum::<f64>() / m;
        let trend = if trend_enabled {
            (second_mean - first_mean) / m
        } else {
            0.0
        };
        let centre = (m - 1.0) / 2.0;
        let level = first_mean + trend * centre;
        let seasonal = history[..period]
            .iter()
            .enumerate()
            .map(|(i, &y)| y - (first_mean + trend * (i as f64 - centre)))
            .collect();

        Ok(Self {
            params,
            trend_enabled,
            period,
            level,
            trend,
            seasonal,
            time: period,
        })
    }

    /// Feed one observation and return its one-step-ahead error
    pub fn update(&mut self, value: f64) -> Result<f64> {
        if !value.is_finite() {
            return Err(MathError::InvalidInput(format!(
                "Cannot smooth non-finite value {}",
                value
            )));
        }

        let slot = self.time % self.period;
        let season = self.seasonal[slot];
        let base = self.level + self.trend;
        let error = value - (base + season);

        let new_level = base + self.params.alpha * error;
        if self.trend_enabled {
            self.trend += self.params.beta * (new_level - self.level - self.trend);
        }
        self.level = new_level;
        self.seasonal[slot] = season + self.params.gamma * error;
        self.time += 1;

        Ok(error)
    }

    /// Forecast `h` steps ahead of the last observation
    pub fn forecast(&self, h: usize) -> Result<f64> {
        if h == 0 {
            return Err(MathError::InvalidInput(
                "Forecast step must be at least 1".to_string(),
            ));
        }
        let slot = (self.time + h - 1) % self.period;
        Ok(self.level + h as f64 * self.trend + self.seasonal[slot])
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn trend(&self) -> f64 {
        self.trend
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn params(&self) -> SmoothingParams {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn params(alpha: f64, beta: f64, gamma: f64) -> SmoothingParams {
        SmoothingParams::new(alpha, beta, gamma).unwrap()
    }

    #[test]
    fn test_params_validation() {
        assert!(SmoothingParams::new(1.2, 0.1, 0.1).is_err());
        assert!(SmoothingParams::new(0.5, -0.1, 0.1).is_err());
        assert!(SmoothingParams::new(0.0, 1.0, 0.5).is_ok());
    }

    #[test]
    fn test_holt_linear_follows_trend() {
        let mut holt = HoltLinear::new(params(0.4, 0.3, 0.0), true);

        assert_eq!(holt.update(10.0).unwrap(), None);
        assert_eq!(holt.update(20.0).unwrap(), None);
        let error = holt.update(30.0).unwrap().unwrap();
        assert_abs_diff_eq!(error, 0.0);

        assert_abs_diff_eq!(holt.level().unwrap(), 30.0);
        assert_abs_diff_eq!(holt.trend().unwrap(), 10.0);
        assert_abs_diff_eq!(holt.forecast(2).unwrap(), 50.0);
    }

    #[test]
    fn test_holt_without_trend_is_simple_smoothing() {
        let mut holt = HoltLinear::new(params(0.3, 0.9, 0.0), false);

        holt.update(10.0).unwrap();
        let error = holt.update(20.0).unwrap().unwrap();
        assert_abs_diff_eq!(error, 10.0);

        // level = 10 + 0.3 * 10
        assert_abs_diff_eq!(holt.level().unwrap(), 13.0);
        assert_abs_diff_eq!(holt.forecast(5).unwrap(), 13.0);
    }

    #[test]
    fn test_holt_winters_constant_series_is_exact() {
        let history = vec![100.0; 24];
        let mut hw = HoltWinters::initialize(params(0.15, 0.05, 0.35), 12, true, &history).unwrap();
        for _ in 0..50 {
            assert_eq!(hw.update(100.0).unwrap(), 0.0);
        }

        for h in 1..=31 {
            assert_eq!(hw.forecast(h).unwrap(), 100.0);
        }
    }

    #[test]
    fn test_holt_winters_recovers_linear_trend() {
        let series: Vec<f64> = (0..60).map(|i| 50.0 + 2.0 * i as f64).collect();
        let mut hw = HoltWinters::initialize(params(0.5, 0.1, 0.1), 6, true, &series).unwrap();
        for &y in &series[6..] {
            let error = hw.update(y).unwrap();
            assert_abs_diff_eq!(error, 0.0, epsilon = 1e-9);
        }

        assert_abs_diff_eq!(hw.forecast(1).unwrap(), 170.0, epsilon = 1e-9);
        assert_abs_diff_eq!(hw.forecast(10).unwrap(), 188.0, epsilon = 1e-9);
    }

    #[test]
    fn test_holt_winters_tracks_season() {
        let pattern = [1.0, -1.0, 2.0, -2.0];
        let series: Vec<f64> = (0..40).map(|i| 20.0 + pattern[i % 4]).collect();
        let mut hw = HoltWinters::initialize(params(0.2, 0.0, 0.2), 4, false, &series).unwrap();
        for &y in &series[4..] {
            hw.update(y).unwrap();
        }

        for h in 1..=4 {
            assert_abs_diff_eq!(hw.forecast(h).unwrap(), 20.0 + pattern[(40 + h - 1) % 4], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_holt_winters_needs_two_cycles() {
        let short = vec![1.0; 10];
        assert!(matches!(
            HoltWinters::initialize(params(0.5, 0.5, 0.5), 6, true, &short),
            Err(MathError::InsufficientData(_))
        ));
        assert!(HoltWinters::initialize(params(0.5, 0.5, 0.5), 1, true, &short).is_err());
    }
}
