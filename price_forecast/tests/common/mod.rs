#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use price_forecast::config::{RecurrentConfig, RegressionConfig};
use price_forecast::{ForecastConfig, PricePoint, PriceSeries};

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
}

pub fn points(closes: &[f64]) -> Vec<PricePoint> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PricePoint::new(start_date() + Duration::days(i as i64), close))
        .collect()
}

pub fn series(closes: &[f64]) -> PriceSeries {
    PriceSeries::from_closes(start_date(), closes).unwrap()
}

/// 100.0 to 200.0 over 400 days
pub fn rising(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + 100.0 * i as f64 / (n - 1) as f64)
        .collect()
}

pub fn wave(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 50.0 + 5.0 * (i as f64 * 0.3).sin() + 0.02 * i as f64)
        .collect()
}

/// Defaults shrunk so the network and forest train quickly
pub fn quick_config() -> ForecastConfig {
    ForecastConfig {
        regression: RegressionConfig {
            n_trees: 20,
            max_depth: 6,
            ..RegressionConfig::default()
        },
        recurrent: RecurrentConfig {
            window: 10,
            hidden_units: 8,
            layers: 1,
            epochs: 5,
            batch_size: 16,
            learning_rate: 0.01,
            ..RecurrentConfig::default()
        },
        ..ForecastConfig::default()
    }
}
