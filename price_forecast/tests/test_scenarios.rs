mod common;

use common::{quick_config, rising, series, wave};
use price_forecast::config::RecurrentConfig;
use price_forecast::{ForecastConfig, ForecastError, Horizon, ModelKind, ModelSelector, TradeAdvisor};

#[test]
fn test_constant_series_gives_no_advice() {
    let mut selector = ModelSelector::new(&quick_config()).unwrap();
    let outcome = selector
        .run(&series(&[100.0; 200]), Horizon::new(10, 31).unwrap())
        .unwrap();

    // Smoothing and the forest both fit exactly; smoothing is registered first
    assert_eq!(outcome.best, ModelKind::Smoothing);
    assert_eq!(outcome.best_rmse, 0.0);
    assert!(outcome.scores.get(ModelKind::Regression).unwrap() < 1e-9);
    assert!(outcome.scores.get(ModelKind::Recurrent).unwrap().is_infinite());

    assert_eq!(outcome.forecast.horizon(), 10);
    assert!(outcome
        .forecast
        .values
        .iter()
        .all(|v| (v - 100.0).abs() < 1e-9));
    assert_eq!(TradeAdvisor::new().advise(&outcome.forecast, &outcome.history), None);
}

#[test]
fn test_rising_series_recommends_buying() {
    let closes = rising(400);
    let mut selector = ModelSelector::new(&quick_config()).unwrap();
    let outcome = selector
        .run(&series(&closes), Horizon::new(10, 31).unwrap())
        .unwrap();

    assert_eq!(outcome.best, ModelKind::Smoothing);
    let values = &outcome.forecast.values;
    assert!(values.windows(2).all(|w| w[1] > w[0]));

    let advice = TradeAdvisor::new()
        .advise(&outcome.forecast, &outcome.history)
        .expect("a rising forecast should be worth buying");
    assert_eq!(advice.exit_day, 10);
    assert!(advice.profit_ratio > 1.0);
    approx::assert_abs_diff_eq!(
        advice.profit_ratio,
        values[9] / closes[398],
        epsilon = 1e-12
    );
}

#[test]
fn test_short_series_excludes_recurrent_model() {
    // 100 values: enough for smoothing and the forest, short of 2 * 60 + 1
    let config = ForecastConfig {
        recurrent: RecurrentConfig::default(),
        ..quick_config()
    };
    let mut selector = ModelSelector::new(&config).unwrap();
    let outcome = selector
        .run(&series(&wave(100)), Horizon::new(5, 31).unwrap())
        .unwrap();

    let recurrent = outcome
        .scores
        .iter()
        .find(|s| s.model == ModelKind::Recurrent)
        .unwrap();
    assert!(recurrent.rmse.is_infinite());
    assert!(recurrent.failure.is_some());

    assert_ne!(outcome.best, ModelKind::Recurrent);
    assert!(outcome.best_rmse.is_finite());
    assert_eq!(outcome.forecast.horizon(), 5);
    assert!(outcome.forecast.values.iter().all(|v| v.is_finite()));
}

#[test]
fn test_falling_series_never_forecasts_non_positive_prices() {
    // 100 down to 5: the exact linear trend crosses zero within 31 days
    let closes: Vec<f64> = (0..200).map(|i| 100.0 - 95.0 * i as f64 / 199.0).collect();
    let mut selector = ModelSelector::new(&quick_config()).unwrap();
    let outcome = selector
        .run(&series(&closes), Horizon::new(31, 31).unwrap())
        .unwrap();

    assert_eq!(outcome.forecast.horizon(), 31);
    assert!(outcome.forecast.values.iter().all(|&v| v > 0.0));
    assert_ne!(outcome.best, ModelKind::Smoothing);
    assert!(outcome.scores.get(ModelKind::Smoothing).unwrap().is_infinite());
    assert!(outcome.best_rmse.is_finite());
}

#[test]
fn test_all_zero_series_has_no_viable_model() {
    let mut selector = ModelSelector::new(&quick_config()).unwrap();
    let result = selector.run(&series(&[0.0; 200]), Horizon::new(10, 31).unwrap());

    assert!(matches!(result, Err(ForecastError::NoViableModel(_))));
}

#[test]
fn test_parallel_training_matches_sequential() {
    let closes = wave(160);
    let sequential = ModelSelector::new(&quick_config())
        .unwrap()
        .run(&series(&closes), Horizon::new(7, 31).unwrap())
        .unwrap();

    let parallel_config = ForecastConfig {
        parallel: true,
        ..quick_config()
    };
    let parallel = ModelSelector::new(&parallel_config)
        .unwrap()
        .run(&series(&closes), Horizon::new(7, 31).unwrap())
        .unwrap();

    assert_eq!(sequential.best, parallel.best);
    assert_eq!(sequential.scores, parallel.scores);
    assert_eq!(sequential.forecast, parallel.forecast);
}
