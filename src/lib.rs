//! # Stock Forecast
//!
//! Workspace facade over the closing-price forecaster (`price_forecast`) and
//! its numeric building blocks (`trade_math`).
//!
//! ## Example
//!
//! ```
//! use stock_forecast_workspace::forecast::{ForecastResult, HistoricalTail, ModelKind, TradeAdvisor};
//! use chrono::NaiveDate;
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let history = HistoricalTail {
//!     dates: vec![start, start.succ_opt().unwrap()],
//!     values: vec![100.0, 104.0],
//! };
//! let forecast = ForecastResult::new(ModelKind::Smoothing, vec![103.0, 110.0]);
//!
//! let advice = TradeAdvisor::new().advise(&forecast, &history).unwrap();
//! assert_eq!(advice.exit_day, 2);
//! ```

/// Forecasting pipeline, models and advice
pub use price_forecast as forecast;

/// Smoothing, scaling, moving averages and accuracy metrics
pub use trade_math as math;
