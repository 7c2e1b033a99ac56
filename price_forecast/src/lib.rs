//! # Price Forecast
//!
//! Multi-model forecasting of a stock's daily closing price.
//!
//! ## Features
//!
//! - Series preparation (ordering, de-duplication, cleaning of provider rows)
//! - Three forecasting models behind one `ForecastModel` trait:
//!   exponential smoothing (ETS), a lagged-feature random forest and a
//!   recurrent network (RNN)
//! - Best-model selection by held-out RMSE, with failed models excluded
//! - Buy/hold advice from the forecast peak
//! - CSV price provider and TOML configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use price_forecast::{CsvPriceProvider, ForecastConfig, ForecastPipeline, ForecastRequest};
//!
//! let pipeline = ForecastPipeline::new(CsvPriceProvider::new("data"), ForecastConfig::default())?;
//! let report = pipeline.run(&ForecastRequest::new("AAPL", 10).with_amount(1000.0))?;
//!
//! println!("{}", report.summary());
//! # Ok::<(), price_forecast::ForecastError>(())
//! ```

pub mod advisor;
pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod provider;
pub mod report;
pub mod selector;

// Re-export commonly used types
pub use crate::advisor::{Recommendation, TradeAdvisor};
pub use crate::config::ForecastConfig;
pub use crate::data::{prepare_series, HistoricalTail, PricePoint, PriceSeries};
pub use crate::error::{ForecastError, Result};
pub use crate::models::{ForecastModel, ForecastResult, ModelKind};
pub use crate::pipeline::{ForecastPipeline, ForecastRequest};
pub use crate::provider::{CsvPriceProvider, InMemoryPriceProvider, PriceProvider};
pub use crate::report::ForecastReport;
pub use crate::selector::{EvaluationResult, Horizon, ModelSelector, SelectionOutcome};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
