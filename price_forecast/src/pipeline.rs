//! End-to-end request handling: fetch, prepare, select, advise

use crate::advisor::TradeAdvisor;
use crate::config::ForecastConfig;
use crate::data::prepare_series;
use crate::error::{ForecastError, Result};
use crate::provider::{PriceProvider, DEFAULT_LOOKBACK_DAYS};
use crate::report::ForecastReport;
use crate::selector::{Horizon, ModelSelector};
use tracing::info;

/// A single forecast request
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub symbol: String,
    pub horizon: usize,
    /// Optional investment amount used for the payout figure
    pub amount: Option<f64>,
    pub lookback_days: u32,
}

impl ForecastRequest {
    pub fn new(symbol: impl Into<String>, horizon: usize) -> Self {
        Self {
            symbol: symbol.into(),
            horizon,
            amount: None,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }
}

/// Runs requests against a price provider. Holds no state between requests.
#[derive(Debug)]
pub struct ForecastPipeline<P> {
    provider: P,
    config: ForecastConfig,
    advisor: TradeAdvisor,
}

impl<P: PriceProvider> ForecastPipeline<P> {
    pub fn new(provider: P, config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            config,
            advisor: TradeAdvisor::new(),
        })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Handle one request with freshly built models
    pub fn run(&self, request: &ForecastRequest) -> Result<ForecastReport> {
        let horizon = Horizon::new(request.horizon, self.config.max_horizon)?;
        if let Some(amount) = request.amount {
            if !(amount.is_finite() && amount > 0.0) {
                return Err(ForecastError::InvalidParameter(format!(
                    "Investment amount must be positive, got {}",
                    amount
                )));
            }
        }

        let raw = self
            .provider
            .fetch(&request.symbol, request.lookback_days)?
            .ok_or_else(|| ForecastError::UnknownSymbol(request.symbol.clone()))?;

        let mut selector = ModelSelector::new(&self.config)?;
        let series = prepare_series(raw, selector.min_observations())?;
        info!(
            "Forecasting {} for {} days from {} observations",
            request.symbol,
            horizon.days(),
            series.len()
        );

        let outcome = selector.run(&series, horizon)?;
        let recommendation = self.advisor.advise(&outcome.forecast, &outcome.history);
        match &recommendation {
            Some(advice) => info!("{}: {}", request.symbol, advice),
            None => info!("{}: no profitable exit in the forecast", request.symbol),
        }

        Ok(ForecastReport::new(
            &request.symbol,
            outcome,
            recommendation,
            request.amount,
        ))
    }
}
