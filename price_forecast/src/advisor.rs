//! Buy/hold advice derived from a forecast

use crate::data::HistoricalTail;
use crate::models::ForecastResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Advice to buy now and sell on `exit_day`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// 1-based forecast day on which the peak is expected
    pub exit_day: usize,
    /// Forecast peak divided by the reference price
    pub profit_ratio: f64,
}

impl Recommendation {
    /// Expected return in percent
    pub fn percent_profit(&self) -> f64 {
        (self.profit_ratio - 1.0) * 100.0
    }

    /// Value of `amount` invested at the reference price and sold at the peak
    pub fn payout(&self, amount: f64) -> f64 {
        amount * self.profit_ratio
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "buy now, sell on day {} for an expected {:+.2}%",
            self.exit_day,
            self.percent_profit()
        )
    }
}

/// Turns a forecast into a recommendation
#[derive(Debug, Clone, Copy, Default)]
pub struct TradeAdvisor;

impl TradeAdvisor {
    pub fn new() -> Self {
        Self
    }

    /// Compare the forecast peak with the reference price of `history`.
    ///
    /// The reference is the second-to-last historical close, not the last one.
    /// Returns `None` when the peak does not exceed it or when there is no
    /// reference to compare against.
    pub fn advise(
        &self,
        forecast: &ForecastResult,
        history: &HistoricalTail,
    ) -> Option<Recommendation> {
        let reference = history.reference_price()?;
        let (exit_day, peak) = forecast.peak()?;

        if !(reference > 0.0) || peak <= reference {
            debug!(
                "No recommendation: peak {:.4} on day {} vs reference {:.4}",
                peak, exit_day, reference
            );
            return None;
        }

        Some(Recommendation {
            exit_day,
            profit_ratio: peak / reference,
        })
    }
}
