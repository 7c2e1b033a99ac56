//! Forecast report handed to the presentation layer

use crate::advisor::Recommendation;
use crate::data::HistoricalTail;
use crate::models::ModelKind;
use crate::selector::{EvaluationResult, SelectionOutcome};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// One forecast day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Offset from the last observation, starting at 1
    pub day: usize,
    pub date: Option<NaiveDate>,
    pub price: f64,
}

/// Everything a request produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub symbol: String,
    pub best_model: ModelKind,
    pub best_rmse: f64,
    pub scores: EvaluationResult,
    pub forecast: Vec<ForecastPoint>,
    pub history: HistoricalTail,
    pub recommendation: Option<Recommendation>,
    pub amount: Option<f64>,
    /// Value of `amount` at the forecast peak, when a recommendation exists
    pub payout: Option<f64>,
}

impl ForecastReport {
    pub fn new(
        symbol: &str,
        outcome: SelectionOutcome,
        recommendation: Option<Recommendation>,
        amount: Option<f64>,
    ) -> Self {
        let last_date = outcome.history.last_date();
        let forecast = outcome
            .forecast
            .values
            .iter()
            .enumerate()
            .map(|(i, &price)| ForecastPoint {
                day: i + 1,
                date: last_date.and_then(|d| d.checked_add_days(Days::new(i as u64 + 1))),
                price,
            })
            .collect();

        Self {
            symbol: symbol.to_uppercase(),
            best_model: outcome.best,
            best_rmse: outcome.best_rmse,
            scores: outcome.scores,
            forecast,
            history: outcome.history,
            payout: recommendation.zip(amount).map(|(r, a)| r.payout(a)),
            recommendation,
            amount,
        }
    }

    pub fn forecast_values(&self) -> Vec<f64> {
        self.forecast.iter().map(|p| p.price).collect()
    }

    /// Plain-text summary
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Forecast for {}", self.symbol);
        let _ = writeln!(out, "Model scores (held-out RMSE):");
        let _ = write!(out, "{}", self.scores);
        let _ = writeln!(
            out,
            "Best model: {} (RMSE {:.4})",
            self.best_model, self.best_rmse
        );

        let history = &self.history.values;
        if let (Some(first), Some(last)) = (history.first(), history.last()) {
            let _ = writeln!(
                out,
                "Last {} closes: {:.2} .. {:.2}",
                self.history.len(),
                first,
                last
            );
        }

        let _ = writeln!(out, "Forecast:");
        for point in &self.forecast {
            match point.date {
                Some(date) => {
                    let _ = writeln!(out, "  day {:>2} {}  {:.2}", point.day, date, point.price);
                }
                None => {
                    let _ = writeln!(out, "  day {:>2}  {:.2}", point.day, point.price);
                }
            }
        }

        match &self.recommendation {
            Some(advice) => {
                let _ = writeln!(out, "Recommendation: {}", advice);
                if let (Some(amount), Some(payout)) = (self.amount, self.payout) {
                    let _ = writeln!(
                        out,
                        "Investing {:.2} is expected to return {:.2} (profit {:.2})",
                        amount,
                        payout,
                        payout - amount
                    );
                }
            }
            None => {
                let _ = writeln!(
                    out,
                    "Recommendation: do not buy, no forecast day beats the current price"
                );
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ForecastResult;
    use crate::selector::ModelScore;
    use approx::assert_abs_diff_eq;

    fn outcome() -> SelectionOutcome {
        let start = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        SelectionOutcome {
            best: ModelKind::Smoothing,
            best_rmse: 0.25,
            scores: EvaluationResult {
                scores: vec![
                    ModelScore {
                        model: ModelKind::Smoothing,
                        rmse: 0.25,
                        failure: None,
                    },
                    ModelScore {
                        model: ModelKind::Recurrent,
                        rmse: f64::INFINITY,
                        failure: Some("too short".to_string()),
                    },
                ],
            },
            forecast: ForecastResult::new(ModelKind::Smoothing, vec![11.0, 12.0]),
            history: HistoricalTail {
                dates: vec![start, start.succ_opt().unwrap()],
                values: vec![10.0, 10.5],
            },
        }
    }

    #[test]
    fn test_forecast_dates_follow_history() {
        let report = ForecastReport::new("abc", outcome(), None, None);

        assert_eq!(report.symbol, "ABC");
        assert_eq!(report.forecast[0].date, NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(report.forecast[1].date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(report.forecast_values(), vec![11.0, 12.0]);
        assert_eq!(report.payout, None);
    }

    #[test]
    fn test_summary_mentions_advice_and_payout() {
        let advice = Recommendation {
            exit_day: 2,
            profit_ratio: 1.2,
        };
        let report = ForecastReport::new("abc", outcome(), Some(advice), Some(500.0));

        assert_abs_diff_eq!(report.payout.unwrap(), 600.0, epsilon = 1e-9);
        let text = report.summary();
        assert!(text.contains("Best model: ETS"));
        assert!(text.contains("RNN"));
        assert!(text.contains("sell on day 2"));
        assert!(text.contains("600.00"));
    }

    #[test]
    fn test_json_uses_model_names() {
        let report = ForecastReport::new("abc", outcome(), None, None);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["best_model"], "ETS");
        assert!(json["recommendation"].is_null());
        assert_eq!(json["forecast"][0]["day"], 1);
    }

    #[test]
    fn test_json_round_trip_keeps_failed_scores() {
        let report = ForecastReport::new("abc", outcome(), None, Some(250.0));
        let json = serde_json::to_string(&report).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["scores"]["scores"][1]["rmse"].is_null());
        assert_eq!(value["scores"]["scores"][0]["rmse"], 0.25);

        let restored: ForecastReport = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, report);
        assert!(restored.scores.get(ModelKind::Recurrent).unwrap().is_infinite());
    }
}
