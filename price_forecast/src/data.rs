//! Daily closing-price series and the series preparer

use crate::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One daily observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Chronologically ordered daily closes.
///
/// Dates are strictly increasing and every close is finite. Positivity is not
/// enforced here: the models decide whether a series is usable.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
}

impl PriceSeries {
    /// Build a series from points that are already ordered
    pub fn new(points: Vec<PricePoint>) -> Result<Self> {
        let mut dates = Vec::with_capacity(points.len());
        let mut closes = Vec::with_capacity(points.len());

        for point in points {
            if !point.close.is_finite() {
                return Err(ForecastError::DataError(format!(
                    "Non-finite close {} on {}",
                    point.close, point.date
                )));
            }
            if let Some(&previous) = dates.last() {
                if point.date <= previous {
                    return Err(ForecastError::DataError(format!(
                        "Dates must be strictly increasing: {} follows {}",
                        point.date, previous
                    )));
                }
            }
            dates.push(point.date);
            closes.push(point.close);
        }

        Ok(Self { dates, closes })
    }

    /// Build a series of consecutive calendar days starting at `start`
    pub fn from_closes(start: NaiveDate, closes: &[f64]) -> Result<Self> {
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                start
                    .checked_add_days(Days::new(i as u64))
                    .map(|date| PricePoint::new(date, close))
                    .ok_or_else(|| {
                        ForecastError::DataError(format!("Date overflow after {}", start))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(points)
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// The last `n` observations (all of them when the series is shorter)
    pub fn tail(&self, n: usize) -> HistoricalTail {
        let start = self.len().saturating_sub(n);
        HistoricalTail {
            dates: self.dates[start..].to_vec(),
            values: self.closes[start..].to_vec(),
        }
    }

    /// Split the closes by position into a leading and a trailing part.
    ///
    /// Both parts are non-empty whenever the series has at least two values.
    pub fn split_at_ratio(&self, ratio: f64) -> (&[f64], &[f64]) {
        let at = split_index(self.len(), ratio);
        self.closes.split_at(at)
    }

    /// Iterate over the observations as points
    pub fn points(&self) -> impl Iterator<Item = PricePoint> + '_ {
        self.dates
            .iter()
            .zip(&self.closes)
            .map(|(&date, &close)| PricePoint::new(date, close))
    }
}

/// Index separating training and validation values for a series of `len`
pub(crate) fn split_index(len: usize, ratio: f64) -> usize {
    if len < 2 {
        return len;
    }
    ((len as f64 * ratio).floor() as usize).clamp(1, len - 1)
}

/// Trailing observations returned alongside a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalTail {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl HistoricalTail {
    /// Anchor price for recommendations: the second-to-last observation
    pub fn reference_price(&self) -> Option<f64> {
        self.values.len().checked_sub(2).map(|i| self.values[i])
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Turn raw provider rows into a clean series.
///
/// Rows with a non-finite close are dropped, the rest are sorted by date and
/// duplicate dates collapse to the row that came last in the input. Fails when
/// fewer than `min_observations` rows survive.
pub fn prepare_series(raw: Vec<PricePoint>, min_observations: usize) -> Result<PriceSeries> {
    let received = raw.len();
    let mut rows: Vec<PricePoint> = raw.into_iter().filter(|p| p.close.is_finite()).collect();
    let finite = rows.len();

    // Stable sort keeps input order within a date, so the last duplicate is the newest row
    rows.sort_by_key(|p| p.date);
    let mut cleaned: Vec<PricePoint> = Vec::with_capacity(rows.len());
    for row in rows {
        match cleaned.last_mut() {
            Some(last) if last.date == row.date => *last = row,
            _ => cleaned.push(row),
        }
    }

    debug!(
        received,
        dropped_non_finite = received - finite,
        dropped_duplicates = finite - cleaned.len(),
        kept = cleaned.len(),
        "Prepared price series"
    );

    if cleaned.len() < min_observations {
        return Err(ForecastError::insufficient(
            "price series",
            min_observations,
            cleaned.len(),
        ));
    }

    PriceSeries::new(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_prepare_sorts_and_deduplicates() {
        let raw = vec![
            PricePoint::new(day(3), 103.0),
            PricePoint::new(day(1), 101.0),
            PricePoint::new(day(2), 102.0),
            PricePoint::new(day(1), 111.0),
            PricePoint::new(day(4), f64::NAN),
        ];

        let series = prepare_series(raw, 1).unwrap();

        assert_eq!(series.dates(), &[day(1), day(2), day(3)]);
        assert_eq!(series.closes(), &[111.0, 102.0, 103.0]);
    }

    #[test]
    fn test_prepare_rejects_short_series() {
        let raw = vec![PricePoint::new(day(1), 1.0), PricePoint::new(day(2), 2.0)];
        match prepare_series(raw, 3) {
            Err(ForecastError::InsufficientData {
                required, actual, ..
            }) => {
                assert_eq!(required, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_prepare_keeps_non_positive_values() {
        let raw = (1..=5).map(|d| PricePoint::new(day(d), 0.0)).collect();
        let series = prepare_series(raw, 5).unwrap();
        assert_eq!(series.closes(), &[0.0; 5]);
    }

    #[test]
    fn test_series_rejects_unordered_points() {
        let points = vec![PricePoint::new(day(2), 1.0), PricePoint::new(day(2), 2.0)];
        assert!(PriceSeries::new(points).is_err());
    }

    #[test]
    fn test_tail_and_reference_price() {
        let closes: Vec<f64> = (1..=40).map(f64::from).collect();
        let series = PriceSeries::from_closes(day(1), &closes).unwrap();

        let tail = series.tail(30);
        assert_eq!(tail.len(), 30);
        assert_eq!(tail.values[0], 11.0);
        assert_eq!(tail.reference_price(), Some(39.0));
        assert_eq!(tail.last_date(), series.last_date());

        let short = PriceSeries::from_closes(day(1), &[5.0]).unwrap().tail(30);
        assert_eq!(short.reference_price(), None);
    }

    #[test]
    fn test_split_at_ratio() {
        let closes: Vec<f64> = (0..10).map(f64::from).collect();
        let series = PriceSeries::from_closes(day(1), &closes).unwrap();

        let (train, valid) = series.split_at_ratio(0.8);
        assert_eq!(train.len(), 8);
        assert_eq!(valid, &[8.0, 9.0]);

        assert_eq!(split_index(10, 0.01), 1);
        assert_eq!(split_index(10, 0.99), 9);
    }
}
