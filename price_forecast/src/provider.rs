//! Price data providers
//!
//! A provider hands back the raw daily closes for a symbol over a lookback
//! window, or `None` when it knows nothing about the symbol.

use crate::data::PricePoint;
use crate::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};
use polars::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Two years of calendar days
pub const DEFAULT_LOOKBACK_DAYS: u32 = 730;

/// Source of daily closing prices
pub trait PriceProvider: Send + Sync {
    /// Fetch the closes of `symbol` within `lookback_days` of its latest observation
    fn fetch(&self, symbol: &str, lookback_days: u32) -> Result<Option<Vec<PricePoint>>>;
}

/// Reads `<dir>/<SYMBOL>.csv` files
#[derive(Debug, Clone)]
pub struct CsvPriceProvider {
    dir: PathBuf,
}

impl CsvPriceProvider {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the file holding `symbol`. Symbols that could leave `dir` are rejected.
    pub fn path_for(&self, symbol: &str) -> Result<PathBuf> {
        let symbol = symbol.trim();
        if symbol.is_empty()
            || symbol.starts_with('.')
            || symbol.contains(|c: char| c == '/' || c == '\\' || c.is_control())
        {
            return Err(ForecastError::InvalidParameter(format!(
                "Invalid symbol '{}'",
                symbol
            )));
        }
        Ok(self.dir.join(format!("{}.csv", symbol.to_uppercase())))
    }

    /// Load every row of a CSV price file
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<PricePoint>> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        let date_column = Self::detect_date_column(&df)?;
        let close_column = Self::detect_close_column(&df)?;
        debug!(
            "Using columns '{}' (date) and '{}' (close)",
            date_column, close_column
        );

        let dates = df.column(&date_column)?.cast(&DataType::Utf8)?;
        let closes = df.column(&close_column)?.cast(&DataType::Float64)?;

        dates
            .utf8()?
            .into_iter()
            .zip(closes.f64()?.into_iter())
            .enumerate()
            .filter_map(|(row, (date, close))| {
                // Rows without a date carry nothing to forecast from
                date.map(|d| {
                    parse_date(d)
                        .map(|date| PricePoint::new(date, close.unwrap_or(f64::NAN)))
                        .ok_or_else(|| {
                            ForecastError::DataError(format!(
                                "Unparseable date '{}' in row {}",
                                d,
                                row + 1
                            ))
                        })
                })
            })
            .collect()
    }

    fn detect_date_column(df: &DataFrame) -> Result<String> {
        let column_names = df.get_column_names();

        for name in &column_names {
            let lower_name = name.to_lowercase();
            if lower_name.contains("date") || lower_name.contains("time") {
                return Ok(name.to_string());
            }
        }

        if let Some(first_col) = df.get_columns().first() {
            if first_col.dtype().is_temporal() {
                return Ok(first_col.name().to_string());
            }
        }

        Err(ForecastError::DataError(
            "No date column found in data".to_string(),
        ))
    }

    fn detect_close_column(df: &DataFrame) -> Result<String> {
        let column_names = df.get_column_names();
        let lowered: Vec<String> = column_names
            .iter()
            .map(|name| name.trim().to_lowercase())
            .collect();

        ["close", "adj close", "price"]
            .iter()
            .find_map(|wanted| lowered.iter().position(|name| name == wanted))
            .map(|idx| column_names[idx].to_string())
            .ok_or_else(|| {
                ForecastError::DataError(format!(
                    "No close or price column among {:?}",
                    column_names
                ))
            })
    }
}

impl PriceProvider for CsvPriceProvider {
    fn fetch(&self, symbol: &str, lookback_days: u32) -> Result<Option<Vec<PricePoint>>> {
        let path = self.path_for(symbol)?;
        if !path.is_file() {
            info!("No price file for {} at {}", symbol, path.display());
            return Ok(None);
        }

        let rows = Self::read_file(&path)?;
        let kept = within_lookback(rows, lookback_days);
        info!("Loaded {} rows for {} from {}", kept.len(), symbol, path.display());

        if kept.is_empty() {
            return Ok(None);
        }
        Ok(Some(kept))
    }
}

/// Provider backed by a map, keyed by upper-case symbol
#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceProvider {
    series: HashMap<String, Vec<PricePoint>>,
}

impl InMemoryPriceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: &str, points: Vec<PricePoint>) -> Self {
        self.series.insert(symbol.trim().to_uppercase(), points);
        self
    }
}

impl PriceProvider for InMemoryPriceProvider {
    fn fetch(&self, symbol: &str, lookback_days: u32) -> Result<Option<Vec<PricePoint>>> {
        Ok(self
            .series
            .get(&symbol.trim().to_uppercase())
            .map(|points| within_lookback(points.clone(), lookback_days)))
    }
}

/// Keep rows dated after `latest - lookback_days`. A window reaching past the
/// earliest representable date keeps every row.
fn within_lookback(rows: Vec<PricePoint>, lookback_days: u32) -> Vec<PricePoint> {
    let Some(latest) = rows.iter().map(|p| p.date).max() else {
        return rows;
    };
    match latest.checked_sub_days(Days::new(u64::from(lookback_days))) {
        Some(cutoff) => rows.into_iter().filter(|p| p.date > cutoff).collect(),
        None => rows,
    }
}

/// Parse `YYYY-MM-DD`, ignoring any time-of-day suffix
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let day_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_variants() {
        assert_eq!(parse_date("2024-03-05"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date(" 2024-03-05 00:00:00-05:00"), Some(day(2024, 3, 5)));
        assert_eq!(parse_date("05/03/2024"), None);
    }

    #[test]
    fn test_within_lookback() {
        let rows = vec![
            PricePoint::new(day(2024, 1, 1), 1.0),
            PricePoint::new(day(2024, 1, 10), 2.0),
            PricePoint::new(day(2024, 1, 11), 3.0),
        ];
        let kept = within_lookback(rows, 5);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].close, 2.0);
    }

    #[test]
    fn test_huge_lookback_keeps_everything() {
        let rows = vec![
            PricePoint::new(day(1990, 1, 1), 1.0),
            PricePoint::new(day(2024, 1, 11), 3.0),
        ];
        assert_eq!(within_lookback(rows.clone(), u32::MAX), rows);

        let provider = InMemoryPriceProvider::new().with_series("ACME", rows);
        assert_eq!(provider.fetch("ACME", u32::MAX).unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_path_for_rejects_escaping_symbols() {
        let provider = CsvPriceProvider::new("data");

        assert_eq!(
            provider.path_for(" brk.b ").unwrap(),
            Path::new("data").join("BRK.B.csv")
        );
        for symbol in ["../secret", "a/b", "a\\b", "..", ""] {
            assert!(matches!(
                provider.path_for(symbol),
                Err(ForecastError::InvalidParameter(_))
            ));
            assert!(provider.fetch(symbol, 30).is_err());
        }
    }

    #[test]
    fn test_in_memory_provider_is_case_insensitive() {
        let provider = InMemoryPriceProvider::new()
            .with_series("aapl", vec![PricePoint::new(day(2024, 1, 1), 10.0)]);

        assert!(provider.fetch("AAPL", 30).unwrap().is_some());
        assert!(provider.fetch("MSFT", 30).unwrap().is_none());
    }
}
