//! Closing Price Forecaster
//!
//! Reads `<SYMBOL>.csv` from a data directory, trains every model, keeps the
//! one with the lowest held-out RMSE and prints the forecast with buy/hold advice.

use anyhow::{Context, Result};
use clap::Parser;
use price_forecast::{CsvPriceProvider, ForecastConfig, ForecastPipeline, ForecastRequest};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Multi-model closing price forecaster", long_about = None)]
struct Cli {
    /// Ticker symbol to forecast
    #[arg(short, long)]
    symbol: String,

    /// Number of days to forecast (1-31)
    #[arg(long, default_value = "10")]
    horizon: usize,

    /// Directory holding one <SYMBOL>.csv file per ticker
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Amount to invest, used for the payout figure
    #[arg(short, long)]
    amount: Option<f64>,

    /// Calendar days of history to use
    #[arg(long, default_value = "730")]
    lookback_days: u32,

    /// TOML file with model settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Write the forecast rows to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ForecastConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ForecastConfig::default(),
    };

    let pipeline = ForecastPipeline::new(CsvPriceProvider::new(&cli.data_dir), config)
        .context("Invalid configuration")?;

    let mut request =
        ForecastRequest::new(cli.symbol.as_str(), cli.horizon).with_lookback_days(cli.lookback_days);
    if let Some(amount) = cli.amount {
        request = request.with_amount(amount);
    }

    let report = pipeline
        .run(&request)
        .with_context(|| format!("Forecast for {} failed", cli.symbol))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.summary());
    }

    if let Some(path) = &cli.output {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_record(["day", "date", "forecast"])?;
        for point in &report.forecast {
            let date = point.date.map(|d| d.to_string()).unwrap_or_default();
            writer.write_record([
                point.day.to_string(),
                date,
                format!("{:.4}", point.price),
            ])?;
        }
        writer.flush()?;
        info!("Forecast written to {}", path.display());
    }

    Ok(())
}
