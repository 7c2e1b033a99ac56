use chrono::{Duration, NaiveDate};
use price_forecast::config::RecurrentConfig;
use price_forecast::{
    ForecastConfig, ForecastPipeline, ForecastRequest, InMemoryPriceProvider, PricePoint,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Price Forecast: Basic Forecasting Example");
    println!("=========================================\n");

    // Create sample data
    let prices = create_sample_daily_data();
    println!("Sample data created: {} daily closes\n", prices.len());

    let provider = InMemoryPriceProvider::new().with_series("DEMO", prices);

    // A lighter network keeps the example quick
    let config = ForecastConfig {
        recurrent: RecurrentConfig {
            window: 20,
            hidden_units: 16,
            layers: 1,
            epochs: 10,
            ..RecurrentConfig::default()
        },
        ..ForecastConfig::default()
    };

    let pipeline = ForecastPipeline::new(provider, config)?;
    let report = pipeline.run(&ForecastRequest::new("DEMO", 10).with_amount(1000.0))?;

    println!("{}", report.summary());
    Ok(())
}

fn create_sample_daily_data() -> Vec<PricePoint> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap_or_default();

    (0..300)
        .map(|i| {
            let t = i as f64;
            let close = 100.0 + 0.1 * t + 4.0 * (t * 0.15).sin() + 1.5 * (t * 0.9).cos();
            PricePoint::new(start + Duration::days(i), close)
        })
        .collect()
}
