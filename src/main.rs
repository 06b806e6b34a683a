use analytics::StatisticalSummary;
use anyhow::{Context, Result};
use calculator::{Aggregator, Fixture, MetricCalculator, RangeValidator};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use configuration::{load_config, SeasonalMode, Settings, DEFAULT_CONFIG_FILE};
use core_types::{
    AggregationFunction, ForecastMethod, Granularity, MetricResult, MetricType, PeriodWindow,
    SystemClock,
};
use forecasting::{ForecastEngine, MetricForecast};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

/// Hospitality metric calculation and forecasting.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Print machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe a sequence of values (mean, median, quartiles, skewness, ...).
    Stats(StatsArgs),
    /// Forecast future periods of a historical series.
    Forecast(ForecastArgs),
    /// Calculate a metric from a JSON fixture of samples and measures.
    Calculate(CalculateArgs),
}

#[derive(Parser)]
struct StatsArgs {
    /// Comma-separated values (e.g., "12.5,13,11.75").
    #[arg(long, value_delimiter = ',', required = true)]
    values: Vec<Decimal>,
}

#[derive(Parser)]
struct ForecastArgs {
    /// Comma-separated historical values, oldest first.
    #[arg(long, value_delimiter = ',', required = true)]
    values: Vec<Decimal>,
    /// Number of future periods to project.
    #[arg(long, default_value_t = 7)]
    horizon: usize,
    /// Force a method (e.g., "DOUBLE_EXPONENTIAL_SMOOTHING") instead of selecting one.
    #[arg(long)]
    method: Option<ForecastMethod>,
    /// Overrides the configured Holt-Winters seasonal mode.
    #[arg(long, value_enum)]
    seasonal_mode: Option<SeasonalMode>,
}

#[derive(Parser)]
struct CalculateArgs {
    /// The JSON fixture holding stored samples, observations and measures.
    #[arg(long, short)]
    fixture: PathBuf,
    /// The metric code (e.g., "OCCUPANCY_RATE").
    #[arg(long)]
    metric: MetricType,
    /// Entity ids. Several ids require `--aggregate`.
    #[arg(long = "entity", required = true)]
    entities: Vec<Uuid>,
    /// The start date of the window (format: YYYY-MM-DD).
    #[arg(long)]
    from: NaiveDate,
    /// The end date of the window, exclusive (format: YYYY-MM-DD).
    #[arg(long)]
    to: NaiveDate,
    #[arg(long, default_value = "daily")]
    granularity: Granularity,
    /// Combine the entities with sum, average, median, min, max or count.
    #[arg(long)]
    aggregate: Option<AggregationFunction>,
    /// Print a trailing moving average over this many periods instead.
    #[arg(long)]
    rolling: Option<usize>,
    /// Write valid results back to the in-memory store.
    #[arg(long)]
    store: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let settings = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from '{}'", cli.config))?;

    match cli.command {
        Commands::Stats(args) => handle_stats(args, cli.json)?,
        Commands::Forecast(args) => handle_forecast(args, settings, cli.json)?,
        Commands::Calculate(args) => handle_calculate(args, settings, cli.json).await?,
    }

    Ok(())
}

/// The handler for the `stats` command.
fn handle_stats(args: StatsArgs, json: bool) -> Result<()> {
    let summary = StatisticalSummary::from_values(&args.values, Utc::now());
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Statistic", "Value"]);
    let rows = [
        ("Sample size", Decimal::from(summary.sample_size)),
        ("Mean", summary.mean),
        ("Median", summary.median),
        ("Mode", summary.mode),
        ("Variance", summary.variance),
        ("Standard deviation", summary.standard_deviation),
        ("Min", summary.min),
        ("Max", summary.max),
        ("Range", summary.range),
        ("Q1", summary.q1),
        ("Q3", summary.q3),
        ("IQR", summary.iqr),
        ("Skewness", summary.skewness),
        ("Excess kurtosis", summary.kurtosis),
    ];
    for (name, value) in rows {
        table.add_row(vec![name.to_string(), value.to_string()]);
    }
    println!("{table}");
    Ok(())
}

/// The handler for the `forecast` command.
fn handle_forecast(args: ForecastArgs, mut settings: Settings, json: bool) -> Result<()> {
    if let Some(mode) = args.seasonal_mode {
        settings.forecast.seasonal_mode = mode;
    }
    let engine = ForecastEngine::new(settings.forecast).context("Failed to build the forecast engine")?;

    let forecast = match args.method {
        Some(method) => engine
            .forecast_with(method, &args.values, args.horizon)
            .with_context(|| format!("Forecasting with {method} failed"))?,
        None => engine.forecast(&args.values, args.horizon),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&forecast)?);
        return Ok(());
    }
    print_forecast(&forecast);
    Ok(())
}

fn print_forecast(forecast: &MetricForecast) {
    println!(
        "Method: {} | accuracy {} | confidence {} | back-test {} | trend: {} | seasonality: {}",
        forecast.method_used,
        forecast.accuracy_score,
        forecast.confidence_score,
        forecast.backtest_score,
        forecast.has_trend,
        forecast.has_seasonality,
    );
    if forecast.method_used == ForecastMethod::InsufficientData {
        println!(
            "Only {} historical values; nothing to project.",
            forecast.historical_sample_count
        );
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Period", "Forecast", "80% low", "80% high", "95% low", "95% high",
    ]);
    for interval in &forecast.confidence_intervals {
        table.add_row(vec![
            interval.period.to_string(),
            interval.forecast_value.to_string(),
            interval.confidence_80_lower.to_string(),
            interval.confidence_80_upper.to_string(),
            interval.confidence_95_lower.to_string(),
            interval.confidence_95_upper.to_string(),
        ]);
    }
    println!("{table}");
}

/// The handler for the `calculate` command.
async fn handle_calculate(args: CalculateArgs, settings: Settings, json: bool) -> Result<()> {
    let raw = std::fs::read_to_string(&args.fixture)
        .with_context(|| format!("Failed to read fixture at {:?}", &args.fixture))?;
    let fixture: Fixture = serde_json::from_str(&raw).context("Failed to parse fixture")?;
    let (store, source) = fixture.into_collaborators();

    let start = args.from.and_hms_opt(0, 0, 0).context("Invalid start date")?.and_utc();
    let end = args.to.and_hms_opt(0, 0, 0).context("Invalid end date")?.and_utc();
    let window = PeriodWindow::new(start, end, args.granularity)?;

    let calculator = Arc::new(MetricCalculator::new(
        &settings,
        Arc::new(store),
        Arc::new(source),
        Arc::new(RangeValidator),
        Arc::new(SystemClock),
    )?);

    let results = match (args.aggregate, args.rolling) {
        (Some(function), _) => {
            Aggregator::new(Arc::clone(&calculator))
                .aggregate(&[args.metric], &args.entities, &window, function)
                .await
        }
        (None, _) if args.entities.len() > 1 => {
            anyhow::bail!("Several entities were given; pass --aggregate to combine them");
        }
        (None, Some(points)) => {
            calculator.rolling_average(args.metric, args.entities[0], &window, points).await?
        }
        (None, None) if args.store => {
            vec![calculator.calculate_and_store(args.metric, args.entities[0], &window).await]
        }
        (None, None) => vec![calculator.calculate(args.metric, args.entities[0], &window).await.result],
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    print_results(&results);
    Ok(())
}

fn print_results(results: &[MetricResult]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Metric", "Period", "Value", "Unit", "Quality", "Confidence", "Method", "Samples", "Notes",
    ]);
    for result in results {
        table.add_row(vec![
            result.metric_type.to_string(),
            format!("{} .. {}", result.period_start.date_naive(), result.period_end.date_naive()),
            result.formatted_value.clone(),
            result.unit.clone(),
            result.quality_score.to_string(),
            result.confidence_score.to_string(),
            format!("{:?}", result.calculation_method),
            result.sample_count.to_string(),
            result.notes.clone().unwrap_or_default(),
        ]);
    }
    println!("{table}");
}
