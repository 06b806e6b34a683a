use core_types::ForecastMethod;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// The root configuration structure for the metrics engine.
///
/// Every section falls back to its defaults, so an empty or missing file yields a
/// fully working configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub quality: QualityWeights,
    pub confidence: ConfidenceWeights,
    pub forecast: ForecastSettings,
    pub calculator: CalculatorSettings,
}

/// Weights of the quality score components. Must sum to 1.0.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub completeness: Decimal,
    pub recency: Decimal,
    pub accuracy: Decimal,
    /// Hours after which a sample no longer contributes to recency.
    pub recency_window_hours: u32,
}

/// Weights of the confidence score components. Must sum to 1.0.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub sample_size: Decimal,
    pub variance: Decimal,
    pub outlier: Decimal,
    /// Multiplier of the inter-quartile range used for the outlier fences.
    pub iqr_fence: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum SeasonalMode {
    Additive,
    Multiplicative,
}

/// Parameters of the forecasting methods and of the method selection back-test.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    pub alpha: Decimal,
    pub beta: Decimal,
    pub gamma: Decimal,
    /// Maximum number of trailing values averaged by the moving-average methods.
    pub moving_average_window: usize,
    pub season_length: usize,
    /// Below this many points Holt-Winters falls back to double exponential smoothing.
    pub seasonal_min_points: usize,
    pub seasonal_mode: SeasonalMode,
    /// Share of the history used as the training slice during back-testing.
    pub train_ratio: Decimal,
    /// Below this many points back-testing is skipped and every method scores zero.
    pub min_backtest_points: usize,
    /// Below this many points a forecast is reported as insufficient data.
    pub min_history_points: usize,
    pub z_score_80: Decimal,
    pub z_score_95: Decimal,
    /// Threads used to back-test candidate methods. `0` means one per core.
    pub worker_threads: usize,
    pub accuracy: AccuracyTable,
}

/// The typical reliability reported for each forecasting method.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccuracyTable {
    pub simple_moving_average: Decimal,
    pub weighted_moving_average: Decimal,
    pub simple_exponential_smoothing: Decimal,
    pub double_exponential_smoothing: Decimal,
    pub triple_exponential_smoothing: Decimal,
    pub linear_regression: Decimal,
    pub polynomial_regression: Decimal,
    pub seasonal_decomposition: Decimal,
    pub arima: Decimal,
    pub ensemble: Decimal,
}

impl AccuracyTable {
    pub fn get(&self, method: ForecastMethod) -> Decimal {
        match method {
            ForecastMethod::SimpleMovingAverage => self.simple_moving_average,
            ForecastMethod::WeightedMovingAverage => self.weighted_moving_average,
            ForecastMethod::SimpleExponentialSmoothing => self.simple_exponential_smoothing,
            ForecastMethod::DoubleExponentialSmoothing => self.double_exponential_smoothing,
            ForecastMethod::TripleExponentialSmoothing => self.triple_exponential_smoothing,
            ForecastMethod::LinearRegression => self.linear_regression,
            ForecastMethod::PolynomialRegression => self.polynomial_regression,
            ForecastMethod::SeasonalDecomposition => self.seasonal_decomposition,
            ForecastMethod::Arima => self.arima,
            ForecastMethod::Ensemble => self.ensemble,
            ForecastMethod::InsufficientData => Decimal::ZERO,
        }
    }
}

/// Settings of the metric calculator and the cross-entity aggregator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalculatorSettings {
    /// Applied to every call into the external data source.
    pub data_source_timeout_ms: u64,
    /// How many derived-metric levels may be resolved before giving up.
    pub max_derivation_depth: usize,
    /// Concurrent per-entity calculations during aggregation. `0` means one per core.
    pub aggregation_workers: usize,
    /// Whether `calculate_and_store` writes results back to the sample store.
    pub persist_results: bool,
}

// --- Default Implementations ---
// This allows a user to omit any section from their toml and still have it work
// with sensible defaults.

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            completeness: dec!(0.4),
            recency: dec!(0.3),
            accuracy: dec!(0.3),
            recency_window_hours: 168,
        }
    }
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            sample_size: dec!(0.4),
            variance: dec!(0.3),
            outlier: dec!(0.3),
            iqr_fence: dec!(1.5),
        }
    }
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            alpha: dec!(0.3),
            beta: dec!(0.3),
            gamma: dec!(0.3),
            moving_average_window: 5,
            season_length: 7,
            seasonal_min_points: 12,
            seasonal_mode: SeasonalMode::Additive,
            train_ratio: dec!(0.75),
            min_backtest_points: 6,
            min_history_points: 3,
            z_score_80: dec!(1.28),
            z_score_95: dec!(1.96),
            worker_threads: 0,
            accuracy: AccuracyTable::default(),
        }
    }
}

impl Default for AccuracyTable {
    fn default() -> Self {
        Self {
            simple_moving_average: dec!(0.60),
            weighted_moving_average: dec!(0.65),
            simple_exponential_smoothing: dec!(0.70),
            double_exponential_smoothing: dec!(0.75),
            triple_exponential_smoothing: dec!(0.80),
            linear_regression: dec!(0.70),
            polynomial_regression: dec!(0.72),
            seasonal_decomposition: dec!(0.78),
            arima: dec!(0.82),
            ensemble: dec!(0.85),
        }
    }
}

impl Default for CalculatorSettings {
    fn default() -> Self {
        Self {
            data_source_timeout_ms: 5_000,
            max_derivation_depth: 4,
            aggregation_workers: 0,
            persist_results: true,
        }
    }
}
