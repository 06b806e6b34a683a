use analytics::AnalyticsError;
use core_types::CoreError;
use forecasting::ForecastError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalculatorError {
    #[error("Invalid domain input: {0}")]
    Core(#[from] CoreError),

    #[error("Scoring configuration error: {0}")]
    Analytics(#[from] AnalyticsError),

    #[error("Forecasting error: {0}")]
    Forecast(#[from] ForecastError),

    #[error("Derived metric depends on itself: {0}")]
    DerivationCycle(String),

    #[error("Derived metric {metric} exceeds the maximum derivation depth of {max_depth}")]
    DerivationTooDeep { metric: String, max_depth: usize },

    #[error("Invalid calculation request: {0}")]
    InvalidRequest(String),

    #[error("Calculation of {0} panicked")]
    Panicked(String),

    #[error("Background worker failed: {0}")]
    Worker(String),
}

/// Failures reported by the external sample store and data source.
///
/// These never reach a caller of the calculator: they are logged and treated as
/// "no data available".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Source is unavailable: {0}")]
    Unavailable(String),

    #[error("Source did not answer within {0} ms")]
    Timeout(u64),

    #[error("Source rejected the request: {0}")]
    Rejected(String),
}
