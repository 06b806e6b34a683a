use chrono::{DateTime, Utc};
use core_types::{ForecastMethod, MetricType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The prediction interval around one forecast period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// 1-based step into the horizon.
    pub period: usize,
    pub forecast_value: Decimal,
    pub confidence_80_lower: Decimal,
    pub confidence_80_upper: Decimal,
    pub confidence_95_lower: Decimal,
    pub confidence_95_upper: Decimal,
}

/// The projection of a single metric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricForecast {
    /// Exactly `horizon` values.
    pub forecast_values: Vec<Decimal>,
    /// Exactly `horizon` intervals, aligned with `forecast_values`.
    pub confidence_intervals: Vec<ConfidenceInterval>,
    /// The typical reliability of `method_used`, from the accuracy table.
    pub accuracy_score: Decimal,
    pub confidence_score: Decimal,
    /// `max(0, 1 - MAPE)` of the method on the held-out tail of the history.
    pub backtest_score: Decimal,
    pub method_used: ForecastMethod,
    pub has_seasonality: bool,
    pub has_trend: bool,
    pub parameters: BTreeMap<String, Decimal>,
    pub historical_sample_count: usize,
    pub horizon: usize,
}

impl MetricForecast {
    /// The zero-filled sentinel returned when the history is too short to forecast.
    pub fn insufficient_data(historical_sample_count: usize, horizon: usize) -> Self {
        Self {
            forecast_values: vec![Decimal::ZERO; horizon],
            confidence_intervals: (1..=horizon)
                .map(|period| ConfidenceInterval {
                    period,
                    forecast_value: Decimal::ZERO,
                    confidence_80_lower: Decimal::ZERO,
                    confidence_80_upper: Decimal::ZERO,
                    confidence_95_lower: Decimal::ZERO,
                    confidence_95_upper: Decimal::ZERO,
                })
                .collect(),
            accuracy_score: Decimal::ZERO,
            confidence_score: Decimal::ZERO,
            backtest_score: Decimal::ZERO,
            method_used: ForecastMethod::InsufficientData,
            has_seasonality: false,
            has_trend: false,
            parameters: BTreeMap::new(),
            historical_sample_count,
            horizon,
        }
    }
}

/// Forecasts for a set of metrics, with overall scores and the narrative caveats that
/// accompany every projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub forecasts: BTreeMap<MetricType, MetricForecast>,
    pub overall_accuracy: Decimal,
    pub overall_confidence: Decimal,
    pub horizon: usize,
    pub assumptions: Vec<String>,
    pub limitations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

pub(crate) fn assumptions(season_length: usize) -> Vec<String> {
    vec![
        "Historical patterns continue through the forecast horizon.".to_string(),
        "No structural change in demand (new competitors, renovations, market shocks).".to_string(),
        format!("Seasonal cycles repeat every {season_length} periods."),
        "Historical observations are complete and aligned to their granularity.".to_string(),
    ]
}

pub(crate) fn limitations() -> Vec<String> {
    vec![
        "Prediction intervals assume normally distributed errors around the point forecast."
            .to_string(),
        "Accuracy scores are typical values per method, not measured on this series.".to_string(),
        "Polynomial regression, seasonal decomposition and ARIMA are approximated by simpler models."
            .to_string(),
        "Short histories produce wide intervals and low confidence.".to_string(),
    ]
}
