use crate::error::ForecastError;
use crate::{require_history, Forecaster, ModelOutput};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

/// Repeats the mean of the last `min(window, n)` values across the horizon.
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    window: usize,
}

impl SimpleMovingAverage {
    pub fn new(window: usize) -> Result<Self, ForecastError> {
        if window == 0 {
            return Err(ForecastError::InvalidParameters(
                "moving average window must be greater than 0".to_string(),
            ));
        }
        Ok(Self { window })
    }
}

impl Forecaster for SimpleMovingAverage {
    fn forecast(&self, history: &[Decimal], horizon: usize) -> Result<ModelOutput, ForecastError> {
        require_history(history, 1)?;
        let window = self.window.min(history.len());
        let recent = &history[history.len() - window..];
        let average = recent.iter().sum::<Decimal>() / Decimal::from(window);

        Ok(ModelOutput {
            values: vec![average; horizon],
            base_confidence: dec!(0.6),
            has_trend: false,
            has_seasonality: false,
            parameters: BTreeMap::from([("window".to_string(), Decimal::from(window))]),
        })
    }
}

/// Like `SimpleMovingAverage`, but weights the window `1..=window` so the most recent
/// value counts the most.
#[derive(Debug, Clone)]
pub struct WeightedMovingAverage {
    window: usize,
}

impl WeightedMovingAverage {
    pub fn new(window: usize) -> Result<Self, ForecastError> {
        if window == 0 {
            return Err(ForecastError::InvalidParameters(
                "moving average window must be greater than 0".to_string(),
            ));
        }
        Ok(Self { window })
    }
}

impl Forecaster for WeightedMovingAverage {
    fn forecast(&self, history: &[Decimal], horizon: usize) -> Result<ModelOutput, ForecastError> {
        require_history(history, 1)?;
        let window = self.window.min(history.len());
        let recent = &history[history.len() - window..];

        let (weighted, total_weight) = recent.iter().enumerate().fold(
            (Decimal::ZERO, Decimal::ZERO),
            |(weighted, total), (i, value)| {
                let weight = Decimal::from(i + 1);
                (weighted + *value * weight, total + weight)
            },
        );

        Ok(ModelOutput {
            values: vec![weighted / total_weight; horizon],
            base_confidence: dec!(0.65),
            has_trend: false,
            has_seasonality: false,
            parameters: BTreeMap::from([("window".to_string(), Decimal::from(window))]),
        })
    }
}
