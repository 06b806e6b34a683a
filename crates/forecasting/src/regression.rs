use crate::error::ForecastError;
use crate::moving_average::SimpleMovingAverage;
use crate::{require_history, Forecaster, ModelOutput};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

/// Ordinary least squares of value against position, extended past the end of the series.
///
/// A degenerate fit (a single point) falls back to a moving average over `fallback_window`.
#[derive(Debug, Clone)]
pub struct LinearRegression {
    fallback_window: usize,
}

impl LinearRegression {
    pub fn new(fallback_window: usize) -> Result<Self, ForecastError> {
        if fallback_window == 0 {
            return Err(ForecastError::InvalidParameters(
                "fallback window must be greater than 0".to_string(),
            ));
        }
        Ok(Self { fallback_window })
    }

    /// `(slope, intercept)`, or `None` when the denominator of the fit is zero.
    pub fn fit(history: &[Decimal]) -> Option<(Decimal, Decimal)> {
        let n = Decimal::from(history.len());
        let (sum_x, sum_y, sum_xy, sum_xx) = history.iter().enumerate().fold(
            (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            |(sx, sy, sxy, sxx), (i, y)| {
                let x = Decimal::from(i);
                (sx + x, sy + *y, sxy + x * *y, sxx + x * x)
            },
        );

        let denominator = n * sum_xx - sum_x * sum_x;
        if denominator.is_zero() {
            return None;
        }
        let slope = (n * sum_xy - sum_x * sum_y) / denominator;
        let intercept = (sum_y - slope * sum_x) / n;
        Some((slope, intercept))
    }
}

impl Forecaster for LinearRegression {
    fn forecast(&self, history: &[Decimal], horizon: usize) -> Result<ModelOutput, ForecastError> {
        require_history(history, 1)?;
        let Some((slope, intercept)) = Self::fit(history) else {
            tracing::debug!("Regression denominator is zero, using a moving average instead.");
            return SimpleMovingAverage::new(self.fallback_window)?.forecast(history, horizon);
        };

        let n = history.len();
        let values = (0..horizon)
            .map(|step| slope * Decimal::from(n + step) + intercept)
            .collect();

        Ok(ModelOutput {
            values,
            base_confidence: dec!(0.7),
            has_trend: !slope.is_zero(),
            has_seasonality: false,
            parameters: BTreeMap::from([
                ("slope".to_string(), slope),
                ("intercept".to_string(), intercept),
            ]),
        })
    }
}
