use crate::error::ForecastError;
use crate::{Forecaster, ModelOutput};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Element-wise average of several member forecasts.
///
/// Reports the highest base confidence among its members, and a trend or seasonality
/// when any member detects one.
pub struct Ensemble {
    members: Vec<Box<dyn Forecaster>>,
}

impl Ensemble {
    pub fn new(members: Vec<Box<dyn Forecaster>>) -> Result<Self, ForecastError> {
        if members.is_empty() {
            return Err(ForecastError::InvalidParameters(
                "an ensemble needs at least one member".to_string(),
            ));
        }
        Ok(Self { members })
    }
}

impl Forecaster for Ensemble {
    fn forecast(&self, history: &[Decimal], horizon: usize) -> Result<ModelOutput, ForecastError> {
        let outputs = self
            .members
            .iter()
            .map(|member| member.forecast(history, horizon))
            .collect::<Result<Vec<_>, _>>()?;

        let count = Decimal::from(outputs.len());
        let values = (0..horizon)
            .map(|i| outputs.iter().map(|o| o.values[i]).sum::<Decimal>() / count)
            .collect();
        let base_confidence = outputs
            .iter()
            .map(|o| o.base_confidence)
            .max()
            .unwrap_or(Decimal::ZERO);

        Ok(ModelOutput {
            values,
            base_confidence,
            has_trend: outputs.iter().any(|o| o.has_trend),
            has_seasonality: outputs.iter().any(|o| o.has_seasonality),
            parameters: BTreeMap::from([("members".to_string(), count)]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exponential_smoothing::{DoubleExponentialSmoothing, SimpleExponentialSmoothing};
    use crate::regression::LinearRegression;
    use rust_decimal_macros::dec;

    #[test]
    fn averages_members_and_keeps_best_confidence() {
        let ensemble = Ensemble::new(vec![
            Box::new(SimpleExponentialSmoothing::new(dec!(0.3)).unwrap()),
            Box::new(DoubleExponentialSmoothing::new(dec!(0.3), dec!(0.3)).unwrap()),
            Box::new(LinearRegression::new(5).unwrap()),
        ])
        .unwrap();

        let output = ensemble.forecast(&[dec!(10), dec!(20), dec!(30), dec!(40)], 2).unwrap();
        assert_eq!(output.values.len(), 2);
        assert_eq!(output.base_confidence, dec!(0.75));
        assert!(output.has_trend);
        assert_eq!(output.parameters["members"], dec!(3));
        // Holt and the regression both project 50; smoothing lags behind.
        assert!(output.values[0] < dec!(50));
    }

    #[test]
    fn rejects_empty_member_list() {
        assert!(Ensemble::new(Vec::new()).is_err());
    }
}
