use crate::ensemble::Ensemble;
use crate::error::ForecastError;
use crate::exponential_smoothing::{
    DoubleExponentialSmoothing, SimpleExponentialSmoothing, TripleExponentialSmoothing,
};
use crate::moving_average::{SimpleMovingAverage, WeightedMovingAverage};
use crate::regression::LinearRegression;
use crate::Forecaster;
use configuration::ForecastSettings;
use core_types::ForecastMethod;

/// Creates a forecaster for the given method, parameterized from the settings.
///
/// Polynomial regression, seasonal decomposition and ARIMA are approximations: they
/// delegate to linear regression, Holt-Winters and Holt's method respectively.
pub fn create_forecaster(
    method: ForecastMethod,
    settings: &ForecastSettings,
) -> Result<Box<dyn Forecaster>, ForecastError> {
    // The compiler will error if a new ForecastMethod is added but not handled here.
    match method {
        ForecastMethod::SimpleMovingAverage => {
            Ok(Box::new(SimpleMovingAverage::new(settings.moving_average_window)?))
        }
        ForecastMethod::WeightedMovingAverage => {
            Ok(Box::new(WeightedMovingAverage::new(settings.moving_average_window)?))
        }
        ForecastMethod::SimpleExponentialSmoothing => {
            Ok(Box::new(SimpleExponentialSmoothing::new(settings.alpha)?))
        }
        ForecastMethod::DoubleExponentialSmoothing | ForecastMethod::Arima => {
            Ok(Box::new(DoubleExponentialSmoothing::new(settings.alpha, settings.beta)?))
        }
        ForecastMethod::TripleExponentialSmoothing | ForecastMethod::SeasonalDecomposition => {
            Ok(Box::new(TripleExponentialSmoothing::new(
                settings.alpha,
                settings.beta,
                settings.gamma,
                settings.season_length,
                settings.seasonal_min_points,
                settings.seasonal_mode,
            )?))
        }
        ForecastMethod::LinearRegression | ForecastMethod::PolynomialRegression => {
            Ok(Box::new(LinearRegression::new(settings.moving_average_window)?))
        }
        ForecastMethod::Ensemble => Ok(Box::new(Ensemble::new(vec![
            create_forecaster(ForecastMethod::SimpleExponentialSmoothing, settings)?,
            create_forecaster(ForecastMethod::DoubleExponentialSmoothing, settings)?,
            create_forecaster(ForecastMethod::LinearRegression, settings)?,
        ])?)),
        ForecastMethod::InsufficientData => {
            Err(ForecastError::UnsupportedMethod(method.code().to_string()))
        }
    }
}
