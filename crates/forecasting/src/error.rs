use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Forecasting method received invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Not enough data to forecast: {0}")]
    NotEnoughData(String),

    #[error("Forecasting method '{0}' cannot be used to produce a forecast")]
    UnsupportedMethod(String),

    #[error("Forecasting method '{0}' failed: {1}")]
    MethodFailed(String, String),

    #[error("Failed to build the forecasting worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
