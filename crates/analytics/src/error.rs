use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Scoring weights are invalid: {0}")]
    InvalidWeights(String),
}
