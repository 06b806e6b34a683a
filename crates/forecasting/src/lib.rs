//! # Metrics Forecasting
//!
//! This crate projects a historical metric series into the future. It defines a
//! universal `Forecaster` trait, several concrete time-series methods, and the
//! `ForecastEngine` that back-tests them, selects the best, and attaches prediction
//! intervals.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It depends only on `core-types`,
//!   `configuration` and `analytics`; it never reads stores or data sources.
//! - **Method Agnostic Engine:** Through the `Forecaster` trait the engine can evaluate any
//!   method without knowing its internals.
//! - **Extensibility:** Adding a method means implementing `Forecaster`, adding a
//!   `ForecastMethod` variant and wiring it in `create_forecaster`.
//!
//! ## Public API
//!
//! - `Forecaster` / `ModelOutput`: the method interface and its raw output.
//! - `create_forecaster`: the factory mapping a `ForecastMethod` to an implementation.
//! - `ForecastEngine`: selection, projection and intervals.
//! - `ForecastResult`, `MetricForecast`, `ConfidenceInterval`: the serializable outputs.

// Declare all the modules that constitute this crate.
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod exponential_smoothing;
pub mod factory;
pub mod moving_average;
pub mod regression;
pub mod report;

// Re-export the key components to create a clean, public-facing API.
pub use engine::{ForecastEngine, MethodSelection};
pub use error::ForecastError;
pub use factory::create_forecaster;
pub use report::{ConfidenceInterval, ForecastResult, MetricForecast};

use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// The raw projection of one method, before intervals and scores are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    /// Exactly `horizon` values.
    pub values: Vec<Decimal>,
    /// The method's fixed prior confidence, in [0, 1].
    pub base_confidence: Decimal,
    pub has_trend: bool,
    pub has_seasonality: bool,
    pub parameters: BTreeMap<String, Decimal>,
}

/// The core trait that all forecasting methods implement.
///
/// Implementations are stateless: the same history and horizon always produce the same
/// output. The `Send + Sync` bounds allow candidate methods to be back-tested on
/// multiple threads.
pub trait Forecaster: Send + Sync {
    /// Projects `horizon` values following a chronological `history`.
    ///
    /// # Returns
    ///
    /// * `Ok(ModelOutput)` - with exactly `horizon` forecast values.
    /// * `Err(ForecastError)` - if the history is too short for this method.
    fn forecast(&self, history: &[Decimal], horizon: usize) -> Result<ModelOutput, ForecastError>;
}

pub(crate) fn require_history(history: &[Decimal], min: usize) -> Result<(), ForecastError> {
    if history.len() < min {
        return Err(ForecastError::NotEnoughData(format!(
            "need at least {min} values, got {}",
            history.len()
        )));
    }
    Ok(())
}
