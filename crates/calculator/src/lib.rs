//! # Metrics Calculator
//!
//! This crate turns raw observations into typed hospitality metrics. It resolves the
//! samples behind a metric (recursing through derived metrics), applies the metric's
//! calculation strategy or formula, scores the result, and fans calculations out across
//! entities, time buckets and forecasts.
//!
//! ## Architectural Principles
//!
//! - **Layer 2 Orchestrator:** Depends on `core-types`, `configuration`, `analytics` and
//!   `forecasting`, and ties them together for one request.
//! - **Collaborators Behind Traits:** The sample store, the external data source and the
//!   result validator are traits. The calculator never knows whether it talks to a
//!   database, a connector, or the in-memory implementations in `memory`.
//! - **No Errors Across the Boundary:** Ordinary data conditions (missing samples, failed
//!   or slow sources, zero divisors) degrade to zero values; internal failures become
//!   error-tagged `MetricResult`s.
//! - **Explicit Persistence:** `calculate` only returns the sample to persist;
//!   `calculate_and_store` performs the validated, best-effort write-back.
//!
//! ## Public API
//!
//! - `MetricCalculator`: `calculate`, `calculate_and_store`, `rolling_average`,
//!   `historical_series`, `forecast_metrics`, `summarize`.
//! - `Aggregator`: cross-entity aggregation with `AggregationFunction`.
//! - `SampleStore`, `DataSource`, `Validator`: the collaborator interfaces.
//! - `InMemorySampleStore`, `InMemoryDataSource`, `Fixture`, `RangeValidator`: ready-made
//!   collaborators.
//! - `CalculatorError`, `SourceError`: the specific error types of this crate.

// Declare the modules that constitute this crate.
pub mod aggregator;
pub mod calculator;
pub mod error;
pub mod formulas;
pub mod memory;
pub mod source;
pub mod validator;

// Re-export the key components to create a clean, public-facing API.
pub use aggregator::Aggregator;
pub use calculator::{Calculation, MetricCalculator};
pub use error::{CalculatorError, SourceError};
pub use memory::{Fixture, InMemoryDataSource, InMemorySampleStore, MeasureOverride};
pub use source::{DataSource, SampleStore, Validator};
pub use validator::RangeValidator;
