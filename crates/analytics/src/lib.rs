//! # Metrics Analytics
//!
//! This crate holds the statistical building blocks of the metrics engine: descriptive
//! statistics over sample values and the reliability scores attached to every result.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of stores or data
//!   sources. It depends only on `core-types` and `configuration`.
//! - **Stateless Calculation:** Every function takes its inputs (including "now") as
//!   parameters and returns a value. Degenerate inputs short-circuit to zero instead of
//!   failing.
//!
//! ## Public API
//!
//! - `stats`: mean, median, mode, variance, standard deviation, percentile, skewness, kurtosis.
//! - `StatisticalSummary`: all of the above for one sequence, as a serializable value.
//! - `QualityScorer`: the quality and confidence scores of a sample set.
//! - `AnalyticsError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod error;
pub mod scoring;
pub mod stats;
pub mod summary;

// Re-export the key components to create a clean, public-facing API.
pub use error::AnalyticsError;
pub use scoring::QualityScorer;
pub use summary::StatisticalSummary;
