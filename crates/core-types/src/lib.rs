pub mod clock;
pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use clock::{Clock, FixedClock, SystemClock};
pub use enums::{
    AggregationFunction, CalculationMethod, CalculationStrategy, ForecastMethod, Granularity,
    Measure, MetricCategory, MetricType,
};
pub use error::CoreError;
pub use structs::{format_value, MetricResult, MetricSample, PeriodWindow};
