use crate::error::CoreError;
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every business metric the engine knows how to produce.
///
/// Direct metrics are read from stored observations. Derived metrics are computed from
/// their `components()` and a named formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricType {
    OccupiedRooms,
    AvailableRooms,
    RoomRevenue,
    TotalRevenue,
    TotalBookings,
    CancelledBookings,
    GuestSatisfaction,
    GuestReviews,
    OccupancyRate,
    CancellationRate,
    AverageDailyRate,
    #[serde(rename = "REVPAR")]
    RevPar,
    #[serde(rename = "TREVPAR")]
    TRevPar,
    CustomerLifetimeValue,
}

impl MetricType {
    pub const ALL: [MetricType; 14] = [
        MetricType::OccupiedRooms,
        MetricType::AvailableRooms,
        MetricType::RoomRevenue,
        MetricType::TotalRevenue,
        MetricType::TotalBookings,
        MetricType::CancelledBookings,
        MetricType::GuestSatisfaction,
        MetricType::GuestReviews,
        MetricType::OccupancyRate,
        MetricType::CancellationRate,
        MetricType::AverageDailyRate,
        MetricType::RevPar,
        MetricType::TRevPar,
        MetricType::CustomerLifetimeValue,
    ];

    /// The wire code, identical to the serde representation.
    pub fn code(&self) -> &'static str {
        match self {
            MetricType::OccupiedRooms => "OCCUPIED_ROOMS",
            MetricType::AvailableRooms => "AVAILABLE_ROOMS",
            MetricType::RoomRevenue => "ROOM_REVENUE",
            MetricType::TotalRevenue => "TOTAL_REVENUE",
            MetricType::TotalBookings => "TOTAL_BOOKINGS",
            MetricType::CancelledBookings => "CANCELLED_BOOKINGS",
            MetricType::GuestSatisfaction => "GUEST_SATISFACTION",
            MetricType::GuestReviews => "GUEST_REVIEWS",
            MetricType::OccupancyRate => "OCCUPANCY_RATE",
            MetricType::CancellationRate => "CANCELLATION_RATE",
            MetricType::AverageDailyRate => "AVERAGE_DAILY_RATE",
            MetricType::RevPar => "REVPAR",
            MetricType::TRevPar => "TREVPAR",
            MetricType::CustomerLifetimeValue => "CUSTOMER_LIFETIME_VALUE",
        }
    }

    pub fn category(&self) -> MetricCategory {
        match self {
            MetricType::RoomRevenue
            | MetricType::TotalRevenue
            | MetricType::AverageDailyRate
            | MetricType::RevPar
            | MetricType::TRevPar
            | MetricType::CustomerLifetimeValue => MetricCategory::Currency,
            MetricType::OccupancyRate | MetricType::CancellationRate => MetricCategory::Percentage,
            MetricType::OccupiedRooms
            | MetricType::AvailableRooms
            | MetricType::TotalBookings
            | MetricType::CancelledBookings
            | MetricType::GuestReviews => MetricCategory::Count,
            MetricType::GuestSatisfaction => MetricCategory::Score,
        }
    }

    /// The unit label shown next to a formatted value.
    pub fn unit(&self) -> &'static str {
        match self {
            MetricType::OccupiedRooms | MetricType::AvailableRooms => "rooms",
            MetricType::TotalBookings | MetricType::CancelledBookings => "bookings",
            MetricType::GuestReviews => "reviews",
            MetricType::GuestSatisfaction => "points",
            _ => self.category().default_unit(),
        }
    }

    pub fn strategy(&self) -> CalculationStrategy {
        match self {
            MetricType::OccupiedRooms
            | MetricType::RoomRevenue
            | MetricType::TotalRevenue
            | MetricType::TotalBookings
            | MetricType::CancelledBookings => CalculationStrategy::Sum,
            MetricType::AvailableRooms => CalculationStrategy::Latest,
            MetricType::GuestSatisfaction => CalculationStrategy::Average,
            MetricType::GuestReviews => CalculationStrategy::Count,
            MetricType::OccupancyRate | MetricType::CancellationRate => {
                CalculationStrategy::Percentage
            }
            MetricType::AverageDailyRate | MetricType::RevPar | MetricType::TRevPar => {
                CalculationStrategy::Ratio
            }
            MetricType::CustomerLifetimeValue => CalculationStrategy::Complex,
        }
    }

    /// The metrics a derived metric is computed from. Empty for direct metrics.
    pub fn components(&self) -> &'static [MetricType] {
        match self {
            MetricType::OccupancyRate => &[MetricType::OccupiedRooms, MetricType::AvailableRooms],
            MetricType::CancellationRate => {
                &[MetricType::CancelledBookings, MetricType::TotalBookings]
            }
            MetricType::AverageDailyRate => &[MetricType::RoomRevenue, MetricType::OccupiedRooms],
            MetricType::RevPar => &[MetricType::RoomRevenue, MetricType::AvailableRooms],
            MetricType::TRevPar => &[MetricType::TotalRevenue, MetricType::AvailableRooms],
            MetricType::CustomerLifetimeValue => {
                &[MetricType::TotalRevenue, MetricType::TotalBookings]
            }
            _ => &[],
        }
    }

    pub fn is_derived(&self) -> bool {
        !self.components().is_empty()
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for MetricType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        MetricType::ALL
            .iter()
            .copied()
            .find(|m| m.code() == wanted)
            .ok_or_else(|| CoreError::UnknownCode { kind: "metric type", code: s.to_string() })
    }
}

/// Drives display formatting and validation ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricCategory {
    Currency,
    Percentage,
    Count,
    Score,
}

impl MetricCategory {
    /// The display pattern applied by `format_value`.
    pub fn format_pattern(&self) -> &'static str {
        match self {
            MetricCategory::Currency => "$#,##0.00",
            MetricCategory::Percentage => "#.#%",
            MetricCategory::Count => "#,##0",
            MetricCategory::Score => "0.00",
        }
    }

    pub fn default_unit(&self) -> &'static str {
        match self {
            MetricCategory::Currency => "USD",
            MetricCategory::Percentage => "%",
            MetricCategory::Count => "count",
            MetricCategory::Score => "points",
        }
    }
}

/// How the samples behind a metric are combined into one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationStrategy {
    Sum,
    Average,
    Latest,
    Count,
    Percentage,
    Ratio,
    Complex,
}

impl CalculationStrategy {
    /// Strategies that dispatch to a named formula instead of folding sample values.
    pub fn uses_formula(&self) -> bool {
        matches!(
            self,
            CalculationStrategy::Percentage | CalculationStrategy::Ratio | CalculationStrategy::Complex
        )
    }
}

/// The method tag carried by a `MetricResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationMethod {
    Sum,
    Average,
    Latest,
    Count,
    Percentage,
    Ratio,
    Complex,
    Aggregated,
    MovingAverage,
    Error,
}

impl From<CalculationStrategy> for CalculationMethod {
    fn from(strategy: CalculationStrategy) -> Self {
        match strategy {
            CalculationStrategy::Sum => CalculationMethod::Sum,
            CalculationStrategy::Average => CalculationMethod::Average,
            CalculationStrategy::Latest => CalculationMethod::Latest,
            CalculationStrategy::Count => CalculationMethod::Count,
            CalculationStrategy::Percentage => CalculationMethod::Percentage,
            CalculationStrategy::Ratio => CalculationMethod::Ratio,
            CalculationStrategy::Complex => CalculationMethod::Complex,
        }
    }
}

/// The time bucket samples are aligned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Granularity {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Granularity {
    /// The start of the bucket following the one starting at `from`.
    pub fn advance(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Granularity::Hourly => from.checked_add_signed(Duration::hours(1)),
            Granularity::Daily => from.checked_add_signed(Duration::days(1)),
            Granularity::Weekly => from.checked_add_signed(Duration::weeks(1)),
            Granularity::Monthly => from.checked_add_months(Months::new(1)),
            Granularity::Quarterly => from.checked_add_months(Months::new(3)),
            Granularity::Yearly => from.checked_add_months(Months::new(12)),
        }
    }
}

impl FromStr for Granularity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(Granularity::Hourly),
            "daily" => Ok(Granularity::Daily),
            "weekly" => Ok(Granularity::Weekly),
            "monthly" => Ok(Granularity::Monthly),
            "quarterly" => Ok(Granularity::Quarterly),
            "yearly" => Ok(Granularity::Yearly),
            _ => Err(CoreError::UnknownCode { kind: "granularity", code: s.to_string() }),
        }
    }
}

/// How per-entity values are combined into one summary value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFunction {
    Sum,
    Average,
    Median,
    Min,
    Max,
    Count,
}

impl FromStr for AggregationFunction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(AggregationFunction::Sum),
            "average" | "avg" => Ok(AggregationFunction::Average),
            "median" => Ok(AggregationFunction::Median),
            "min" => Ok(AggregationFunction::Min),
            "max" => Ok(AggregationFunction::Max),
            "count" => Ok(AggregationFunction::Count),
            _ => Err(CoreError::UnknownCode { kind: "aggregation function", code: s.to_string() }),
        }
    }
}

/// The forecasting algorithms the engine can choose between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForecastMethod {
    SimpleMovingAverage,
    WeightedMovingAverage,
    SimpleExponentialSmoothing,
    DoubleExponentialSmoothing,
    TripleExponentialSmoothing,
    LinearRegression,
    PolynomialRegression,
    SeasonalDecomposition,
    Arima,
    Ensemble,
    /// Tag for a forecast that could not be produced from the available history.
    InsufficientData,
}

impl ForecastMethod {
    /// The methods evaluated during selection, in tie-break order.
    pub const CANDIDATES: [ForecastMethod; 10] = [
        ForecastMethod::SimpleMovingAverage,
        ForecastMethod::WeightedMovingAverage,
        ForecastMethod::SimpleExponentialSmoothing,
        ForecastMethod::DoubleExponentialSmoothing,
        ForecastMethod::TripleExponentialSmoothing,
        ForecastMethod::LinearRegression,
        ForecastMethod::PolynomialRegression,
        ForecastMethod::SeasonalDecomposition,
        ForecastMethod::Arima,
        ForecastMethod::Ensemble,
    ];

    /// The fallback used when no method back-tests better.
    pub const DEFAULT: ForecastMethod = ForecastMethod::SimpleExponentialSmoothing;

    pub fn code(&self) -> &'static str {
        match self {
            ForecastMethod::SimpleMovingAverage => "SIMPLE_MOVING_AVERAGE",
            ForecastMethod::WeightedMovingAverage => "WEIGHTED_MOVING_AVERAGE",
            ForecastMethod::SimpleExponentialSmoothing => "SIMPLE_EXPONENTIAL_SMOOTHING",
            ForecastMethod::DoubleExponentialSmoothing => "DOUBLE_EXPONENTIAL_SMOOTHING",
            ForecastMethod::TripleExponentialSmoothing => "TRIPLE_EXPONENTIAL_SMOOTHING",
            ForecastMethod::LinearRegression => "LINEAR_REGRESSION",
            ForecastMethod::PolynomialRegression => "POLYNOMIAL_REGRESSION",
            ForecastMethod::SeasonalDecomposition => "SEASONAL_DECOMPOSITION",
            ForecastMethod::Arima => "ARIMA",
            ForecastMethod::Ensemble => "ENSEMBLE",
            ForecastMethod::InsufficientData => "INSUFFICIENT_DATA",
        }
    }
}

impl fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ForecastMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        ForecastMethod::CANDIDATES
            .iter()
            .copied()
            .find(|m| m.code() == wanted)
            .ok_or_else(|| CoreError::UnknownCode { kind: "forecast method", code: s.to_string() })
    }
}

/// Named numeric inputs served by the external data source for formula metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    OccupiedRooms,
    TotalRooms,
    RoomRevenue,
    TotalRevenue,
    TotalBookings,
    CancelledBookings,
    AverageGuestRevenue,
    AverageStayFrequency,
    AverageGuestLifespan,
}
