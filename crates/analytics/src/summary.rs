use crate::stats;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A descriptive summary of a sequence of sample values.
///
/// Derived purely from its input and recomputed on demand; it is never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalSummary {
    pub sample_size: usize,

    // I. Central Tendency
    pub mean: Decimal,
    pub median: Decimal,
    pub mode: Decimal,

    // II. Dispersion
    pub variance: Decimal,
    pub standard_deviation: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    pub range: Decimal,
    pub q1: Decimal,
    pub q3: Decimal,
    pub iqr: Decimal,

    // III. Shape
    pub skewness: Decimal,
    pub kurtosis: Decimal,

    pub computed_at: DateTime<Utc>,
}

impl StatisticalSummary {
    /// Creates a new, zeroed-out summary. This is what an empty input produces.
    pub fn new(computed_at: DateTime<Utc>) -> Self {
        Self {
            sample_size: 0,
            mean: Decimal::ZERO,
            median: Decimal::ZERO,
            mode: Decimal::ZERO,
            variance: Decimal::ZERO,
            standard_deviation: Decimal::ZERO,
            min: Decimal::ZERO,
            max: Decimal::ZERO,
            range: Decimal::ZERO,
            q1: Decimal::ZERO,
            q3: Decimal::ZERO,
            iqr: Decimal::ZERO,
            skewness: Decimal::ZERO,
            kurtosis: Decimal::ZERO,
            computed_at,
        }
    }

    pub fn from_values(values: &[Decimal], computed_at: DateTime<Utc>) -> Self {
        if values.is_empty() {
            return Self::new(computed_at);
        }

        let (q1, q3) = stats::quartiles(values);
        let min = stats::min(values);
        let max = stats::max(values);

        Self {
            sample_size: values.len(),
            mean: stats::mean(values),
            median: stats::median(values),
            mode: stats::mode(values),
            variance: stats::variance(values),
            standard_deviation: stats::standard_deviation(values),
            min,
            max,
            range: max.checked_sub(min).unwrap_or(Decimal::ZERO),
            q1,
            q3,
            iqr: q3.checked_sub(q1).unwrap_or(Decimal::ZERO),
            skewness: stats::skewness(values),
            kurtosis: stats::kurtosis(values),
            computed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_input_is_all_zero() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let summary = StatisticalSummary::from_values(&[], at);
        assert_eq!(summary, StatisticalSummary::new(at));
    }

    #[test]
    fn summarizes_occupancy_series() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let values = [dec!(62), dec!(70), dec!(70), dec!(81), dec!(90), dec!(55), dec!(77), dec!(68)];
        let summary = StatisticalSummary::from_values(&values, at);

        assert_eq!(summary.sample_size, 8);
        assert_eq!(summary.mean, dec!(71.625));
        assert_eq!(summary.median, dec!(70));
        assert_eq!(summary.mode, dec!(70));
        assert_eq!(summary.min, dec!(55));
        assert_eq!(summary.max, dec!(90));
        assert_eq!(summary.range, dec!(35));
        assert_eq!(summary.q1, dec!(62));
        assert_eq!(summary.q3, dec!(77));
        assert_eq!(summary.iqr, dec!(15));
        assert!(summary.variance >= Decimal::ZERO);
        assert_eq!(summary.computed_at, at);
    }

    #[test]
    fn extreme_values_summarize_without_overflowing() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let values = [Decimal::MAX, Decimal::MIN, Decimal::MAX, Decimal::MIN];
        let summary = StatisticalSummary::from_values(&values, at);

        assert_eq!(summary.sample_size, 4);
        assert_eq!(summary.mean, Decimal::ZERO);
        assert_eq!(summary.variance, Decimal::ZERO);
        assert_eq!(summary.range, Decimal::ZERO);
        assert_eq!(summary.iqr, Decimal::ZERO);
        assert_eq!(summary.skewness, Decimal::ZERO);
    }
}
