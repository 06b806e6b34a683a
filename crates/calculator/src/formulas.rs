//! Named formulas of the derived metrics.
//!
//! Each formula declares the data-source measures it reads and a pure function over
//! them. Every divisor is guarded: a zero denominator yields `0`.

use core_types::{Measure, MetricType};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// The measure values fetched for one formula evaluation. Missing measures read as `0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasureValues(HashMap<Measure, Decimal>);

impl MeasureValues {
    pub fn insert(&mut self, measure: Measure, value: Decimal) {
        self.0.insert(measure, value);
    }

    pub fn get(&self, measure: Measure) -> Decimal {
        self.0.get(&measure).copied().unwrap_or(Decimal::ZERO)
    }
}

impl FromIterator<(Measure, Decimal)> for MeasureValues {
    fn from_iter<I: IntoIterator<Item = (Measure, Decimal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Formula {
    pub measures: &'static [Measure],
    /// Computes the metric from its measures and the number of nights in the window.
    pub compute: fn(&MeasureValues, Decimal) -> Decimal,
}

/// Looks up the formula of a derived metric. `None` for direct metrics.
pub fn formula_for(metric_type: MetricType) -> Option<Formula> {
    let formula = match metric_type {
        MetricType::OccupancyRate => Formula {
            measures: &[Measure::OccupiedRooms, Measure::TotalRooms],
            compute: occupancy_rate,
        },
        MetricType::CancellationRate => Formula {
            measures: &[Measure::CancelledBookings, Measure::TotalBookings],
            compute: cancellation_rate,
        },
        MetricType::AverageDailyRate => Formula {
            measures: &[Measure::RoomRevenue, Measure::OccupiedRooms],
            compute: average_daily_rate,
        },
        MetricType::RevPar => Formula {
            measures: &[Measure::RoomRevenue, Measure::TotalRooms],
            compute: revenue_per_available_room,
        },
        MetricType::TRevPar => Formula {
            measures: &[Measure::TotalRevenue, Measure::TotalRooms],
            compute: total_revenue_per_available_room,
        },
        MetricType::CustomerLifetimeValue => Formula {
            measures: &[
                Measure::AverageGuestRevenue,
                Measure::AverageStayFrequency,
                Measure::AverageGuestLifespan,
            ],
            compute: customer_lifetime_value,
        },
        MetricType::OccupiedRooms
        | MetricType::AvailableRooms
        | MetricType::RoomRevenue
        | MetricType::TotalRevenue
        | MetricType::TotalBookings
        | MetricType::CancelledBookings
        | MetricType::GuestSatisfaction
        | MetricType::GuestReviews => return None,
    };
    Some(formula)
}

/// `numerator / denominator`, or `0` when the denominator is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    numerator / denominator
}

/// Occupied room-nights over available room-nights, as a percentage.
fn occupancy_rate(m: &MeasureValues, nights: Decimal) -> Decimal {
    safe_div(m.get(Measure::OccupiedRooms), m.get(Measure::TotalRooms) * nights) * Decimal::ONE_HUNDRED
}

fn cancellation_rate(m: &MeasureValues, _nights: Decimal) -> Decimal {
    safe_div(m.get(Measure::CancelledBookings), m.get(Measure::TotalBookings)) * Decimal::ONE_HUNDRED
}

/// Room revenue per occupied room-night.
fn average_daily_rate(m: &MeasureValues, _nights: Decimal) -> Decimal {
    safe_div(m.get(Measure::RoomRevenue), m.get(Measure::OccupiedRooms))
}

fn revenue_per_available_room(m: &MeasureValues, nights: Decimal) -> Decimal {
    safe_div(m.get(Measure::RoomRevenue), m.get(Measure::TotalRooms) * nights)
}

fn total_revenue_per_available_room(m: &MeasureValues, nights: Decimal) -> Decimal {
    safe_div(m.get(Measure::TotalRevenue), m.get(Measure::TotalRooms) * nights)
}

fn customer_lifetime_value(m: &MeasureValues, _nights: Decimal) -> Decimal {
    m.get(Measure::AverageGuestRevenue)
        * m.get(Measure::AverageStayFrequency)
        * m.get(Measure::AverageGuestLifespan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn measures(pairs: &[(Measure, Decimal)]) -> MeasureValues {
        pairs.iter().copied().collect()
    }

    fn evaluate(metric: MetricType, values: &MeasureValues, nights: Decimal) -> Decimal {
        (formula_for(metric).unwrap().compute)(values, nights)
    }

    #[test]
    fn every_derived_metric_has_a_formula() {
        for metric in MetricType::ALL {
            assert_eq!(formula_for(metric).is_some(), metric.is_derived(), "{metric}");
        }
    }

    #[rstest]
    #[case(MetricType::OccupancyRate, dec!(1), dec!(80))]
    #[case(MetricType::OccupancyRate, dec!(2), dec!(40))]
    #[case(MetricType::AverageDailyRate, dec!(1), dec!(150))]
    #[case(MetricType::RevPar, dec!(1), dec!(120))]
    #[case(MetricType::RevPar, dec!(3), dec!(40))]
    #[case(MetricType::TRevPar, dec!(1), dec!(180))]
    fn room_formulas(#[case] metric: MetricType, #[case] nights: Decimal, #[case] expected: Decimal) {
        let values = measures(&[
            (Measure::OccupiedRooms, dec!(80)),
            (Measure::TotalRooms, dec!(100)),
            (Measure::RoomRevenue, dec!(12000)),
            (Measure::TotalRevenue, dec!(18000)),
        ]);
        assert_eq!(evaluate(metric, &values, nights), expected);
    }

    #[test]
    fn cancellation_rate_is_a_percentage_of_bookings() {
        let values = measures(&[(Measure::CancelledBookings, dec!(3)), (Measure::TotalBookings, dec!(40))]);
        assert_eq!(evaluate(MetricType::CancellationRate, &values, dec!(1)), dec!(7.5));
    }

    #[test]
    fn lifetime_value_multiplies_guest_averages() {
        let values = measures(&[
            (Measure::AverageGuestRevenue, dec!(250)),
            (Measure::AverageStayFrequency, dec!(2.5)),
            (Measure::AverageGuestLifespan, dec!(4)),
        ]);
        assert_eq!(evaluate(MetricType::CustomerLifetimeValue, &values, dec!(1)), dec!(2500));
    }

    #[rstest]
    #[case(MetricType::OccupancyRate)]
    #[case(MetricType::CancellationRate)]
    #[case(MetricType::AverageDailyRate)]
    #[case(MetricType::RevPar)]
    #[case(MetricType::TRevPar)]
    #[case(MetricType::CustomerLifetimeValue)]
    fn zero_divisors_yield_zero(#[case] metric: MetricType) {
        let values = measures(&[(Measure::RoomRevenue, dec!(500)), (Measure::CancelledBookings, dec!(2))]);
        assert_eq!(evaluate(metric, &values, dec!(1)), Decimal::ZERO);
    }
}
