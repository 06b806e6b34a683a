//! Pure descriptive statistics over sequences of `Decimal` values.
//!
//! Every function is total: an empty (or too short) input yields `0` instead of an
//! error, and a zero standard deviation short-circuits the standardized moments. A
//! statistic whose intermediate arithmetic overflows `Decimal` also yields `0`.

use rust_decimal::prelude::*;
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use std::collections::HashMap;

/// Number of fractional digits kept by the rounded statistics.
pub const SCALE: u32 = 4;

/// Rounds half-up (away from zero) to exactly `SCALE` fractional digits.
pub fn round(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(SCALE);
    rounded
}

pub fn sum(values: &[Decimal]) -> Decimal {
    checked_sum(values.iter().copied()).unwrap_or(Decimal::ZERO)
}

/// `None` when the total overflows.
pub fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values.into_iter().try_fold(Decimal::ZERO, |acc, x| acc.checked_add(x))
}

pub fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    checked_sum(values.iter().copied())
        .and_then(|total| total.checked_div(Decimal::from(values.len())))
        .map(round)
        .unwrap_or(Decimal::ZERO)
}

pub fn median(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let sorted = sorted(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        let (low, high) = (sorted[mid - 1], sorted[mid]);
        let midpoint = low
            .checked_add(high)
            .map(|total| total / Decimal::TWO)
            .unwrap_or_else(|| low + (high - low) / Decimal::TWO);
        round(midpoint)
    }
}

/// The most frequent value. Among equally frequent values the one seen first wins.
pub fn mode(values: &[Decimal]) -> Decimal {
    let mut counts: HashMap<Decimal, usize> = HashMap::new();
    let mut best: Option<(Decimal, usize)> = None;

    // Counting in input order keeps the tie-break deterministic.
    let mut order = Vec::new();
    for value in values {
        let count = counts.entry(*value).or_insert(0);
        if *count == 0 {
            order.push(*value);
        }
        *count += 1;
    }
    for value in order {
        let count = counts[&value];
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }

    best.map(|(value, _)| value).unwrap_or(Decimal::ZERO)
}

/// Sample variance (divides by `n - 1`).
pub fn variance(values: &[Decimal]) -> Decimal {
    if values.len() <= 1 {
        return Decimal::ZERO;
    }
    let m = mean(values);
    values
        .iter()
        .try_fold(Decimal::ZERO, |acc, x| {
            let deviation = x.checked_sub(m)?;
            acc.checked_add(deviation.checked_mul(deviation)?)
        })
        .and_then(|squares| squares.checked_div(Decimal::from(values.len() - 1)))
        .map(round)
        .unwrap_or(Decimal::ZERO)
}

pub fn standard_deviation(values: &[Decimal]) -> Decimal {
    round(variance(values).sqrt().unwrap_or(Decimal::ZERO))
}

/// Nearest-rank percentile: the element at `ceil(p / 100 * n) - 1` of the sorted values.
pub fn percentile(values: &[Decimal], p: Decimal) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let sorted = sorted(values);
    let rank = (p / Decimal::ONE_HUNDRED * Decimal::from(sorted.len())).ceil() - Decimal::ONE;
    let last = sorted.len() - 1;
    let index = rank.to_i64().unwrap_or(0).clamp(0, last as i64) as usize;
    sorted[index]
}

/// First and third quartiles.
pub fn quartiles(values: &[Decimal]) -> (Decimal, Decimal) {
    (
        percentile(values, Decimal::from(25)),
        percentile(values, Decimal::from(75)),
    )
}

pub fn min(values: &[Decimal]) -> Decimal {
    values.iter().copied().min().unwrap_or(Decimal::ZERO)
}

pub fn max(values: &[Decimal]) -> Decimal {
    values.iter().copied().max().unwrap_or(Decimal::ZERO)
}

/// Third standardized moment. Zero for fewer than three values or no spread.
pub fn skewness(values: &[Decimal]) -> Decimal {
    standardized_moment(values, 3, 3).map(round).unwrap_or(Decimal::ZERO)
}

/// Excess kurtosis (fourth standardized moment minus 3). Zero for fewer than four
/// values or no spread.
pub fn kurtosis(values: &[Decimal]) -> Decimal {
    standardized_moment(values, 4, 4)
        .map(|moment| round(moment - Decimal::from(3)))
        .unwrap_or(Decimal::ZERO)
}

fn standardized_moment(values: &[Decimal], power: u32, min_len: usize) -> Option<Decimal> {
    if values.len() < min_len {
        return None;
    }
    let sd = standard_deviation(values);
    if sd.is_zero() {
        return None;
    }
    let m = mean(values);
    let total = values.iter().try_fold(Decimal::ZERO, |acc, x| {
        let z = x.checked_sub(m)?.checked_div(sd)?;
        let moment = (1..power).try_fold(z, |product, _| product.checked_mul(z))?;
        acc.checked_add(moment)
    })?;
    total.checked_div(Decimal::from(values.len()))
}

fn sorted(values: &[Decimal]) -> Vec<Decimal> {
    let mut sorted = values.to_vec();
    sorted.sort();
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn one_to_five() -> Vec<Decimal> {
        vec![dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)]
    }

    #[test]
    fn central_tendency_of_small_series() {
        assert_eq!(mean(&one_to_five()).to_string(), "3.0000");
        assert_eq!(median(&[dec!(1), dec!(2), dec!(3), dec!(4)]), dec!(2.5));
        assert_eq!(median(&[dec!(9), dec!(1), dec!(5)]), dec!(5));
    }

    #[test]
    fn mean_rounds_half_up() {
        // A midpoint in the fifth digit rounds away from zero.
        assert_eq!(mean(&[dec!(2.00005)]), dec!(2.0001));
        assert_eq!(mean(&[dec!(1), dec!(2), dec!(2)]), dec!(1.6667));
    }

    #[test]
    fn sample_variance_divides_by_n_minus_one() {
        assert_eq!(variance(&one_to_five()), dec!(2.5));
        assert_eq!(standard_deviation(&one_to_five()), dec!(1.5811));
    }

    #[test]
    fn overflowing_moments_degrade_to_zero() {
        let swings = [dec!(500000000000000), dec!(-500000000000000), dec!(500000000000000), dec!(-500000000000000)];
        assert_eq!(mean(&swings), Decimal::ZERO);
        assert_eq!(variance(&swings), Decimal::ZERO);
        assert_eq!(standard_deviation(&swings), Decimal::ZERO);
        assert_eq!(skewness(&swings), Decimal::ZERO);
        assert_eq!(kurtosis(&swings), Decimal::ZERO);
    }

    #[test]
    fn overflowing_totals_degrade_to_zero() {
        let huge = [Decimal::MAX, Decimal::MAX];
        assert_eq!(sum(&huge), Decimal::ZERO);
        assert_eq!(checked_sum(huge), None);
        assert_eq!(mean(&huge), Decimal::ZERO);
        assert_eq!(median(&[Decimal::MAX, Decimal::MAX - Decimal::TWO]), round(Decimal::MAX - Decimal::ONE));
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![dec!(42)])]
    fn degenerate_inputs_are_zero(#[case] values: Vec<Decimal>) {
        assert_eq!(variance(&values), Decimal::ZERO);
        assert_eq!(standard_deviation(&values), Decimal::ZERO);
        assert_eq!(skewness(&values), Decimal::ZERO);
        assert_eq!(kurtosis(&values), Decimal::ZERO);
    }

    #[test]
    fn empty_input_yields_zero_central_tendency() {
        assert_eq!(mean(&[]), Decimal::ZERO);
        assert_eq!(median(&[]), Decimal::ZERO);
        assert_eq!(mode(&[]), Decimal::ZERO);
        assert_eq!(percentile(&[], dec!(50)), Decimal::ZERO);
    }

    #[test]
    fn variance_is_non_negative_and_stddev_is_its_root() {
        let series = [
            vec![dec!(3.5), dec!(-2), dec!(10.25), dec!(0)],
            vec![dec!(100), dec!(100.1), dec!(99.9)],
            vec![dec!(-5), dec!(-5), dec!(-5)],
        ];
        for values in series {
            let var = variance(&values);
            assert!(var >= Decimal::ZERO);
            assert_eq!(standard_deviation(&values), round(var.sqrt().unwrap()));
        }
    }

    #[rstest]
    #[case(dec!(25), dec!(2))]
    #[case(dec!(50), dec!(3))]
    #[case(dec!(75), dec!(4))]
    #[case(dec!(100), dec!(5))]
    #[case(dec!(0), dec!(1))]
    fn nearest_rank_percentile(#[case] p: Decimal, #[case] expected: Decimal) {
        assert_eq!(percentile(&one_to_five(), p), expected);
    }

    #[test]
    fn mode_picks_most_frequent_value() {
        let values = [dec!(4), dec!(7), dec!(7), dec!(1), dec!(7), dec!(4)];
        assert_eq!(mode(&values), dec!(7));
    }

    #[test]
    fn symmetric_series_has_zero_skew() {
        assert_eq!(skewness(&one_to_five()), Decimal::ZERO);
        assert_eq!(skewness(&[dec!(-3), dec!(-1), dec!(1), dec!(3)]), Decimal::ZERO);
        // A uniform-like spread is platykurtic.
        let k = kurtosis(&one_to_five());
        assert!((k - dec!(-1.9119)).abs() <= dec!(0.0002), "kurtosis was {k}");
    }

    #[test]
    fn moments_require_spread_and_length() {
        let flat = [dec!(7), dec!(7), dec!(7), dec!(7), dec!(7)];
        assert_eq!(skewness(&flat), Decimal::ZERO);
        assert_eq!(kurtosis(&flat), Decimal::ZERO);
        assert_eq!(kurtosis(&[dec!(1), dec!(2), dec!(9)]), Decimal::ZERO);
        assert_ne!(skewness(&[dec!(1), dec!(2), dec!(9)]), Decimal::ZERO);
    }

    #[test]
    fn right_tail_has_positive_skew() {
        let values = [dec!(1), dec!(1), dec!(2), dec!(2), dec!(3), dec!(20)];
        assert!(skewness(&values) > Decimal::ZERO);
    }
}
