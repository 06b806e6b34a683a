use crate::source::Validator;
use core_types::{MetricCategory, MetricResult};
use rust_decimal::Decimal;

/// Accepts results whose value and scores are within the ranges their category allows.
///
/// - the value is present and the result is not an error,
/// - quality and confidence lie in [0, 1],
/// - percentages lie in [0, 100],
/// - currency, count and score values are not negative.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeValidator;

impl Validator for RangeValidator {
    fn is_valid_result(&self, result: &MetricResult) -> bool {
        let Some(value) = result.value else {
            return false;
        };
        if result.is_error() {
            return false;
        }

        let unit = Decimal::ZERO..=Decimal::ONE;
        if !unit.contains(&result.quality_score) || !unit.contains(&result.confidence_score) {
            return false;
        }

        match result.metric_type.category() {
            MetricCategory::Percentage => (Decimal::ZERO..=Decimal::ONE_HUNDRED).contains(&value),
            MetricCategory::Currency | MetricCategory::Count | MetricCategory::Score => {
                value >= Decimal::ZERO
            }
        }
    }
}
