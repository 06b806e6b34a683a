use crate::error::AnalyticsError;
use crate::stats;
use chrono::{DateTime, Utc};
use configuration::{ConfidenceWeights, QualityWeights};
use core_types::MetricSample;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Computes the two independent [0, 1] reliability scores attached to every metric result.
///
/// - **Quality** describes the input data: how complete, recent and self-declared accurate
///   the samples are.
/// - **Confidence** describes the computed value: how many samples back it, how dispersed
///   they are, and whether the value itself sits inside the samples' outlier fences.
///
/// The scorer is stateless; "now" is passed in by the caller.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    quality: QualityWeights,
    confidence: ConfidenceWeights,
}

impl QualityScorer {
    pub fn new(quality: QualityWeights, confidence: ConfidenceWeights) -> Result<Self, AnalyticsError> {
        let quality_total = quality.completeness + quality.recency + quality.accuracy;
        let confidence_total = confidence.sample_size + confidence.variance + confidence.outlier;
        if quality_total != Decimal::ONE || confidence_total != Decimal::ONE {
            return Err(AnalyticsError::InvalidWeights(format!(
                "quality weights sum to {quality_total}, confidence weights sum to {confidence_total}"
            )));
        }
        if quality.recency_window_hours == 0 {
            return Err(AnalyticsError::InvalidWeights(
                "recency window must be at least one hour".to_string(),
            ));
        }
        Ok(Self { quality, confidence })
    }

    /// `completeness * w1 + recency * w2 + accuracy * w3`, rounded to four digits.
    pub fn quality_score(&self, samples: &[MetricSample], now: DateTime<Utc>) -> Decimal {
        if samples.is_empty() {
            return Decimal::ZERO;
        }
        let w = &self.quality;
        let score = completeness(samples) * w.completeness
            + self.recency(samples, now) * w.recency
            + accuracy(samples) * w.accuracy;

        stats::round(clamp_unit(score))
    }

    /// `sample size * w1 + dispersion * w2 + outlier * w3`, rounded to four digits.
    pub fn confidence_score(&self, samples: &[MetricSample], value: Decimal) -> Decimal {
        if samples.is_empty() {
            return Decimal::ZERO;
        }
        let values = sample_values(samples);
        let w = &self.confidence;
        let score = sample_size_score(samples.len()) * w.sample_size
            + variance_score(&values) * w.variance
            + self.outlier_score(&values, value) * w.outlier;

        stats::round(clamp_unit(score))
    }

    /// Mean per-sample freshness, decaying linearly to zero over the recency window.
    pub fn recency(&self, samples: &[MetricSample], now: DateTime<Utc>) -> Decimal {
        if samples.is_empty() {
            return Decimal::ZERO;
        }
        let window_hours = Decimal::from(self.quality.recency_window_hours);
        let total: Decimal = samples
            .iter()
            .map(|s| {
                let hours = Decimal::from((now - s.calculated_at).num_seconds()) / dec!(3600);
                clamp_unit(Decimal::ONE - hours / window_hours)
            })
            .sum();
        total / Decimal::from(samples.len())
    }

    /// `1.0` when `value` lies inside `[Q1 - k*IQR, Q3 + k*IQR]`, `0.5` otherwise.
    /// Fewer than three values cannot reveal an outlier and always score `1.0`.
    pub fn outlier_score(&self, values: &[Decimal], value: Decimal) -> Decimal {
        if values.len() < 3 {
            return Decimal::ONE;
        }
        let (q1, q3) = stats::quartiles(values);
        let bounds = q3
            .checked_sub(q1)
            .and_then(|iqr| iqr.checked_mul(self.confidence.iqr_fence))
            .and_then(|fence| Some((q1.checked_sub(fence)?, q3.checked_add(fence)?)));
        match bounds {
            Some((lower, upper)) if value < lower || value > upper => dec!(0.5),
            _ => Decimal::ONE,
        }
    }
}

/// Share of samples carrying both a value and a declared quality.
pub fn completeness(samples: &[MetricSample]) -> Decimal {
    if samples.is_empty() {
        return Decimal::ZERO;
    }
    let complete = samples
        .iter()
        .filter(|s| s.value.is_some() && s.quality_score.is_some())
        .count();
    Decimal::from(complete) / Decimal::from(samples.len())
}

/// Mean of the samples' declared quality scores, `0` when none declare one.
pub fn accuracy(samples: &[MetricSample]) -> Decimal {
    let declared: Vec<Decimal> = samples.iter().filter_map(|s| s.quality_score).collect();
    if declared.is_empty() {
        return Decimal::ZERO;
    }
    declared.iter().sum::<Decimal>() / Decimal::from(declared.len())
}

pub fn sample_size_score(n: usize) -> Decimal {
    match n {
        100.. => Decimal::ONE,
        30.. => dec!(0.8),
        10.. => dec!(0.6),
        5.. => dec!(0.4),
        1.. => dec!(0.2),
        0 => Decimal::ZERO,
    }
}

/// `1 - min(CoV, 1)`, with `0.5` as the neutral score when the coefficient of variation
/// is undefined (fewer than two values or a zero mean).
pub fn variance_score(values: &[Decimal]) -> Decimal {
    if values.len() < 2 {
        return dec!(0.5);
    }
    let mean = stats::mean(values);
    if mean.is_zero() {
        return dec!(0.5);
    }
    match stats::standard_deviation(values).checked_div(mean.abs()) {
        Some(cov) => Decimal::ONE - cov.min(Decimal::ONE),
        None => Decimal::ZERO,
    }
}

/// The non-null values of a sample set, in input order.
pub fn sample_values(samples: &[MetricSample]) -> Vec<Decimal> {
    samples.iter().filter_map(|s| s.value).collect()
}

fn clamp_unit(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).min(Decimal::ONE)
}
