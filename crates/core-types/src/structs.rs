use crate::enums::{CalculationMethod, Granularity, MetricCategory, MetricType};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single stored observation of a metric for one entity and one time bucket.
///
/// Samples are immutable once stored. They are created by ingestion or by the
/// calculator itself when a computed result is written back for later derived
/// calculations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub sample_id: Uuid,
    pub metric_type: MetricType,
    pub entity_id: Uuid,
    pub granularity: Granularity,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub value: Option<Decimal>,
    /// Declared quality of this observation, in [0, 1].
    pub quality_score: Option<Decimal>,
    pub calculated_at: DateTime<Utc>,
    /// Set on samples written back from a calculated result. Raw observations leave it
    /// unset, and only raw observations feed new calculations.
    #[serde(default)]
    pub computed: bool,
}

impl MetricSample {
    pub fn new(
        metric_type: MetricType,
        entity_id: Uuid,
        window: &PeriodWindow,
        value: Option<Decimal>,
        calculated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sample_id: Uuid::new_v4(),
            metric_type,
            entity_id,
            granularity: window.granularity,
            period_start: window.start,
            period_end: window.end,
            value,
            quality_score: None,
            calculated_at,
            computed: false,
        }
    }

    pub fn with_quality(mut self, quality_score: Decimal) -> Self {
        self.quality_score = Some(quality_score);
        self
    }

    /// True when both samples cover the same metric, entity and time bucket.
    pub fn same_period(&self, other: &MetricSample) -> bool {
        self.metric_type == other.metric_type
            && self.entity_id == other.entity_id
            && self.granularity == other.granularity
            && self.period_start == other.period_start
            && self.period_end == other.period_end
    }

    /// True when the sample's period overlaps the half-open window `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.period_start < end && self.period_end > start
    }
}

/// The outcome of one metric calculation.
///
/// A plain value object: it is never persisted by the engine, and an error outcome is
/// still a `MetricResult` (see `MetricResult::error`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub metric_type: MetricType,
    /// `None` for results pooled across several entities.
    pub entity_id: Option<Uuid>,
    pub granularity: Granularity,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub value: Option<Decimal>,
    pub formatted_value: String,
    pub unit: String,
    pub quality_score: Decimal,
    pub confidence_score: Decimal,
    pub calculation_method: CalculationMethod,
    pub sample_count: usize,
    pub notes: Option<String>,
    pub calculated_at: DateTime<Utc>,
}

impl MetricResult {
    /// The sentinel result returned when a calculation fails internally.
    pub fn error(
        metric_type: MetricType,
        entity_id: Option<Uuid>,
        window: &PeriodWindow,
        reason: impl Into<String>,
        calculated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            metric_type,
            entity_id,
            granularity: window.granularity,
            period_start: window.start,
            period_end: window.end,
            value: None,
            formatted_value: "Error".to_string(),
            unit: metric_type.unit().to_string(),
            quality_score: Decimal::ZERO,
            confidence_score: Decimal::ZERO,
            calculation_method: CalculationMethod::Error,
            sample_count: 0,
            notes: Some(reason.into()),
            calculated_at,
        }
    }

    pub fn is_error(&self) -> bool {
        self.calculation_method == CalculationMethod::Error
    }

    pub fn window(&self) -> PeriodWindow {
        PeriodWindow {
            start: self.period_start,
            end: self.period_end,
            granularity: self.granularity,
        }
    }

    /// Converts a successful single-entity result into a computed sample that can be
    /// written back to the store, carrying the quality score as the sample's declared
    /// quality.
    ///
    /// Only a result covering exactly one bucket of its granularity converts: a longer
    /// window has no single bucket to be stored under.
    pub fn to_sample(&self) -> Option<MetricSample> {
        let entity_id = self.entity_id?;
        let value = self.value?;
        let window = self.window();
        if self.is_error() || !window.is_single_bucket() {
            return None;
        }
        let mut sample = MetricSample::new(self.metric_type, entity_id, &window, Some(value), self.calculated_at)
            .with_quality(self.quality_score);
        sample.computed = true;
        Some(sample)
    }

    /// Appends a sentence to the free-text notes.
    pub fn push_note(&mut self, note: impl AsRef<str>) {
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.is_empty() => format!("{existing}; {}", note.as_ref()),
            _ => note.as_ref().to_string(),
        });
    }
}

/// A half-open time window `[start, end)` at a given granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub granularity: Granularity,
}

impl PeriodWindow {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Self, CoreError> {
        if end <= start {
            return Err(CoreError::InvalidInput(
                "period window".to_string(),
                format!("end ({end}) must be after start ({start})"),
            ));
        }
        Ok(Self { start, end, granularity })
    }

    /// Number of nights covered, rounding a partial day up.
    pub fn nights(&self) -> Decimal {
        let hours = (self.end - self.start).num_hours();
        if hours <= 0 {
            return Decimal::ZERO;
        }
        Decimal::from((hours + 23) / 24)
    }

    /// True when the window is exactly one bucket of its granularity.
    pub fn is_single_bucket(&self) -> bool {
        self.granularity.advance(self.start) == Some(self.end)
    }

    /// Splits the window into consecutive buckets of its granularity. The final bucket is
    /// clipped to the window end.
    pub fn buckets(&self) -> Vec<PeriodWindow> {
        let mut buckets = Vec::new();
        let mut cursor = self.start;
        while cursor < self.end {
            let next = match self.granularity.advance(cursor) {
                Some(next) => next.min(self.end),
                None => self.end,
            };
            buckets.push(PeriodWindow { start: cursor, end: next, granularity: self.granularity });
            cursor = next;
        }
        buckets
    }
}

/// Renders a value using the display pattern of its category.
pub fn format_value(category: MetricCategory, value: Decimal) -> String {
    match category {
        MetricCategory::Currency => {
            let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            let text = format!("{:.2}", rounded.abs());
            let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));
            let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
            format!("{sign}${}.{frac_part}", group_thousands(int_part))
        }
        MetricCategory::Percentage => {
            let rounded = value
                .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
                .normalize();
            format!("{rounded}%")
        }
        MetricCategory::Count => {
            let rounded = value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
            let text = rounded.abs().trunc().to_string();
            let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
            format!("{sign}{}", group_thousands(&text))
        }
        MetricCategory::Score => {
            let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            format!("{rounded:.2}")
        }
    }
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
