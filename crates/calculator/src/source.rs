use crate::error::SourceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Measure, MetricResult, MetricSample, MetricType, PeriodWindow};
use rust_decimal::Decimal;
use uuid::Uuid;

/// The persistent archive of metric samples.
///
/// The calculator reads from it on every request and may offer computed results back
/// for later derived calculations. Consistency of concurrent reads and writes is the
/// implementation's concern.
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Returns every stored sample of `metric_type` for `entity_id` whose period overlaps
    /// `[start, end)`.
    async fn query(
        &self,
        metric_type: MetricType,
        entity_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>, SourceError>;

    /// Persists a computed sample. Best-effort: callers log and swallow failures.
    async fn save(&self, sample: &MetricSample) -> Result<(), SourceError>;
}

/// The connector that supplies raw observations and counts when nothing is stored.
///
/// Every call is wrapped in the caller's timeout; an error or a timeout degrades to
/// "no data" rather than failing the calculation.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_samples(
        &self,
        metric_type: MetricType,
        entity_id: Uuid,
        window: &PeriodWindow,
    ) -> Result<Vec<MetricSample>, SourceError>;

    /// A named numeric input of a formula metric (occupied rooms, total revenue, ...)
    /// for one entity over the window.
    async fn measure(
        &self,
        measure: Measure,
        entity_id: Uuid,
        window: &PeriodWindow,
    ) -> Result<Decimal, SourceError>;
}

/// Decides whether a computed result is fit to be persisted.
///
/// A rejected result is still returned to the caller, with a note.
pub trait Validator: Send + Sync {
    fn is_valid_result(&self, result: &MetricResult) -> bool;
}
