use crate::error::SourceError;
use crate::source::{DataSource, SampleStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Measure, MetricSample, MetricType, PeriodWindow};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A sample store held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemorySampleStore {
    samples: RwLock<Vec<MetricSample>>,
}

impl InMemorySampleStore {
    pub fn new(samples: Vec<MetricSample>) -> Self {
        Self { samples: RwLock::new(samples) }
    }

    /// A copy of every stored sample, in insertion order.
    pub async fn snapshot(&self) -> Vec<MetricSample> {
        self.samples.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.samples.read().await.len()
    }
}

#[async_trait]
impl SampleStore for InMemorySampleStore {
    async fn query(
        &self,
        metric_type: MetricType,
        entity_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>, SourceError> {
        let mut matching: Vec<MetricSample> = self
            .samples
            .read()
            .await
            .iter()
            .filter(|s| s.metric_type == metric_type && s.entity_id == entity_id && s.overlaps(start, end))
            .cloned()
            .collect();
        matching.sort_by_key(|s| s.period_start);
        Ok(matching)
    }

    /// Upserts by period: a sample replaces the stored one of the same metric, entity
    /// and bucket with the same `computed` flag.
    async fn save(&self, sample: &MetricSample) -> Result<(), SourceError> {
        let mut samples = self.samples.write().await;
        match samples
            .iter_mut()
            .find(|s| s.computed == sample.computed && s.same_period(sample))
        {
            Some(existing) => *existing = sample.clone(),
            None => samples.push(sample.clone()),
        }
        Ok(())
    }
}

/// An explicit measure value for one entity, as loaded from a fixture.
#[derive(Debug, Clone, Deserialize)]
pub struct MeasureOverride {
    pub entity_id: Uuid,
    pub measure: Measure,
    pub value: Decimal,
}

/// The JSON document the CLI loads: samples already in the store, raw observations
/// served by the data source, and explicit measure values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub stored: Vec<MetricSample>,
    pub observations: Vec<MetricSample>,
    pub measures: Vec<MeasureOverride>,
}

/// A data source serving raw observations and measures from memory.
///
/// Measures without an explicit override are derived from the observations: room,
/// booking and revenue counts are sums over the window, total rooms is the latest
/// available-rooms observation and average guest revenue is total revenue per booking.
/// Stay frequency and guest lifespan cannot be derived and are unavailable unless set.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    observations: Vec<MetricSample>,
    overrides: HashMap<(Uuid, Measure), Decimal>,
    latency: Option<Duration>,
}

impl InMemoryDataSource {
    pub fn new(observations: Vec<MetricSample>) -> Self {
        Self { observations, ..Self::default() }
    }

    pub fn with_measure(mut self, entity_id: Uuid, measure: Measure, value: Decimal) -> Self {
        self.overrides.insert((entity_id, measure), value);
        self
    }

    /// Delays every answer, e.g. to exercise the caller's timeout.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn observed(&self, metric_type: MetricType, entity_id: Uuid, window: &PeriodWindow) -> Vec<&MetricSample> {
        self.observations
            .iter()
            .filter(|s| {
                s.metric_type == metric_type
                    && s.entity_id == entity_id
                    && s.overlaps(window.start, window.end)
            })
            .collect()
    }

    fn observed_sum(&self, metric_type: MetricType, entity_id: Uuid, window: &PeriodWindow) -> Decimal {
        self.observed(metric_type, entity_id, window)
            .iter()
            .filter_map(|s| s.value)
            .sum()
    }
}

impl Fixture {
    /// Splits the fixture into the store and the data source the calculator reads.
    pub fn into_collaborators(self) -> (InMemorySampleStore, InMemoryDataSource) {
        let source = self
            .measures
            .into_iter()
            .fold(InMemoryDataSource::new(self.observations), |source, m| {
                source.with_measure(m.entity_id, m.measure, m.value)
            });
        (InMemorySampleStore::new(self.stored), source)
    }
}

#[async_trait]
impl DataSource for InMemoryDataSource {
    async fn fetch_samples(
        &self,
        metric_type: MetricType,
        entity_id: Uuid,
        window: &PeriodWindow,
    ) -> Result<Vec<MetricSample>, SourceError> {
        self.simulate_latency().await;
        Ok(self
            .observed(metric_type, entity_id, window)
            .into_iter()
            .filter(|s| s.granularity == window.granularity)
            .cloned()
            .collect())
    }

    async fn measure(
        &self,
        measure: Measure,
        entity_id: Uuid,
        window: &PeriodWindow,
    ) -> Result<Decimal, SourceError> {
        self.simulate_latency().await;
        if let Some(value) = self.overrides.get(&(entity_id, measure)) {
            return Ok(*value);
        }

        let value = match measure {
            Measure::OccupiedRooms => self.observed_sum(MetricType::OccupiedRooms, entity_id, window),
            Measure::RoomRevenue => self.observed_sum(MetricType::RoomRevenue, entity_id, window),
            Measure::TotalRevenue => self.observed_sum(MetricType::TotalRevenue, entity_id, window),
            Measure::TotalBookings => self.observed_sum(MetricType::TotalBookings, entity_id, window),
            Measure::CancelledBookings => {
                self.observed_sum(MetricType::CancelledBookings, entity_id, window)
            }
            Measure::TotalRooms => self
                .observed(MetricType::AvailableRooms, entity_id, window)
                .into_iter()
                .max_by_key(|s| s.period_start)
                .and_then(|s| s.value)
                .unwrap_or(Decimal::ZERO),
            Measure::AverageGuestRevenue => {
                let bookings = self.observed_sum(MetricType::TotalBookings, entity_id, window);
                crate::formulas::safe_div(
                    self.observed_sum(MetricType::TotalRevenue, entity_id, window),
                    bookings,
                )
            }
            Measure::AverageStayFrequency | Measure::AverageGuestLifespan => {
                return Err(SourceError::Unavailable(format!(
                    "no {measure:?} recorded for entity {entity_id}"
                )));
            }
        };
        Ok(value)
    }
}
