use crate::calculator::{has_data, Calculation, MetricCalculator};
use analytics::stats;
use core_types::{
    format_value, AggregationFunction, CalculationMethod, MetricCategory, MetricResult,
    MetricSample, MetricType, PeriodWindow,
};
use futures::StreamExt;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Fans metric calculations out across entities and combines them into one value each.
///
/// Per-entity calculations run concurrently, bounded by the calculator's worker count.
/// An entity whose calculation fails or finds no samples is skipped rather than counted
/// as zero.
pub struct Aggregator {
    calculator: Arc<MetricCalculator>,
}

impl Aggregator {
    pub fn new(calculator: Arc<MetricCalculator>) -> Self {
        Self { calculator }
    }

    /// One pooled result per requested metric, in request order.
    pub async fn aggregate(
        &self,
        metric_types: &[MetricType],
        entity_ids: &[Uuid],
        window: &PeriodWindow,
        function: AggregationFunction,
    ) -> Vec<MetricResult> {
        let mut results = Vec::with_capacity(metric_types.len());
        for metric_type in metric_types {
            results.push(self.aggregate_metric(*metric_type, entity_ids, window, function).await);
        }
        results
    }

    #[tracing::instrument(name = "aggregate", skip(self, entity_ids, window), fields(entities = entity_ids.len()))]
    pub async fn aggregate_metric(
        &self,
        metric_type: MetricType,
        entity_ids: &[Uuid],
        window: &PeriodWindow,
        function: AggregationFunction,
    ) -> MetricResult {
        let calculations: Vec<Calculation> = futures::stream::iter(entity_ids.iter().copied())
            .map(|entity_id| self.calculator.calculate(metric_type, entity_id, window))
            .buffer_unordered(self.calculator.workers())
            .collect()
            .await;

        let contributing: Vec<&Calculation> = calculations.iter().filter(|c| has_data(&c.result)).collect();
        let skipped = calculations.len() - contributing.len();
        if skipped > 0 {
            tracing::debug!(metric = %metric_type, skipped, "Entities without data were skipped.");
        }

        let values: Vec<Decimal> = contributing.iter().filter_map(|c| c.result.value).collect();
        let pooled: Vec<MetricSample> = contributing.iter().flat_map(|c| c.samples.iter().cloned()).collect();
        let value = stats::round(combine(function, &values));
        let now = self.calculator.now();
        let scorer = self.calculator.scorer();

        let category = match function {
            AggregationFunction::Count => MetricCategory::Count,
            _ => metric_type.category(),
        };
        let unit = match function {
            AggregationFunction::Count => "entities".to_string(),
            _ => metric_type.unit().to_string(),
        };

        let mut result = MetricResult {
            metric_type,
            entity_id: None,
            granularity: window.granularity,
            period_start: window.start,
            period_end: window.end,
            value: Some(value),
            formatted_value: format_value(category, value),
            unit,
            quality_score: scorer.quality_score(&pooled, now),
            confidence_score: scorer.confidence_score(&pooled, value),
            calculation_method: CalculationMethod::Aggregated,
            sample_count: pooled.len(),
            notes: None,
            calculated_at: now,
        };
        result.push_note(format!(
            "{function:?} over {} of {} entities",
            values.len(),
            entity_ids.len()
        ));
        tracing::info!(metric = %metric_type, value = %result.formatted_value, "Aggregated metric.");
        result
    }
}

/// Combines per-entity values. Every function yields `0` for an empty input.
pub fn combine(function: AggregationFunction, values: &[Decimal]) -> Decimal {
    match function {
        AggregationFunction::Sum => stats::sum(values),
        AggregationFunction::Average => stats::mean(values),
        AggregationFunction::Median => stats::median(values),
        AggregationFunction::Min => stats::min(values),
        AggregationFunction::Max => stats::max(values),
        AggregationFunction::Count => Decimal::from(values.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::memory::{InMemoryDataSource, InMemorySampleStore};
    use crate::source::SampleStore;
    use crate::validator::RangeValidator;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use configuration::Settings;
    use core_types::{FixedClock, Granularity};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, d, 0, 0, 0).unwrap()
    }

    fn window() -> PeriodWindow {
        PeriodWindow::new(at(1), at(2), Granularity::Daily).unwrap()
    }

    fn revenue(entity: Uuid, value: Decimal) -> MetricSample {
        MetricSample::new(MetricType::RoomRevenue, entity, &window(), Some(value), at(2)).with_quality(dec!(1))
    }

    /// Serves stored samples, except for one entity whose lookups blow up.
    struct BrokenForEntity {
        inner: InMemorySampleStore,
        broken: Uuid,
    }

    #[async_trait]
    impl SampleStore for BrokenForEntity {
        async fn query(
            &self,
            metric_type: MetricType,
            entity_id: Uuid,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<MetricSample>, SourceError> {
            if entity_id == self.broken {
                panic!("corrupt partition");
            }
            self.inner.query(metric_type, entity_id, start, end).await
        }

        async fn save(&self, sample: &MetricSample) -> Result<(), SourceError> {
            self.inner.save(sample).await
        }
    }

    fn aggregator_over(store: Arc<dyn SampleStore>) -> Aggregator {
        let mut settings = Settings::default();
        settings.forecast.worker_threads = 1;
        settings.calculator.aggregation_workers = 2;
        let calculator = MetricCalculator::new(
            &settings,
            store,
            Arc::new(InMemoryDataSource::default()),
            Arc::new(RangeValidator),
            Arc::new(FixedClock(at(3))),
        )
        .unwrap();
        Aggregator::new(Arc::new(calculator))
    }

    fn aggregator(samples: Vec<MetricSample>) -> Aggregator {
        aggregator_over(Arc::new(InMemorySampleStore::new(samples)))
    }

    #[rstest]
    #[case(AggregationFunction::Sum, dec!(600))]
    #[case(AggregationFunction::Average, dec!(200))]
    #[case(AggregationFunction::Median, dec!(150))]
    #[case(AggregationFunction::Min, dec!(100))]
    #[case(AggregationFunction::Max, dec!(350))]
    #[case(AggregationFunction::Count, dec!(3))]
    #[tokio::test]
    async fn combines_entities_and_skips_those_without_data(
        #[case] function: AggregationFunction,
        #[case] expected: Decimal,
    ) {
        let hotels: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let samples = vec![
            revenue(hotels[0], dec!(100)),
            revenue(hotels[1], dec!(150)),
            revenue(hotels[2], dec!(350)),
        ];

        let result = aggregator(samples)
            .aggregate_metric(MetricType::RoomRevenue, &hotels, &window(), function)
            .await;

        assert_eq!(result.value, Some(expected));
        assert_eq!(result.entity_id, None);
        assert_eq!(result.calculation_method, CalculationMethod::Aggregated);
        assert_eq!(result.sample_count, 3);
        assert!(result.notes.unwrap().contains("3 of 4 entities"));
    }

    #[tokio::test]
    async fn an_entity_whose_calculation_fails_is_skipped() {
        let hotels: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let store = BrokenForEntity {
            inner: InMemorySampleStore::new(vec![
                revenue(hotels[0], dec!(100)),
                revenue(hotels[1], dec!(999)),
                revenue(hotels[2], dec!(300)),
            ]),
            broken: hotels[1],
        };

        let result = aggregator_over(Arc::new(store))
            .aggregate_metric(MetricType::RoomRevenue, &hotels, &window(), AggregationFunction::Sum)
            .await;

        assert_eq!(result.value, Some(dec!(400)));
        assert!(!result.is_error());
        assert_eq!(result.sample_count, 2);
        assert!(result.notes.unwrap().contains("2 of 3 entities"));
    }

    #[rstest]
    #[case(AggregationFunction::Sum)]
    #[case(AggregationFunction::Average)]
    #[case(AggregationFunction::Min)]
    #[case(AggregationFunction::Max)]
    #[tokio::test]
    async fn single_entity_aggregates_to_its_own_value(#[case] function: AggregationFunction) {
        let hotel = Uuid::new_v4();
        let result = aggregator(vec![revenue(hotel, dec!(420.5))])
            .aggregate_metric(MetricType::RoomRevenue, &[hotel], &window(), function)
            .await;
        assert_eq!(result.value, Some(dec!(420.5)));
    }

    #[tokio::test]
    async fn single_entity_count_is_one() {
        let hotel = Uuid::new_v4();
        let result = aggregator(vec![revenue(hotel, dec!(420.5))])
            .aggregate_metric(MetricType::RoomRevenue, &[hotel], &window(), AggregationFunction::Count)
            .await;
        assert_eq!(result.value, Some(Decimal::ONE));
        assert_eq!(result.formatted_value, "1");
    }

    #[tokio::test]
    async fn no_data_anywhere_is_zero_with_zero_scores() {
        let result = aggregator(Vec::new())
            .aggregate_metric(MetricType::RoomRevenue, &[Uuid::new_v4()], &window(), AggregationFunction::Sum)
            .await;
        assert_eq!(result.value, Some(Decimal::ZERO));
        assert_eq!(result.quality_score, Decimal::ZERO);
        assert_eq!(result.confidence_score, Decimal::ZERO);
    }

    #[tokio::test]
    async fn aggregates_each_requested_metric_in_order() {
        let hotel = Uuid::new_v4();
        let results = aggregator(vec![revenue(hotel, dec!(10))])
            .aggregate(
                &[MetricType::RoomRevenue, MetricType::GuestReviews],
                &[hotel],
                &window(),
                AggregationFunction::Sum,
            )
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].metric_type, MetricType::RoomRevenue);
        assert_eq!(results[1].metric_type, MetricType::GuestReviews);
    }

    #[test]
    fn combine_handles_empty_input() {
        for function in [
            AggregationFunction::Sum,
            AggregationFunction::Average,
            AggregationFunction::Median,
            AggregationFunction::Min,
            AggregationFunction::Max,
            AggregationFunction::Count,
        ] {
            assert_eq!(combine(function, &[]), Decimal::ZERO);
        }
    }
}
