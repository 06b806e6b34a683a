use crate::error::{CalculatorError, SourceError};
use crate::formulas::{formula_for, MeasureValues};
use crate::source::{DataSource, SampleStore, Validator};
use analytics::scoring::sample_values;
use analytics::{stats, QualityScorer, StatisticalSummary};
use chrono::{DateTime, Utc};
use configuration::{CalculatorSettings, Settings};
use core_types::{
    format_value, CalculationMethod, CalculationStrategy, Clock, Measure, MetricResult,
    MetricSample, MetricType, PeriodWindow,
};
use forecasting::{ForecastEngine, ForecastResult};
use futures::future::{self, BoxFuture};
use futures::{FutureExt, StreamExt};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// The outcome of one calculation: the result, the samples it was computed from, and
/// the sample the caller may persist.
///
/// The calculator never writes to the store on its own during `calculate`; persistence
/// is the caller's decision (or `calculate_and_store`'s).
#[derive(Debug, Clone)]
pub struct Calculation {
    pub result: MetricResult,
    pub samples: Vec<MetricSample>,
    pub to_persist: Option<MetricSample>,
}

/// Turns stored and sourced observations into typed business metrics.
///
/// For a `(metric, entity, window)` request the calculator:
/// 1. resolves the base samples, recursing through the components of derived metrics,
///    reading the store first and falling back to the data source;
/// 2. applies the calculation strategy bound to the metric type;
/// 3. scores the result for quality and confidence;
/// 4. packages a `MetricResult`, turning any internal failure into an error result.
pub struct MetricCalculator {
    store: Arc<dyn SampleStore>,
    source: Arc<dyn DataSource>,
    validator: Arc<dyn Validator>,
    clock: Arc<dyn Clock>,
    scorer: QualityScorer,
    engine: Arc<ForecastEngine>,
    settings: CalculatorSettings,
}

impl MetricCalculator {
    pub fn new(
        settings: &Settings,
        store: Arc<dyn SampleStore>,
        source: Arc<dyn DataSource>,
        validator: Arc<dyn Validator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CalculatorError> {
        let scorer = QualityScorer::new(settings.quality.clone(), settings.confidence.clone())?;
        let engine = ForecastEngine::new(settings.forecast.clone())?;

        Ok(Self {
            store,
            source,
            validator,
            clock,
            scorer,
            engine: Arc::new(engine),
            settings: settings.calculator.clone(),
        })
    }

    pub fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn settings(&self) -> &CalculatorSettings {
        &self.settings
    }

    /// Number of calculations run concurrently by fan-out operations.
    pub fn workers(&self) -> usize {
        match self.settings.aggregation_workers {
            0 => num_cpus::get(),
            n => n,
        }
    }

    /// Calculates one metric for one entity over a window.
    ///
    /// Never fails: an internal error (or panic) produces an error-tagged result whose
    /// notes carry the reason.
    #[tracing::instrument(name = "calculate", skip(self, window), fields(start = %window.start, end = %window.end))]
    pub async fn calculate(
        &self,
        metric_type: MetricType,
        entity_id: Uuid,
        window: &PeriodWindow,
    ) -> Calculation {
        let outcome = AssertUnwindSafe(self.try_calculate(metric_type, entity_id, window))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(CalculatorError::Panicked(metric_type.code().to_string())));

        match outcome {
            Ok(calculation) => calculation,
            Err(e) => {
                tracing::error!(metric = %metric_type, error = %e, "Metric calculation failed.");
                Calculation {
                    result: MetricResult::error(metric_type, Some(entity_id), window, e.to_string(), self.now()),
                    samples: Vec::new(),
                    to_persist: None,
                }
            }
        }
    }

    /// Calculates a metric and offers the result back to the store.
    ///
    /// The result is validated first; a rejected result is returned with a note and not
    /// persisted. A failed write is logged and swallowed.
    pub async fn calculate_and_store(
        &self,
        metric_type: MetricType,
        entity_id: Uuid,
        window: &PeriodWindow,
    ) -> MetricResult {
        let Calculation { mut result, to_persist, .. } = self.calculate(metric_type, entity_id, window).await;
        let Some(sample) = to_persist else {
            return result;
        };

        if !self.validator.is_valid_result(&result) {
            tracing::warn!(metric = %metric_type, value = ?result.value, "Result failed validation, not persisting.");
            result.push_note("Result failed validation and was not persisted");
            return result;
        }

        if let Err(e) = self.store.save(&sample).await {
            tracing::warn!(metric = %metric_type, error = %e, "Failed to persist computed result.");
        }
        result
    }

    async fn try_calculate(
        &self,
        metric_type: MetricType,
        entity_id: Uuid,
        window: &PeriodWindow,
    ) -> Result<Calculation, CalculatorError> {
        let samples = self.resolve_samples(metric_type, entity_id, window, Vec::new()).await?;
        let now = self.now();
        let strategy = metric_type.strategy();

        if samples.is_empty() {
            tracing::debug!(metric = %metric_type, "No samples available for the period.");
            let mut result = self.package(metric_type, entity_id, window, Decimal::ZERO, &samples, now);
            result.quality_score = Decimal::ZERO;
            result.confidence_score = Decimal::ZERO;
            result.push_note("No samples available for the period");
            return Ok(Calculation { result, samples, to_persist: None });
        }

        let value = match strategy {
            CalculationStrategy::Sum => stats::sum(&sample_values(&samples)),
            CalculationStrategy::Average => stats::mean(&sample_values(&samples)),
            CalculationStrategy::Latest => samples
                .iter()
                .max_by_key(|s| s.period_start)
                .and_then(|s| s.value)
                .unwrap_or(Decimal::ZERO),
            CalculationStrategy::Count => Decimal::from(samples.len()),
            CalculationStrategy::Percentage | CalculationStrategy::Ratio | CalculationStrategy::Complex => {
                self.evaluate_formula(metric_type, entity_id, window).await?
            }
        };

        let result = self.package(metric_type, entity_id, window, stats::round(value), &samples, now);
        tracing::info!(
            metric = %metric_type,
            value = %result.formatted_value,
            quality = %result.quality_score,
            confidence = %result.confidence_score,
            samples = result.sample_count,
            "Calculated metric."
        );

        let to_persist = if self.settings.persist_results { result.to_sample() } else { None };
        Ok(Calculation { result, samples, to_persist })
    }

    fn package(
        &self,
        metric_type: MetricType,
        entity_id: Uuid,
        window: &PeriodWindow,
        value: Decimal,
        samples: &[MetricSample],
        now: DateTime<Utc>,
    ) -> MetricResult {
        MetricResult {
            metric_type,
            entity_id: Some(entity_id),
            granularity: window.granularity,
            period_start: window.start,
            period_end: window.end,
            value: Some(value),
            formatted_value: format_value(metric_type.category(), value),
            unit: metric_type.unit().to_string(),
            quality_score: self.scorer.quality_score(samples, now),
            confidence_score: self.scorer.confidence_score(samples, value),
            calculation_method: CalculationMethod::from(metric_type.strategy()),
            sample_count: samples.len(),
            notes: None,
            calculated_at: now,
        }
    }

    /// Gathers the base samples of a metric. Derived metrics pool the samples of their
    /// components over the same window.
    ///
    /// `chain` holds the metrics currently being resolved above this one.
    fn resolve_samples<'a>(
        &'a self,
        metric_type: MetricType,
        entity_id: Uuid,
        window: &'a PeriodWindow,
        chain: Vec<MetricType>,
    ) -> BoxFuture<'a, Result<Vec<MetricSample>, CalculatorError>> {
        async move {
            check_derivation(&chain, metric_type, self.settings.max_derivation_depth)?;
            if !metric_type.is_derived() {
                return Ok(self.direct_samples(metric_type, entity_id, window).await);
            }

            let mut path = chain;
            path.push(metric_type);
            let mut samples = Vec::new();
            for component in metric_type.components() {
                samples.extend(
                    self.resolve_samples(*component, entity_id, window, path.clone()).await?,
                );
            }
            Ok(samples)
        }
        .boxed()
    }

    /// Stored raw samples of the window's granularity, or the data source's when none
    /// are stored. Computed samples written back by `calculate_and_store` are never read
    /// as observations. Failures on either side degrade to an empty list.
    async fn direct_samples(
        &self,
        metric_type: MetricType,
        entity_id: Uuid,
        window: &PeriodWindow,
    ) -> Vec<MetricSample> {
        let stored = match self.store.query(metric_type, entity_id, window.start, window.end).await {
            Ok(samples) => samples,
            Err(e) => {
                tracing::warn!(metric = %metric_type, error = %e, "Sample store query failed.");
                Vec::new()
            }
        };
        let stored: Vec<MetricSample> =
            stored.into_iter().filter(|s| !s.computed && s.granularity == window.granularity).collect();
        if !stored.is_empty() {
            return stored;
        }

        tracing::debug!(metric = %metric_type, "Nothing stored, asking the data source.");
        match self.within_timeout(self.source.fetch_samples(metric_type, entity_id, window)).await {
            Ok(samples) => samples,
            Err(e) => {
                tracing::warn!(metric = %metric_type, error = %e, "Data source failed, treating as no data.");
                Vec::new()
            }
        }
    }

    async fn evaluate_formula(
        &self,
        metric_type: MetricType,
        entity_id: Uuid,
        window: &PeriodWindow,
    ) -> Result<Decimal, CalculatorError> {
        let formula = formula_for(metric_type).ok_or_else(|| {
            CalculatorError::InvalidRequest(format!("{metric_type} has no formula"))
        })?;

        let values: MeasureValues = future::join_all(
            formula
                .measures
                .iter()
                .map(|measure| async move { (*measure, self.fetch_measure(*measure, entity_id, window).await) }),
        )
        .await
        .into_iter()
        .collect();

        let value = (formula.compute)(&values, window.nights());
        tracing::debug!(metric = %metric_type, ?values, %value, "Evaluated formula.");
        Ok(value)
    }

    async fn fetch_measure(&self, measure: Measure, entity_id: Uuid, window: &PeriodWindow) -> Decimal {
        match self.within_timeout(self.source.measure(measure, entity_id, window)).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(?measure, error = %e, "Measure unavailable, using 0.");
                Decimal::ZERO
            }
        }
    }

    /// Bounds a data-source call by the configured timeout.
    async fn within_timeout<T>(
        &self,
        call: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, SourceError> {
        let limit_ms = self.settings.data_source_timeout_ms;
        tokio::time::timeout(Duration::from_millis(limit_ms), call)
            .await
            .unwrap_or(Err(SourceError::Timeout(limit_ms)))
    }

    /// Calculates the metric for each granularity bucket of the window, in order.
    pub async fn bucket_results(
        &self,
        metric_type: MetricType,
        entity_id: Uuid,
        window: &PeriodWindow,
    ) -> Vec<Calculation> {
        let buckets = window.buckets();
        futures::stream::iter(buckets.iter())
            .map(|bucket| self.calculate(metric_type, entity_id, bucket))
            .buffered(self.workers())
            .collect()
            .await
    }

    /// A trailing moving average over the window's granularity buckets.
    ///
    /// Each output point averages the values of up to `points` buckets ending at its own
    /// bucket, ignoring buckets that failed or had no samples. Scores are recomputed over
    /// the pooled samples of the averaged buckets.
    pub async fn rolling_average(
        &self,
        metric_type: MetricType,
        entity_id: Uuid,
        window: &PeriodWindow,
        points: usize,
    ) -> Result<Vec<MetricResult>, CalculatorError> {
        if points == 0 {
            return Err(CalculatorError::InvalidRequest(
                "a moving average needs at least one point".to_string(),
            ));
        }

        let buckets = self.bucket_results(metric_type, entity_id, window).await;
        let now = self.now();

        let results = (0..buckets.len())
            .map(|i| {
                let trailing = &buckets[i.saturating_sub(points - 1)..=i];
                let usable: Vec<&Calculation> = trailing.iter().filter(|c| has_data(&c.result)).collect();
                let values: Vec<Decimal> = usable.iter().filter_map(|c| c.result.value).collect();
                let pooled: Vec<MetricSample> = usable.iter().flat_map(|c| c.samples.iter().cloned()).collect();

                let value = stats::mean(&values);
                let bucket = &buckets[i].result;
                let mut result = MetricResult {
                    metric_type,
                    entity_id: Some(entity_id),
                    granularity: bucket.granularity,
                    period_start: bucket.period_start,
                    period_end: bucket.period_end,
                    value: Some(value),
                    formatted_value: format_value(metric_type.category(), value),
                    unit: metric_type.unit().to_string(),
                    quality_score: self.scorer.quality_score(&pooled, now),
                    confidence_score: self.scorer.confidence_score(&pooled, value),
                    calculation_method: CalculationMethod::MovingAverage,
                    sample_count: pooled.len(),
                    notes: None,
                    calculated_at: now,
                };
                result.push_note(format!("{} of {} periods averaged", values.len(), trailing.len()));
                result
            })
            .collect();

        Ok(results)
    }

    /// One value per granularity bucket of the window, oldest first. Buckets that
    /// failed or had no samples are dropped.
    pub async fn historical_series(
        &self,
        metric_type: MetricType,
        entity_id: Uuid,
        window: &PeriodWindow,
    ) -> Vec<Decimal> {
        self.bucket_results(metric_type, entity_id, window)
            .await
            .into_iter()
            .filter(|c| has_data(&c.result))
            .filter_map(|c| c.result.value)
            .collect()
    }

    /// Forecasts `horizon` periods of each metric from its historical series over the
    /// window.
    pub async fn forecast_metrics(
        &self,
        metric_types: &[MetricType],
        entity_id: Uuid,
        window: &PeriodWindow,
        horizon: usize,
    ) -> Result<ForecastResult, CalculatorError> {
        let mut series = BTreeMap::new();
        for metric_type in metric_types {
            let history = self.historical_series(*metric_type, entity_id, window).await;
            tracing::debug!(metric = %metric_type, points = history.len(), "Collected history.");
            series.insert(*metric_type, history);
        }

        // Back-testing is CPU bound; keep it off the async workers.
        let engine = Arc::clone(&self.engine);
        let generated_at = self.now();
        tokio::task::spawn_blocking(move || engine.forecast_metrics(&series, horizon, generated_at))
            .await
            .map_err(|e| CalculatorError::Worker(e.to_string()))
    }

    /// Descriptive statistics over the resolved sample values of a metric.
    pub async fn summarize(
        &self,
        metric_type: MetricType,
        entity_id: Uuid,
        window: &PeriodWindow,
    ) -> Result<StatisticalSummary, CalculatorError> {
        let samples = self.resolve_samples(metric_type, entity_id, window, Vec::new()).await?;
        Ok(StatisticalSummary::from_values(&sample_values(&samples), self.now()))
    }
}

/// True for results that came from at least one sample and did not fail.
pub(crate) fn has_data(result: &MetricResult) -> bool {
    !result.is_error() && result.sample_count > 0 && result.value.is_some()
}

/// Rejects resolving `metric_type` below `chain` when it is already being resolved
/// (a cycle) or when doing so would exceed `max_depth` levels.
pub fn check_derivation(
    chain: &[MetricType],
    metric_type: MetricType,
    max_depth: usize,
) -> Result<(), CalculatorError> {
    if chain.contains(&metric_type) {
        let path: Vec<&str> = chain.iter().chain([&metric_type]).map(|m| m.code()).collect();
        return Err(CalculatorError::DerivationCycle(path.join(" -> ")));
    }
    if chain.len() >= max_depth {
        return Err(CalculatorError::DerivationTooDeep {
            metric: metric_type.code().to_string(),
            max_depth,
        });
    }
    Ok(())
}
