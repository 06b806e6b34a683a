use crate::error::ForecastError;
use crate::factory::create_forecaster;
use crate::report::{self, ConfidenceInterval, ForecastResult, MetricForecast};
use crate::{Forecaster, ModelOutput};
use analytics::stats;
use chrono::{DateTime, Utc};
use configuration::ForecastSettings;
use core_types::{ForecastMethod, MetricType};
use rayon::prelude::*;
use rust_decimal::prelude::*;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

/// Builds the forecaster that runs a given method.
type Builder<'a> = dyn Fn(ForecastMethod) -> Result<Box<dyn Forecaster>, ForecastError> + Sync + 'a;

/// The outcome of back-testing every candidate method on one history.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSelection {
    pub method: ForecastMethod,
    pub score: Decimal,
    /// Back-test score of every candidate, in candidate order.
    pub scores: Vec<(ForecastMethod, Decimal)>,
}

/// Selects a forecasting method for a series, projects it, and attaches prediction
/// intervals.
///
/// The flow for one series is `select method -> generate forecast -> compute intervals
/// -> attach accuracy`. Candidate methods are back-tested on a bounded worker pool; a
/// method that fails (or panics) scores zero without affecting the others.
#[derive(Debug)]
pub struct ForecastEngine {
    settings: ForecastSettings,
    pool: rayon::ThreadPool,
}

impl ForecastEngine {
    pub fn new(settings: ForecastSettings) -> Result<Self, ForecastError> {
        let threads = match settings.worker_threads {
            0 => num_cpus::get(),
            n => n,
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("forecast-worker-{i}"))
            .build()?;

        Ok(Self { settings, pool })
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    /// Forecasts `horizon` periods with the best back-tested method.
    ///
    /// Never fails: a history shorter than the configured minimum produces an
    /// `INSUFFICIENT_DATA` forecast.
    #[tracing::instrument(name = "forecast", skip(self, history), fields(points = history.len()))]
    pub fn forecast(&self, history: &[Decimal], horizon: usize) -> MetricForecast {
        if history.len() < self.settings.min_history_points {
            tracing::debug!("Not enough history to forecast.");
            return MetricForecast::insufficient_data(history.len(), horizon);
        }

        let selection = self.select_method(history);
        tracing::info!(method = %selection.method, score = %selection.score, "Selected forecasting method.");

        match self.project(selection.method, selection.score, history, horizon) {
            Ok(forecast) => forecast,
            Err(e) => {
                tracing::warn!(error = %e, method = %selection.method, "Selected method failed, using the default.");
                let fallback = ForecastMethod::DEFAULT;
                let score = self.backtest(fallback, history);
                self.project(fallback, score, history, horizon)
                    .unwrap_or_else(|_| MetricForecast::insufficient_data(history.len(), horizon))
            }
        }
    }

    /// Forecasts with a caller-chosen method, skipping selection.
    pub fn forecast_with(
        &self,
        method: ForecastMethod,
        history: &[Decimal],
        horizon: usize,
    ) -> Result<MetricForecast, ForecastError> {
        if history.len() < self.settings.min_history_points {
            return Ok(MetricForecast::insufficient_data(history.len(), horizon));
        }
        let score = self.backtest(method, history);
        self.project(method, score, history, horizon)
    }

    /// Back-tests every candidate and picks the highest score.
    ///
    /// Ties favour the default method first, then candidate order.
    pub fn select_method(&self, history: &[Decimal]) -> MethodSelection {
        self.select_with(history, &self.factory())
    }

    fn select_with(&self, history: &[Decimal], build: &Builder<'_>) -> MethodSelection {
        let scores: Vec<(ForecastMethod, Decimal)> = self.pool.install(|| {
            ForecastMethod::CANDIDATES
                .par_iter()
                .map(|&method| (method, self.backtest_with(method, history, build)))
                .collect()
        });

        let default_score = scores
            .iter()
            .find(|(method, _)| *method == ForecastMethod::DEFAULT)
            .map(|(_, score)| *score)
            .unwrap_or(Decimal::ZERO);

        let (method, score) = scores
            .iter()
            .fold((ForecastMethod::DEFAULT, default_score), |best, &(method, score)| {
                if score > best.1 { (method, score) } else { best }
            });

        MethodSelection { method, score, scores }
    }

    /// `max(0, 1 - MAPE)` of `method` forecasting the held-out tail of `history` from
    /// its head. Zero when the history is too short or the method fails.
    pub fn backtest(&self, method: ForecastMethod, history: &[Decimal]) -> Decimal {
        self.backtest_with(method, history, &self.factory())
    }

    fn backtest_with(&self, method: ForecastMethod, history: &[Decimal], build: &Builder<'_>) -> Decimal {
        let n = history.len();
        if n < self.settings.min_backtest_points.max(2) {
            return Decimal::ZERO;
        }

        let train_len = (Decimal::from(n) * self.settings.train_ratio)
            .floor()
            .to_usize()
            .unwrap_or(0)
            .clamp(1, n - 1);
        let (train, test) = history.split_at(train_len);

        match self.run_method(method, train, test.len(), build) {
            Ok(output) => match mean_absolute_percentage_error(test, &output.values) {
                Some(mape) => stats::round((Decimal::ONE - mape).max(Decimal::ZERO)),
                None => Decimal::ZERO,
            },
            Err(e) => {
                tracing::debug!(%method, error = %e, "Back-test failed.");
                Decimal::ZERO
            }
        }
    }

    /// Prediction intervals around `values`, using the standard deviation of the history
    /// as the standard error for every period. Bounds saturate at the `Decimal` limits.
    pub fn confidence_intervals(&self, history: &[Decimal], values: &[Decimal]) -> Vec<ConfidenceInterval> {
        let standard_error = stats::standard_deviation(history);
        let margin_80 = standard_error.saturating_mul(self.settings.z_score_80);
        let margin_95 = standard_error.saturating_mul(self.settings.z_score_95);

        values
            .iter()
            .enumerate()
            .map(|(i, value)| ConfidenceInterval {
                period: i + 1,
                forecast_value: *value,
                confidence_80_lower: stats::round(value.saturating_sub(margin_80)),
                confidence_80_upper: stats::round(value.saturating_add(margin_80)),
                confidence_95_lower: stats::round(value.saturating_sub(margin_95)),
                confidence_95_upper: stats::round(value.saturating_add(margin_95)),
            })
            .collect()
    }

    /// Forecasts each series independently and averages their scores.
    pub fn forecast_metrics(
        &self,
        series: &BTreeMap<MetricType, Vec<Decimal>>,
        horizon: usize,
        generated_at: DateTime<Utc>,
    ) -> ForecastResult {
        let forecasts: BTreeMap<MetricType, MetricForecast> = series
            .iter()
            .map(|(metric, history)| (*metric, self.forecast(history, horizon)))
            .collect();

        let accuracies: Vec<Decimal> = forecasts.values().map(|f| f.accuracy_score).collect();
        let confidences: Vec<Decimal> = forecasts.values().map(|f| f.confidence_score).collect();

        ForecastResult {
            overall_accuracy: stats::mean(&accuracies),
            overall_confidence: stats::mean(&confidences),
            forecasts,
            horizon,
            assumptions: report::assumptions(self.settings.season_length),
            limitations: report::limitations(),
            generated_at,
        }
    }

    fn project(
        &self,
        method: ForecastMethod,
        backtest_score: Decimal,
        history: &[Decimal],
        horizon: usize,
    ) -> Result<MetricForecast, ForecastError> {
        let output = self.run_method(method, history, horizon, &self.factory())?;
        let values: Vec<Decimal> = output.values.iter().map(|v| stats::round(*v)).collect();
        let confidence_intervals = self.confidence_intervals(history, &values);

        Ok(MetricForecast {
            forecast_values: values,
            confidence_intervals,
            accuracy_score: self.settings.accuracy.get(method),
            confidence_score: stats::round(output.base_confidence),
            backtest_score,
            method_used: method,
            has_seasonality: output.has_seasonality,
            has_trend: output.has_trend,
            parameters: output.parameters,
            historical_sample_count: history.len(),
            horizon,
        })
    }

    fn factory(&self) -> impl Fn(ForecastMethod) -> Result<Box<dyn Forecaster>, ForecastError> + Sync + '_ {
        move |method| create_forecaster(method, &self.settings)
    }

    /// Runs one method in isolation so a failing method cannot take down its caller.
    fn run_method(
        &self,
        method: ForecastMethod,
        history: &[Decimal],
        horizon: usize,
        build: &Builder<'_>,
    ) -> Result<ModelOutput, ForecastError> {
        let output = panic::catch_unwind(AssertUnwindSafe(|| build(method)?.forecast(history, horizon)))
        .unwrap_or_else(|_| {
            Err(ForecastError::MethodFailed(
                method.code().to_string(),
                "the method panicked".to_string(),
            ))
        })?;

        if output.values.len() != horizon {
            return Err(ForecastError::MethodFailed(
                method.code().to_string(),
                format!("produced {} values for a horizon of {horizon}", output.values.len()),
            ));
        }
        Ok(output)
    }
}

/// Mean of `|actual - predicted| / |actual|`, skipping zero actuals. `None` when every
/// actual is zero or the errors overflow.
pub fn mean_absolute_percentage_error(actual: &[Decimal], predicted: &[Decimal]) -> Option<Decimal> {
    let errors = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| !a.is_zero())
        .map(|(a, p)| a.checked_sub(*p)?.abs().checked_div(a.abs()))
        .collect::<Option<Vec<Decimal>>>()?;

    if errors.is_empty() {
        return None;
    }
    stats::checked_sum(errors.iter().copied())?.checked_div(Decimal::from(errors.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn engine() -> ForecastEngine {
        let settings = ForecastSettings { worker_threads: 2, ..ForecastSettings::default() };
        ForecastEngine::new(settings).unwrap()
    }

    fn noisy_series() -> Vec<Decimal> {
        [61, 64, 59, 70, 72, 68, 75, 73, 78, 74, 80, 83, 79, 85, 88, 84, 90, 87]
            .into_iter()
            .map(Decimal::from)
            .collect()
    }

    fn weekly_pattern(weeks: usize) -> Vec<Decimal> {
        let week = [dec!(100), dec!(120), dec!(130), dec!(125), dec!(140), dec!(180), dec!(170)];
        week.iter().copied().cycle().take(7 * weeks).collect()
    }

    #[rstest]
    #[case(ForecastMethod::SimpleExponentialSmoothing)]
    #[case(ForecastMethod::SimpleMovingAverage)]
    fn constant_series_projects_constant(#[case] method: ForecastMethod) {
        let forecast = engine().forecast_with(method, &[dec!(10); 5], 3).unwrap();
        assert_eq!(forecast.forecast_values, vec![dec!(10); 3]);
        assert_eq!(forecast.method_used, method);
    }

    #[test]
    fn holt_projects_along_the_slope() {
        let forecast = engine()
            .forecast_with(
                ForecastMethod::DoubleExponentialSmoothing,
                &[dec!(10), dec!(20), dec!(30), dec!(40)],
                3,
            )
            .unwrap();
        assert_eq!(forecast.forecast_values, vec![dec!(50), dec!(60), dec!(70)]);
        assert!(forecast.has_trend);
    }

    #[rstest]
    #[case(1)]
    #[case(5)]
    #[case(12)]
    fn horizon_yields_exactly_that_many_values_and_intervals(#[case] horizon: usize) {
        let forecast = engine().forecast(&noisy_series(), horizon);
        assert_eq!(forecast.forecast_values.len(), horizon);
        assert_eq!(forecast.confidence_intervals.len(), horizon);
        assert_eq!(forecast.horizon, horizon);

        for (interval, value) in forecast.confidence_intervals.iter().zip(&forecast.forecast_values) {
            assert_eq!(interval.forecast_value, *value);
            assert!(interval.confidence_80_lower <= *value && *value <= interval.confidence_80_upper);
            assert!(interval.confidence_95_lower < interval.confidence_80_lower);
            assert!(interval.confidence_95_upper > interval.confidence_80_upper);
        }
    }

    #[test]
    fn short_history_is_insufficient_data() {
        let forecast = engine().forecast(&[dec!(5), dec!(6)], 4);
        assert_eq!(forecast.method_used, ForecastMethod::InsufficientData);
        assert_eq!(forecast.forecast_values, vec![Decimal::ZERO; 4]);
        assert_eq!(forecast.confidence_intervals.len(), 4);
        assert_eq!(forecast.confidence_score, Decimal::ZERO);
        assert_eq!(forecast.historical_sample_count, 2);
    }

    #[test]
    fn unscoreable_history_falls_back_to_default_method() {
        // Five points are too few to back-test, so every candidate scores zero.
        let history = [dec!(3), dec!(9), dec!(4), dec!(8), dec!(5)];
        let selection = engine().select_method(&history);
        assert!(selection.scores.iter().all(|(_, score)| score.is_zero()));
        assert_eq!(selection.method, ForecastMethod::SimpleExponentialSmoothing);
        assert_eq!(engine().forecast(&history, 2).method_used, ForecastMethod::SimpleExponentialSmoothing);
    }

    #[test]
    fn linear_history_selects_a_trend_method() {
        let history: Vec<Decimal> = (1..=20).map(Decimal::from).collect();
        let forecast = engine().forecast(&history, 3);
        assert_eq!(forecast.method_used, ForecastMethod::DoubleExponentialSmoothing);
        assert_eq!(forecast.backtest_score, Decimal::ONE);
        assert_eq!(forecast.forecast_values, vec![dec!(21), dec!(22), dec!(23)]);
    }

    #[test]
    fn seasonal_history_selects_holt_winters() {
        let forecast = engine().forecast(&weekly_pattern(3), 7);
        assert_eq!(forecast.method_used, ForecastMethod::TripleExponentialSmoothing);
        assert!(forecast.has_seasonality);
        assert_eq!(forecast.forecast_values, weekly_pattern(1));
        assert_eq!(forecast.accuracy_score, dec!(0.80));
    }

    #[test]
    fn flat_history_has_degenerate_intervals() {
        let forecast = engine().forecast(&[dec!(4); 8], 2);
        for interval in &forecast.confidence_intervals {
            assert_eq!(interval.confidence_95_lower, interval.forecast_value);
            assert_eq!(interval.confidence_95_upper, interval.forecast_value);
        }
    }

    struct Diverging;

    impl Forecaster for Diverging {
        fn forecast(&self, _history: &[Decimal], _horizon: usize) -> Result<ModelOutput, ForecastError> {
            panic!("smoothing diverged")
        }
    }

    struct Refusing;

    impl Forecaster for Refusing {
        fn forecast(&self, _history: &[Decimal], _horizon: usize) -> Result<ModelOutput, ForecastError> {
            Err(ForecastError::NotEnoughData("refused".to_string()))
        }
    }

    #[test]
    fn failing_candidates_score_zero_while_the_rest_are_scored() {
        let engine = engine();
        let history: Vec<Decimal> = (1..=20).map(Decimal::from).collect();
        let build = |method: ForecastMethod| -> Result<Box<dyn Forecaster>, ForecastError> {
            match method {
                ForecastMethod::LinearRegression => Ok(Box::new(Diverging)),
                ForecastMethod::WeightedMovingAverage => Ok(Box::new(Refusing)),
                other => create_forecaster(other, engine.settings()),
            }
        };

        let selection = engine.select_with(&history, &build);
        let score_of = |wanted: ForecastMethod| selection.scores.iter().find(|(m, _)| *m == wanted).map(|(_, s)| *s);

        assert_eq!(selection.scores.len(), ForecastMethod::CANDIDATES.len());
        assert_eq!(score_of(ForecastMethod::LinearRegression), Some(Decimal::ZERO));
        assert_eq!(score_of(ForecastMethod::WeightedMovingAverage), Some(Decimal::ZERO));
        assert_eq!(score_of(ForecastMethod::DoubleExponentialSmoothing), Some(Decimal::ONE));
        assert_eq!(selection.method, ForecastMethod::DoubleExponentialSmoothing);
    }

    #[test]
    fn a_panicking_method_is_reported_as_failed() {
        let engine = engine();
        let diverging = |_: ForecastMethod| -> Result<Box<dyn Forecaster>, ForecastError> { Ok(Box::new(Diverging)) };
        let err = engine
            .run_method(ForecastMethod::Arima, &[dec!(1), dec!(2)], 2, &diverging)
            .unwrap_err();
        assert!(matches!(err, ForecastError::MethodFailed(ref code, _) if code == "ARIMA"));
    }

    #[test]
    fn large_magnitude_history_forecasts_without_overflowing() {
        let history: Vec<Decimal> = [dec!(500000000000000), dec!(-500000000000000)]
            .into_iter()
            .cycle()
            .take(8)
            .collect();
        let engine = engine();

        let forecast = engine.forecast(&history, 2);
        assert_eq!(forecast.forecast_values.len(), 2);
        assert_eq!(forecast.confidence_intervals.len(), 2);

        let intervals = engine.confidence_intervals(&[dec!(0), dec!(10)], &[Decimal::MAX]);
        assert_eq!(intervals[0].confidence_95_upper, Decimal::MAX);
        assert!(intervals[0].confidence_95_lower < Decimal::MAX);
        assert_eq!(mean_absolute_percentage_error(&[Decimal::MIN], &[Decimal::MAX]), None);
    }

    #[test]
    fn mape_skips_zero_actuals() {
        let actual = [dec!(0), dec!(100), dec!(50)];
        let predicted = [dec!(7), dec!(110), dec!(45)];
        assert_eq!(mean_absolute_percentage_error(&actual, &predicted), Some(dec!(0.1)));
        assert_eq!(mean_absolute_percentage_error(&[dec!(0)], &[dec!(1)]), None);
    }

    #[test]
    fn accuracy_comes_from_the_lookup_table() {
        let engine = engine();
        for method in ForecastMethod::CANDIDATES {
            let forecast = engine.forecast_with(method, &noisy_series(), 2).unwrap();
            assert_eq!(forecast.accuracy_score, engine.settings().accuracy.get(method));
        }
    }

    #[test]
    fn forecasting_several_metrics_averages_scores() {
        let mut series = BTreeMap::new();
        series.insert(MetricType::OccupancyRate, noisy_series());
        series.insert(MetricType::RevPar, vec![dec!(1)]);
        let at = Utc::now();

        let result = engine().forecast_metrics(&series, 4, at);
        assert_eq!(result.forecasts.len(), 2);
        assert_eq!(result.forecasts[&MetricType::RevPar].method_used, ForecastMethod::InsufficientData);

        let occupancy = &result.forecasts[&MetricType::OccupancyRate];
        assert_eq!(result.overall_accuracy, stats::mean(&[occupancy.accuracy_score, Decimal::ZERO]));
        assert_eq!(result.overall_confidence, stats::mean(&[occupancy.confidence_score, Decimal::ZERO]));
        assert!(!result.assumptions.is_empty());
        assert!(!result.limitations.is_empty());
        assert_eq!(result.generated_at, at);
    }
}
