use crate::error::ForecastError;
use crate::{require_history, Forecaster, ModelOutput};
use configuration::SeasonalMode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

fn check_factor(name: &str, factor: Decimal) -> Result<(), ForecastError> {
    if factor <= Decimal::ZERO || factor > Decimal::ONE {
        return Err(ForecastError::InvalidParameters(format!(
            "{name} must be in (0, 1], got {factor}"
        )));
    }
    Ok(())
}

/// `level = α·obs + (1-α)·level`, starting from the first value. The final level is
/// repeated across the horizon.
#[derive(Debug, Clone)]
pub struct SimpleExponentialSmoothing {
    alpha: Decimal,
}

impl SimpleExponentialSmoothing {
    pub fn new(alpha: Decimal) -> Result<Self, ForecastError> {
        check_factor("alpha", alpha)?;
        Ok(Self { alpha })
    }
}

impl Forecaster for SimpleExponentialSmoothing {
    fn forecast(&self, history: &[Decimal], horizon: usize) -> Result<ModelOutput, ForecastError> {
        require_history(history, 1)?;
        let level = history[1..]
            .iter()
            .fold(history[0], |level, obs| self.alpha * *obs + (Decimal::ONE - self.alpha) * level);

        Ok(ModelOutput {
            values: vec![level; horizon],
            base_confidence: dec!(0.7),
            has_trend: false,
            has_seasonality: false,
            parameters: BTreeMap::from([("alpha".to_string(), self.alpha)]),
        })
    }
}

/// Holt's linear method: smoothed level and trend, projected as `level + trend·h`.
#[derive(Debug, Clone)]
pub struct DoubleExponentialSmoothing {
    alpha: Decimal,
    beta: Decimal,
}

impl DoubleExponentialSmoothing {
    pub fn new(alpha: Decimal, beta: Decimal) -> Result<Self, ForecastError> {
        check_factor("alpha", alpha)?;
        check_factor("beta", beta)?;
        Ok(Self { alpha, beta })
    }

    /// Final `(level, trend)` after smoothing the whole history.
    fn smooth(&self, history: &[Decimal]) -> (Decimal, Decimal) {
        let mut level = history[0];
        let mut trend = if history.len() > 1 { history[1] - history[0] } else { Decimal::ZERO };

        for obs in &history[1..] {
            let previous = level;
            level = self.alpha * *obs + (Decimal::ONE - self.alpha) * (level + trend);
            trend = self.beta * (level - previous) + (Decimal::ONE - self.beta) * trend;
        }
        (level, trend)
    }
}

impl Forecaster for DoubleExponentialSmoothing {
    fn forecast(&self, history: &[Decimal], horizon: usize) -> Result<ModelOutput, ForecastError> {
        require_history(history, 1)?;
        let (level, trend) = self.smooth(history);
        let values = (1..=horizon).map(|h| level + trend * Decimal::from(h)).collect();

        Ok(ModelOutput {
            values,
            base_confidence: dec!(0.75),
            has_trend: !trend.is_zero(),
            has_seasonality: false,
            parameters: BTreeMap::from([
                ("alpha".to_string(), self.alpha),
                ("beta".to_string(), self.beta),
                ("level".to_string(), level),
                ("trend".to_string(), trend),
            ]),
        })
    }
}

/// Holt-Winters: level, trend and one seasonal index per position in the season.
///
/// Histories shorter than `min_points` (or than one full season plus one value) fall
/// back to double exponential smoothing.
#[derive(Debug, Clone)]
pub struct TripleExponentialSmoothing {
    alpha: Decimal,
    beta: Decimal,
    gamma: Decimal,
    season_length: usize,
    min_points: usize,
    mode: SeasonalMode,
}

impl TripleExponentialSmoothing {
    pub fn new(
        alpha: Decimal,
        beta: Decimal,
        gamma: Decimal,
        season_length: usize,
        min_points: usize,
        mode: SeasonalMode,
    ) -> Result<Self, ForecastError> {
        check_factor("alpha", alpha)?;
        check_factor("beta", beta)?;
        check_factor("gamma", gamma)?;
        if season_length == 0 {
            return Err(ForecastError::InvalidParameters(
                "season length must be greater than 0".to_string(),
            ));
        }
        Ok(Self { alpha, beta, gamma, season_length, min_points, mode })
    }

    /// Removes the seasonal component from an observation.
    fn deseasonalize(&self, obs: Decimal, seasonal: Decimal) -> Decimal {
        match self.mode {
            SeasonalMode::Additive => obs - seasonal,
            SeasonalMode::Multiplicative if seasonal.is_zero() => obs,
            SeasonalMode::Multiplicative => obs / seasonal,
        }
    }

    /// The seasonal component implied by an observation and a level.
    fn seasonal_component(&self, obs: Decimal, level: Decimal) -> Decimal {
        match self.mode {
            SeasonalMode::Additive => obs - level,
            SeasonalMode::Multiplicative if level.is_zero() => Decimal::ONE,
            SeasonalMode::Multiplicative => obs / level,
        }
    }

    fn reseasonalize(&self, base: Decimal, seasonal: Decimal) -> Decimal {
        match self.mode {
            SeasonalMode::Additive => base + seasonal,
            SeasonalMode::Multiplicative => base * seasonal,
        }
    }
}

impl Forecaster for TripleExponentialSmoothing {
    fn forecast(&self, history: &[Decimal], horizon: usize) -> Result<ModelOutput, ForecastError> {
        let m = self.season_length;
        if history.len() < self.min_points.max(m + 1) {
            return DoubleExponentialSmoothing::new(self.alpha, self.beta)?.forecast(history, horizon);
        }

        let season_mean = |season: &[Decimal]| season.iter().sum::<Decimal>() / Decimal::from(m);
        let mut level = season_mean(&history[..m]);
        let mut trend = if history.len() >= 2 * m {
            (season_mean(&history[m..2 * m]) - level) / Decimal::from(m)
        } else {
            Decimal::ZERO
        };
        let mut seasonals: Vec<Decimal> = history[..m]
            .iter()
            .map(|obs| self.seasonal_component(*obs, level))
            .collect();

        for (t, obs) in history.iter().enumerate().skip(m) {
            let seasonal = seasonals[t % m];
            let previous = level;
            level = self.alpha * self.deseasonalize(*obs, seasonal)
                + (Decimal::ONE - self.alpha) * (level + trend);
            trend = self.beta * (level - previous) + (Decimal::ONE - self.beta) * trend;
            seasonals[t % m] = self.gamma * self.seasonal_component(*obs, level)
                + (Decimal::ONE - self.gamma) * seasonal;
        }

        let n = history.len();
        let values = (1..=horizon)
            .map(|h| {
                let base = level + trend * Decimal::from(h);
                self.reseasonalize(base, seasonals[(n - 1 + h) % m])
            })
            .collect();

        Ok(ModelOutput {
            values,
            base_confidence: dec!(0.8),
            has_trend: !trend.is_zero(),
            has_seasonality: true,
            parameters: BTreeMap::from([
                ("alpha".to_string(), self.alpha),
                ("beta".to_string(), self.beta),
                ("gamma".to_string(), self.gamma),
                ("season_length".to_string(), Decimal::from(m)),
            ]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekly_pattern(weeks: usize) -> Vec<Decimal> {
        let week = [dec!(100), dec!(120), dec!(130), dec!(125), dec!(140), dec!(180), dec!(170)];
        week.iter().copied().cycle().take(7 * weeks).collect()
    }

    #[test]
    fn ses_of_constant_series_is_constant() {
        let output = SimpleExponentialSmoothing::new(dec!(0.3))
            .unwrap()
            .forecast(&[dec!(10); 5], 3)
            .unwrap();
        assert_eq!(output.values, vec![dec!(10); 3]);
    }

    #[test]
    fn ses_level_moves_towards_recent_values() {
        // 10 -> 0.3*20 + 0.7*10 = 13
        let output = SimpleExponentialSmoothing::new(dec!(0.3))
            .unwrap()
            .forecast(&[dec!(10), dec!(20)], 1)
            .unwrap();
        assert_eq!(output.values, vec![dec!(13)]);
    }

    #[test]
    fn holt_follows_a_perfect_line() {
        let output = DoubleExponentialSmoothing::new(dec!(0.3), dec!(0.3))
            .unwrap()
            .forecast(&[dec!(10), dec!(20), dec!(30), dec!(40)], 3)
            .unwrap();
        assert_eq!(output.values, vec![dec!(50), dec!(60), dec!(70)]);
        assert_eq!(output.parameters["level"], dec!(40));
        assert_eq!(output.parameters["trend"], dec!(10));
        assert!(output.has_trend);
    }

    #[test]
    fn holt_winters_reproduces_a_stable_season() {
        let model = TripleExponentialSmoothing::new(
            dec!(0.3),
            dec!(0.3),
            dec!(0.3),
            7,
            12,
            SeasonalMode::Additive,
        )
        .unwrap();
        let output = model.forecast(&weekly_pattern(3), 7).unwrap();
        let rounded: Vec<Decimal> = output.values.iter().map(|v| v.round_dp(4)).collect();
        assert_eq!(rounded, weekly_pattern(1));
        assert!(output.has_seasonality);
    }

    #[test]
    fn multiplicative_holt_winters_reproduces_a_stable_season() {
        let model = TripleExponentialSmoothing::new(
            dec!(0.3),
            dec!(0.3),
            dec!(0.3),
            7,
            12,
            SeasonalMode::Multiplicative,
        )
        .unwrap();
        let output = model.forecast(&weekly_pattern(2), 7).unwrap();
        let rounded: Vec<Decimal> = output.values.iter().map(|v| v.round_dp(4)).collect();
        assert_eq!(rounded, weekly_pattern(1));
    }

    #[test]
    fn short_history_falls_back_to_holt() {
        let history: Vec<Decimal> = (1..=8).map(|i| Decimal::from(i * 10)).collect();
        let model = TripleExponentialSmoothing::new(
            dec!(0.3),
            dec!(0.3),
            dec!(0.3),
            7,
            12,
            SeasonalMode::Additive,
        )
        .unwrap();
        let output = model.forecast(&history, 2).unwrap();
        assert!(!output.has_seasonality);
        assert_eq!(output.values, vec![dec!(90), dec!(100)]);
    }

    #[test]
    fn rejects_out_of_range_factors() {
        assert!(SimpleExponentialSmoothing::new(Decimal::ZERO).is_err());
        assert!(DoubleExponentialSmoothing::new(dec!(0.3), dec!(1.2)).is_err());
    }
}
