use crate::error::ConfigError;
use rust_decimal::Decimal;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{
    AccuracyTable, CalculatorSettings, ConfidenceWeights, ForecastSettings, QualityWeights,
    SeasonalMode, Settings,
};

/// The default file name looked up by the binary.
pub const DEFAULT_CONFIG_FILE: &str = "metrics.toml";

/// Loads the engine configuration.
///
/// Reads the TOML file at `path` if it exists, overlays any `METRICS__*` environment
/// variables (e.g. `METRICS__FORECAST__ALPHA=0.5`), deserializes the result into the
/// strongly-typed `Settings` struct and validates it.
pub fn load_config(path: &str) -> Result<Settings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("METRICS")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let settings = builder.try_deserialize::<Settings>()?;
    settings.validate()?;
    tracing::debug!(path, "Loaded engine configuration.");

    Ok(settings)
}

impl Settings {
    /// Rejects configurations that would produce scores outside [0, 1] or degenerate
    /// forecasting parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let q = &self.quality;
        check_weights("quality", &[q.completeness, q.recency, q.accuracy])?;
        if q.recency_window_hours == 0 {
            return Err(ConfigError::ValidationError(
                "quality.recency_window_hours must be greater than 0".to_string(),
            ));
        }

        let c = &self.confidence;
        check_weights("confidence", &[c.sample_size, c.variance, c.outlier])?;
        if c.iqr_fence.is_sign_negative() {
            return Err(ConfigError::ValidationError(
                "confidence.iqr_fence must not be negative".to_string(),
            ));
        }

        let f = &self.forecast;
        for (name, factor) in [("alpha", f.alpha), ("beta", f.beta), ("gamma", f.gamma)] {
            if factor <= Decimal::ZERO || factor > Decimal::ONE {
                return Err(ConfigError::ValidationError(format!(
                    "forecast.{name} must be in (0, 1], got {factor}"
                )));
            }
        }
        if f.train_ratio <= Decimal::ZERO || f.train_ratio >= Decimal::ONE {
            return Err(ConfigError::ValidationError(format!(
                "forecast.train_ratio must be in (0, 1), got {}",
                f.train_ratio
            )));
        }
        if f.season_length == 0 || f.moving_average_window == 0 {
            return Err(ConfigError::ValidationError(
                "forecast.season_length and forecast.moving_average_window must be greater than 0"
                    .to_string(),
            ));
        }
        if f.z_score_80 > f.z_score_95 {
            return Err(ConfigError::ValidationError(
                "forecast.z_score_80 must not exceed forecast.z_score_95".to_string(),
            ));
        }

        if self.calculator.max_derivation_depth == 0 {
            return Err(ConfigError::ValidationError(
                "calculator.max_derivation_depth must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_weights(section: &str, weights: &[Decimal]) -> Result<(), ConfigError> {
    if weights.iter().any(|w| w.is_sign_negative()) {
        return Err(ConfigError::ValidationError(format!(
            "{section} weights must not be negative"
        )));
    }
    let total: Decimal = weights.iter().sum();
    if total != Decimal::ONE {
        return Err(ConfigError::ValidationError(format!(
            "{section} weights must sum to 1.0, got {total}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.quality.recency_window_hours, 168);
        assert_eq!(settings.forecast.season_length, 7);
        assert_eq!(
            settings.forecast.accuracy.get(core_types::ForecastMethod::Ensemble),
            dec!(0.85)
        );
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = load_config("does-not-exist-metrics").unwrap();
        assert_eq!(settings.forecast.alpha, dec!(0.3));
        assert_eq!(settings.calculator.max_derivation_depth, 4);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[forecast]\nalpha = 0.5\nseason_length = 12\nseasonal_mode = \"multiplicative\"\n\n[calculator]\ndata_source_timeout_ms = 250"
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let settings = load_config(&path).unwrap();
        assert_eq!(settings.forecast.alpha, dec!(0.5));
        assert_eq!(settings.forecast.season_length, 12);
        assert_eq!(settings.forecast.seasonal_mode, SeasonalMode::Multiplicative);
        assert_eq!(settings.forecast.beta, dec!(0.3));
        assert_eq!(settings.calculator.data_source_timeout_ms, 250);
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let mut settings = Settings::default();
        settings.quality.accuracy = dec!(0.5);
        assert!(matches!(settings.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn rejects_out_of_range_smoothing_factor() {
        let mut settings = Settings::default();
        settings.forecast.gamma = dec!(1.5);
        assert!(settings.validate().is_err());
    }
}
