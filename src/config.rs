use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::models::HistoryDefaults;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid prediction config: {0}")]
    Invalid(String),
}

/// Fixed heuristics driving the prediction pipeline. None of these are
/// learned; they are tunable knobs with textbook defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PredictionConfig {
    /// Shortest gap between starts still counted as a cycle.
    pub min_cycle_days: i64,
    /// Longest gap between starts still counted as a cycle.
    pub max_cycle_days: i64,
    /// Average assumed when fewer than two valid cycles exist.
    pub default_cycle_length: i64,
    /// Cycles are regular while the std dev stays strictly below this.
    pub regularity_threshold: f64,
    /// Recent vs older mean must differ by more than this to call a trend.
    pub trend_threshold_days: f64,
    pub trend_window: usize,
    /// Days added or removed from the average for a detected trend.
    pub trend_adjustment_days: f64,
    /// Number of most recent periods used for the recency blend.
    pub recent_periods: usize,
    pub recent_weight: f64,
    /// Number of most recent periods averaged for the bleed length.
    pub period_length_window: usize,
    pub confidence_base: f64,
    pub confidence_per_period: f64,
    pub regularity_bonus: f64,
    pub std_dev_penalty: f64,
    pub confidence_floor: f64,
    pub confidence_ceiling: f64,
    pub empty_history_confidence: f64,
    /// Cycle length brackets for the luteal phase estimate.
    pub short_cycle_max: i64,
    pub medium_cycle_max: i64,
    pub luteal_days_short: i64,
    pub luteal_days_medium: i64,
    pub luteal_days_long: i64,
    pub fertile_days_before: i64,
    pub fertile_days_after: i64,
    pub peak_days_before: i64,
    /// Explanations below this confidence nudge the user to keep logging.
    pub encouragement_threshold: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            min_cycle_days: 21,
            max_cycle_days: 45,
            default_cycle_length: 28,
            regularity_threshold: 7.0,
            trend_threshold_days: 2.0,
            trend_window: 3,
            trend_adjustment_days: 1.0,
            recent_periods: 3,
            recent_weight: 0.7,
            period_length_window: 6,
            confidence_base: 0.5,
            confidence_per_period: 0.05,
            regularity_bonus: 0.2,
            std_dev_penalty: 0.01,
            confidence_floor: 0.3,
            confidence_ceiling: 0.95,
            empty_history_confidence: 0.3,
            short_cycle_max: 28,
            medium_cycle_max: 32,
            luteal_days_short: 14,
            luteal_days_medium: 15,
            luteal_days_long: 16,
            fertile_days_before: 5,
            fertile_days_after: 1,
            peak_days_before: 2,
            encouragement_threshold: 0.7,
        }
    }
}

impl PredictionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_cycle_days > self.max_cycle_days {
            return Err(ConfigError::Invalid(format!(
                "min_cycle_days ({}) exceeds max_cycle_days ({})",
                self.min_cycle_days, self.max_cycle_days
            )));
        }
        if self.confidence_floor > self.confidence_ceiling {
            return Err(ConfigError::Invalid(format!(
                "confidence_floor ({}) exceeds confidence_ceiling ({})",
                self.confidence_floor, self.confidence_ceiling
            )));
        }
        if !(0.0..=1.0).contains(&self.recent_weight) {
            return Err(ConfigError::Invalid(format!(
                "recent_weight must be within [0, 1], got {}",
                self.recent_weight
            )));
        }
        if self.regularity_threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "regularity_threshold must be positive, got {}",
                self.regularity_threshold
            )));
        }
        if self.trend_window == 0 || self.recent_periods < 2 {
            return Err(ConfigError::Invalid(
                "trend_window must be non-zero and recent_periods at least 2".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub prediction: PredictionConfig,
    pub defaults: HistoryDefaults,
}

impl AppConfig {
    /// Layered load, later sources override earlier ones:
    /// built-in defaults, `./config.toml`, the user config dir, an explicit
    /// file, then `CYKEL__SECTION__KEY` environment variables.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cykel");
        let search = [PathBuf::from("config.toml"), config_dir.join("config.toml")];

        Self::load_from(&search, explicit, Some(Self::environment()))
    }

    /// `CYKEL__PREDICTION__RECENT_WEIGHT=0.6` style overrides.
    pub fn environment() -> Environment {
        Environment::with_prefix("CYKEL")
            .separator("__")
            .try_parsing(true)
    }

    /// Load from an explicit source list: defaults, then each optional file
    /// in `search`, then the required `explicit` file, then `env`.
    pub fn load_from(
        search: &[PathBuf],
        explicit: Option<&Path>,
        env: Option<Environment>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        for path in search {
            builder = builder.add_source(File::from(path.clone()).required(false));
        }
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }
        if let Some(env) = env {
            builder = builder.add_source(env);
        }

        let settings = builder.build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.prediction.validate()?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }
}
