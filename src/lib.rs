//! Cykel prediction core.
//!
//! Predicts the next period start, ovulation day and fertile window from a
//! caller-supplied history of period start/end dates. Every call is a pure
//! computation over its inputs; nothing is stored between calls.

pub mod clock;
pub mod commands;
pub mod config;
pub mod explanation;
pub mod models;
pub mod prediction;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppConfig, ConfigError, PredictionConfig};
pub use models::{
    CycleStats, FertilityWindow, HistoryDefaults, PatternSummary, PeriodInput, PeriodRecord,
    Prediction, PredictionReport, PredictionRequest, PredictionResponse, Trend,
};
pub use prediction::{
    cycle_lengths, cycle_stats, detect_patterns, fertility_window, predict_next_period,
    PredictionError, Predictor,
};
