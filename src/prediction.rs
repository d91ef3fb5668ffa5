use std::sync::Arc;

use chrono::{Days, NaiveDate};

use crate::clock::{Clock, SystemClock};
use crate::config::PredictionConfig;
use crate::explanation;
use crate::models::{
    CycleStats, FertilityWindow, HistoryDefaults, PatternSummary, PeriodRecord, Prediction,
    PredictionReport, Trend,
};

/// Day counts this close below a whole number are treated as that number, so
/// float noise in the weighted blend cannot cost a full day.
const DAY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictionError {
    #[error("invalid start date {value:?} for period #{index}")]
    InvalidDate { index: usize, value: String },
    #[error("date out of range: {date} shifted by {days} days")]
    DateOutOfRange { date: NaiveDate, days: i64 },
}

/// Stateless prediction service. Holds only its heuristics and a clock, so a
/// single instance can be shared freely across threads.
#[derive(Clone)]
pub struct Predictor {
    config: PredictionConfig,
    clock: Arc<dyn Clock>,
}

impl Default for Predictor {
    fn default() -> Self {
        Self::new(PredictionConfig::default())
    }
}

impl Predictor {
    pub fn new(config: PredictionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: PredictionConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    /// Run the full pipeline over `history`, in any order.
    pub fn predict(
        &self,
        history: &[PeriodRecord],
        defaults: &HistoryDefaults,
    ) -> Result<PredictionReport, PredictionError> {
        let config = &self.config;
        let periods = sort_recent_first(history);

        let lengths = cycle_lengths(&periods, config);
        let patterns = if lengths.is_empty() {
            PatternSummary::fallback(defaults.average_cycle_length as f64)
        } else {
            detect_patterns(&lengths, config)
        };
        tracing::debug!(cycle_lengths = ?lengths, ?patterns, "cycle patterns detected");

        let prediction =
            predict_next_period(&periods, &patterns, defaults, self.clock.today(), config)?;
        let fertility =
            fertility_window(prediction.predicted_start, prediction.cycle_length, config)?;
        let explanation =
            explanation::explain(&patterns, prediction.confidence, periods.len(), config);

        tracing::info!(
            periods = periods.len(),
            predicted_start = %prediction.predicted_start,
            cycle_length = prediction.cycle_length,
            confidence = prediction.confidence,
            "prediction complete"
        );

        Ok(PredictionReport {
            is_irregular: !patterns.is_regular,
            prediction,
            fertility,
            patterns,
            explanation,
        })
    }
}

/// Copy of `history` ordered most recent start first.
pub fn sort_recent_first(history: &[PeriodRecord]) -> Vec<PeriodRecord> {
    let mut periods = history.to_vec();
    periods.sort_by(|a, b| b.start_date.cmp(&a.start_date));

    for pair in periods.windows(2) {
        if pair[0].start_date == pair[1].start_date {
            tracing::warn!(start_date = %pair[0].start_date, "duplicate period start date");
        }
    }

    periods
}

/// Gaps between consecutive starts of a most-recent-first history, keeping
/// only those inside the plausible cycle range. Most recent gap first.
pub fn cycle_lengths(periods: &[PeriodRecord], config: &PredictionConfig) -> Vec<i64> {
    periods
        .windows(2)
        .map(|w| (w[0].start_date - w[1].start_date).num_days())
        .filter(|gap| (config.min_cycle_days..=config.max_cycle_days).contains(gap))
        .collect()
}

/// Summarise cycle lengths (most recent first).
///
/// Trend compares the mean of the first `trend_window` lengths against the
/// next `trend_window`; it is a fixed threshold rule, not a fitted model.
pub fn detect_patterns(cycle_lengths: &[i64], config: &PredictionConfig) -> PatternSummary {
    if cycle_lengths.len() < 2 {
        return PatternSummary::fallback(config.default_cycle_length as f64);
    }

    let values: Vec<f64> = cycle_lengths.iter().map(|&v| v as f64).collect();
    let average = mean(&values);
    let std_dev = population_std_dev(&values);

    PatternSummary {
        average,
        std_dev,
        is_regular: std_dev < config.regularity_threshold,
        trend: detect_trend(&values, config),
    }
}

fn detect_trend(values: &[f64], config: &PredictionConfig) -> Trend {
    let window = config.trend_window;
    if values.len() < window {
        return Trend::Stable;
    }

    let recent = &values[..window];
    let older = &values[window..values.len().min(window * 2)];
    if older.is_empty() {
        return Trend::Stable;
    }

    let recent_avg = mean(recent);
    let older_avg = mean(older);
    if recent_avg > older_avg + config.trend_threshold_days {
        Trend::Increasing
    } else if recent_avg < older_avg - config.trend_threshold_days {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Predict the next start from a most-recent-first history.
pub fn predict_next_period(
    periods: &[PeriodRecord],
    patterns: &PatternSummary,
    defaults: &HistoryDefaults,
    today: NaiveDate,
    config: &PredictionConfig,
) -> Result<Prediction, PredictionError> {
    let Some(last) = periods.first() else {
        let cycle_length = defaults.average_cycle_length;
        let predicted_start = shift(today, cycle_length)?;
        let predicted_end = period_end(
            predicted_start,
            default_period_length(defaults, config),
            config,
        );
        return Ok(Prediction {
            predicted_start,
            predicted_end,
            confidence: config.empty_history_confidence,
            cycle_length,
        });
    };

    let mut predicted_cycle = match patterns.trend {
        Trend::Increasing => patterns.average + config.trend_adjustment_days,
        Trend::Decreasing => patterns.average - config.trend_adjustment_days,
        Trend::Stable => patterns.average,
    };

    // Recent cycles dominate; a recency blend replaces the trend nudge.
    if periods.len() >= config.recent_periods {
        let recent = cycle_lengths(&periods[..config.recent_periods], config);
        if !recent.is_empty() {
            let recent_avg = mean(&recent.iter().map(|&v| v as f64).collect::<Vec<_>>());
            predicted_cycle =
                patterns.average + config.recent_weight * (recent_avg - patterns.average);
        }
    }

    let cycle_length = whole_days(predicted_cycle);
    let predicted_start = shift(last.start_date, cycle_length)?;
    let predicted_end = period_end(
        predicted_start,
        average_period_length(periods, defaults, config),
        config,
    );

    let regularity_bonus = if patterns.is_regular {
        config.regularity_bonus
    } else {
        0.0
    };
    let confidence = (config.confidence_base
        + periods.len() as f64 * config.confidence_per_period
        + regularity_bonus
        - patterns.std_dev * config.std_dev_penalty)
        .min(config.confidence_ceiling)
        .max(config.confidence_floor);

    Ok(Prediction {
        predicted_start,
        predicted_end,
        confidence,
        cycle_length,
    })
}

/// Ovulation sits a luteal phase before the predicted start; longer cycles
/// get a slightly longer luteal estimate.
pub fn fertility_window(
    predicted_start: NaiveDate,
    cycle_length: i64,
    config: &PredictionConfig,
) -> Result<FertilityWindow, PredictionError> {
    let luteal_days = if cycle_length <= config.short_cycle_max {
        config.luteal_days_short
    } else if cycle_length <= config.medium_cycle_max {
        config.luteal_days_medium
    } else {
        config.luteal_days_long
    };

    let ovulation_day = shift(predicted_start, -luteal_days)?;
    Ok(FertilityWindow {
        fertile_start: shift(ovulation_day, -config.fertile_days_before)?,
        fertile_end: shift(ovulation_day, config.fertile_days_after)?,
        ovulation_day,
        peak_start: shift(ovulation_day, -config.peak_days_before)?,
        peak_end: ovulation_day,
    })
}

/// Summary statistics over the whole history, for display alongside a
/// prediction.
pub fn cycle_stats(history: &[PeriodRecord], config: &PredictionConfig) -> CycleStats {
    let periods = sort_recent_first(history);
    let lengths = cycle_lengths(&periods, config);
    let period_lengths: Vec<f64> = periods
        .iter()
        .filter_map(PeriodRecord::period_length)
        .map(|days| days as f64)
        .collect();
    let cycle_values: Vec<f64> = lengths.iter().map(|&v| v as f64).collect();
    let last = periods.first();

    CycleStats {
        total_periods: periods.len(),
        avg_cycle_length: (!cycle_values.is_empty()).then(|| mean(&cycle_values)),
        avg_period_length: (!period_lengths.is_empty()).then(|| mean(&period_lengths)),
        shortest_cycle: lengths.iter().copied().min(),
        longest_cycle: lengths.iter().copied().max(),
        last_period_start: last.map(|p| p.start_date),
        last_period_end: last.and_then(|p| p.end_date),
    }
}

fn average_period_length(
    periods: &[PeriodRecord],
    defaults: &HistoryDefaults,
    config: &PredictionConfig,
) -> f64 {
    let lengths: Vec<f64> = periods
        .iter()
        .take(config.period_length_window)
        .filter_map(PeriodRecord::period_length)
        .filter(|days| plausible_period_length(*days, config))
        .map(|days| days as f64)
        .collect();

    if lengths.is_empty() {
        default_period_length(defaults, config)
    } else {
        mean(&lengths)
    }
}

fn plausible_period_length(days: i64, config: &PredictionConfig) -> bool {
    (1..=config.max_cycle_days).contains(&days)
}

fn default_period_length(defaults: &HistoryDefaults, config: &PredictionConfig) -> f64 {
    let days = defaults.average_period_length;
    if plausible_period_length(days, config) {
        days as f64
    } else {
        HistoryDefaults::default().average_period_length as f64
    }
}

/// The end date is informational; it never fails a prediction whose start
/// date was computable.
fn period_end(start: NaiveDate, period_length: f64, config: &PredictionConfig) -> NaiveDate {
    let days = (period_length.round() as i64).clamp(1, config.max_cycle_days.max(1));
    shift(start, days - 1).unwrap_or(start)
}

/// Truncate a fractional day count toward zero.
pub(crate) fn whole_days(days: f64) -> i64 {
    (days + DAY_EPSILON.copysign(days)).trunc() as i64
}

fn shift(date: NaiveDate, days: i64) -> Result<NaiveDate, PredictionError> {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.ok_or(PredictionError::DateOutOfRange { date, days })
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
