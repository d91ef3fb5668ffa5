use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::prediction::PredictionError;

/// A logged period as received from the caller, dates still unparsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodInput {
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub cycle_length: Option<i64>,
}

impl PeriodInput {
    pub fn new(start_date: impl Into<String>) -> Self {
        Self {
            start_date: start_date.into(),
            end_date: None,
            cycle_length: None,
        }
    }

    pub fn with_end(mut self, end_date: impl Into<String>) -> Self {
        self.end_date = Some(end_date.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodRecord {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub cycle_length: Option<i64>,
}

impl PeriodRecord {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date: None,
            cycle_length: None,
        }
    }

    /// Parse a raw record. A bad start date fails the record; a bad end date
    /// is dropped with a warning since nothing downstream depends on it.
    pub fn from_input(index: usize, input: &PeriodInput) -> Result<Self, PredictionError> {
        let start_date =
            parse_date(&input.start_date).ok_or_else(|| PredictionError::InvalidDate {
                index,
                value: input.start_date.clone(),
            })?;

        let end_date = match input.end_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let parsed = parse_date(raw);
                if parsed.is_none() {
                    tracing::warn!(index, end_date = raw, "ignoring unparseable end date");
                }
                parsed
            }
        };

        Ok(Self {
            start_date,
            end_date,
            cycle_length: input.cycle_length,
        })
    }

    /// Inclusive length of the bleed in days, if a sane end date was logged.
    pub fn period_length(&self) -> Option<i64> {
        let end = self.end_date?;
        let days = (end - self.start_date).num_days();
        (days >= 0).then_some(days + 1)
    }
}

/// Accepts plain ISO dates plus ISO datetimes (naive or with offset), keeping
/// only the calendar date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternSummary {
    pub average: f64,
    pub std_dev: f64,
    pub is_regular: bool,
    pub trend: Trend,
}

impl PatternSummary {
    /// Textbook assumption used when the history says too little.
    pub fn fallback(average: f64) -> Self {
        Self {
            average,
            std_dev: 0.0,
            is_regular: true,
            trend: Trend::Stable,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub predicted_start: NaiveDate,
    pub predicted_end: NaiveDate,
    pub confidence: f64,
    pub cycle_length: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FertilityWindow {
    pub fertile_start: NaiveDate,
    pub fertile_end: NaiveDate,
    pub ovulation_day: NaiveDate,
    pub peak_start: NaiveDate,
    pub peak_end: NaiveDate,
}

/// Everything one pipeline run produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionReport {
    pub prediction: Prediction,
    pub fertility: FertilityWindow,
    pub patterns: PatternSummary,
    pub explanation: String,
    pub is_irregular: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleStats {
    pub total_periods: usize,
    pub avg_cycle_length: Option<f64>,
    pub avg_period_length: Option<f64>,
    pub shortest_cycle: Option<i64>,
    pub longest_cycle: Option<i64>,
    pub last_period_start: Option<NaiveDate>,
    pub last_period_end: Option<NaiveDate>,
}

/// Per-user fallbacks for when the history is too thin to derive them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryDefaults {
    pub average_cycle_length: i64,
    pub average_period_length: i64,
}

impl Default for HistoryDefaults {
    fn default() -> Self {
        Self {
            average_cycle_length: 28,
            average_period_length: 5,
        }
    }
}

/// Wire format of a prediction request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PredictionRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub periods: Vec<PeriodInput>,
    #[serde(default)]
    pub average_cycle_length: Option<i64>,
    #[serde(default)]
    pub average_period_length: Option<i64>,
}

impl PredictionRequest {
    /// Request values win; missing or non-positive ones come from `fallback`.
    pub fn defaults(&self, fallback: &HistoryDefaults) -> HistoryDefaults {
        HistoryDefaults {
            average_cycle_length: self
                .average_cycle_length
                .filter(|days| *days > 0)
                .unwrap_or(fallback.average_cycle_length),
            average_period_length: self
                .average_period_length
                .filter(|days| *days > 0)
                .unwrap_or(fallback.average_period_length),
        }
    }
}

/// Wire format of a prediction response. Dates serialize as ISO strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionResponse {
    pub predicted_period_start: NaiveDate,
    pub predicted_period_end: NaiveDate,
    pub predicted_ovulation_date: NaiveDate,
    pub fertile_window_start: NaiveDate,
    pub fertile_window_end: NaiveDate,
    pub peak_fertility_start: NaiveDate,
    pub peak_fertility_end: NaiveDate,
    pub confidence: f64,
    pub explanation: String,
    pub is_irregular: bool,
    pub estimated_cycle_length: i64,
}

impl From<PredictionReport> for PredictionResponse {
    fn from(report: PredictionReport) -> Self {
        Self {
            predicted_period_start: report.prediction.predicted_start,
            predicted_period_end: report.prediction.predicted_end,
            predicted_ovulation_date: report.fertility.ovulation_day,
            fertile_window_start: report.fertility.fertile_start,
            fertile_window_end: report.fertility.fertile_end,
            peak_fertility_start: report.fertility.peak_start,
            peak_fertility_end: report.fertility.peak_end,
            confidence: report.prediction.confidence,
            explanation: report.explanation,
            is_irregular: report.is_irregular,
            estimated_cycle_length: report.prediction.cycle_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn parses_plain_and_datetime_formats() {
        assert_eq!(parse_date("2024-03-01"), Some(date("2024-03-01")));
        assert_eq!(parse_date(" 2024-03-01 "), Some(date("2024-03-01")));
        assert_eq!(parse_date("2024-03-01T10:15:00"), Some(date("2024-03-01")));
        assert_eq!(parse_date("2024-03-01T23:00:00+02:00"), Some(date("2024-03-01")));
        assert_eq!(parse_date("2024-02-30"), None);
        assert_eq!(parse_date("next tuesday"), None);
    }

    #[test]
    fn bad_start_date_is_fatal() {
        let err = PeriodRecord::from_input(2, &PeriodInput::new("2024-13-01")).unwrap_err();
        assert!(matches!(err, PredictionError::InvalidDate { index: 2, .. }));
        assert!(err.to_string().contains("2024-13-01"));
    }

    #[test]
    fn bad_end_date_is_dropped() {
        let input = PeriodInput::new("2024-03-01").with_end("garbage");
        let record = PeriodRecord::from_input(0, &input).unwrap();
        assert_eq!(record.end_date, None);
    }

    #[test]
    fn period_length_is_inclusive() {
        let input = PeriodInput::new("2024-03-01").with_end("2024-03-05");
        let record = PeriodRecord::from_input(0, &input).unwrap();
        assert_eq!(record.period_length(), Some(5));

        let backwards = PeriodInput::new("2024-03-05").with_end("2024-03-01");
        let record = PeriodRecord::from_input(0, &backwards).unwrap();
        assert_eq!(record.period_length(), None);
    }

    #[test]
    fn request_defaults_prefer_request_values() {
        let request: PredictionRequest = serde_json::from_str(
            r#"{"periods": [], "average_cycle_length": 31, "average_period_length": null}"#,
        )
        .unwrap();
        let defaults = request.defaults(&HistoryDefaults::default());
        assert_eq!(defaults.average_cycle_length, 31);
        assert_eq!(defaults.average_period_length, 5);
    }

    #[test]
    fn non_positive_request_averages_fall_back() {
        let request = PredictionRequest {
            average_cycle_length: Some(0),
            average_period_length: Some(-3),
            ..Default::default()
        };
        let defaults = request.defaults(&HistoryDefaults::default());
        assert_eq!(defaults.average_cycle_length, 28);
        assert_eq!(defaults.average_period_length, 5);

        let negative = PredictionRequest {
            average_cycle_length: Some(-10),
            average_period_length: Some(0),
            ..Default::default()
        };
        let defaults = negative.defaults(&HistoryDefaults::default());
        assert_eq!(defaults.average_cycle_length, 28);
        assert_eq!(defaults.average_period_length, 5);
    }

    #[test]
    fn trend_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Trend::Increasing).unwrap(), "\"increasing\"");
    }
}
