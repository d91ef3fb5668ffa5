//! Request-level entry points: parse the wire format, run the pipeline and
//! flatten failures into a single caller-facing message.

use crate::models::*;
use crate::prediction::{self, PredictionError, Predictor};

/// Parse every record, failing the whole batch on the first bad start date.
pub fn parse_history(periods: &[PeriodInput]) -> Result<Vec<PeriodRecord>, PredictionError> {
    periods
        .iter()
        .enumerate()
        .map(|(index, input)| PeriodRecord::from_input(index, input))
        .collect()
}

/// Predict the next period for one request. `fallback` fills in whatever
/// averages the request leaves out.
pub fn predict(
    request: &PredictionRequest,
    predictor: &Predictor,
    fallback: &HistoryDefaults,
) -> Result<PredictionResponse, String> {
    let history = parse_history(&request.periods).map_err(prediction_error)?;
    let defaults = request.defaults(fallback);
    let report = predictor
        .predict(&history, &defaults)
        .map_err(prediction_error)?;
    Ok(report.into())
}

pub fn stats(request: &PredictionRequest, predictor: &Predictor) -> Result<CycleStats, String> {
    let history = parse_history(&request.periods).map_err(prediction_error)?;
    Ok(prediction::cycle_stats(&history, predictor.config()))
}

fn prediction_error(err: PredictionError) -> String {
    tracing::warn!(error = %err, "prediction request rejected");
    format!("Prediction error: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(starts: &[&str]) -> PredictionRequest {
        PredictionRequest {
            periods: starts.iter().map(|s| PeriodInput::new(*s)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn parse_history_reports_offending_record() {
        let err = parse_history(&request(&["2024-01-01", "not-a-date"]).periods).unwrap_err();
        assert_eq!(
            err,
            PredictionError::InvalidDate {
                index: 1,
                value: "not-a-date".into()
            }
        );
    }

    #[test]
    fn malformed_date_aborts_whole_request() {
        let err = predict(
            &request(&["2024-03-01", "2024-02-31", "2024-01-03"]),
            &Predictor::default(),
            &HistoryDefaults::default(),
        )
        .unwrap_err();
        assert!(err.starts_with("Prediction error:"));
        assert!(err.contains("2024-02-31"));
    }

    #[test]
    fn stats_rejects_malformed_dates() {
        assert!(stats(&request(&["garbage"]), &Predictor::default()).is_err());
    }

    #[test]
    fn stats_over_valid_history() {
        let result = stats(
            &request(&["2024-03-01", "2024-02-01", "2024-01-03"]),
            &Predictor::default(),
        )
        .unwrap();
        assert_eq!(result.total_periods, 3);
        assert_eq!(result.avg_cycle_length, Some(29.0));
    }
}
