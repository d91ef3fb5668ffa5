use crate::config::PredictionConfig;
use crate::models::{PatternSummary, Trend};

/// Build the user-facing rationale for a prediction. The wording is part of
/// the response contract, so sentence order and phrasing are fixed.
pub fn explain(
    patterns: &PatternSummary,
    confidence: f64,
    data_points: usize,
    config: &PredictionConfig,
) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(6);

    if data_points < 3 {
        parts.push("We're still learning your cycle pattern.".into());
    } else {
        parts.push(format!("Based on your {data_points} logged periods,"));
    }

    if patterns.is_regular {
        parts.push("your cycles are quite regular.".into());
    } else {
        parts.push("your cycles show some variation, which is normal.".into());
    }

    parts.push(format!(
        "Your average cycle length is {} days.",
        patterns.average.trunc() as i64
    ));

    match patterns.trend {
        Trend::Increasing => {
            parts.push("Your cycles have been getting slightly longer recently.".into())
        }
        Trend::Decreasing => {
            parts.push("Your cycles have been getting slightly shorter recently.".into())
        }
        Trend::Stable => {}
    }

    parts.push(format!(
        "Prediction confidence: {}%.",
        (confidence * 100.0).trunc() as i64
    ));

    if confidence < config.encouragement_threshold {
        parts.push("Keep logging your periods to improve accuracy!".into());
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(average: f64, is_regular: bool, trend: Trend) -> PatternSummary {
        PatternSummary {
            average,
            std_dev: 0.0,
            is_regular,
            trend,
        }
    }

    #[test]
    fn sparse_history_asks_for_more_data() {
        let text = explain(
            &summary(28.0, true, Trend::Stable),
            0.3,
            0,
            &PredictionConfig::default(),
        );
        assert_eq!(
            text,
            "We're still learning your cycle pattern. your cycles are quite regular. \
             Your average cycle length is 28 days. Prediction confidence: 30%. \
             Keep logging your periods to improve accuracy!"
        );
    }

    #[test]
    fn confident_regular_history() {
        let text = explain(
            &summary(29.0, true, Trend::Stable),
            0.85,
            3,
            &PredictionConfig::default(),
        );
        assert_eq!(
            text,
            "Based on your 3 logged periods, your cycles are quite regular. \
             Your average cycle length is 29 days. Prediction confidence: 85%."
        );
    }

    #[test]
    fn irregular_lengthening_cycles() {
        let text = explain(
            &summary(33.8, false, Trend::Increasing),
            0.55,
            7,
            &PredictionConfig::default(),
        );
        assert!(text.starts_with("Based on your 7 logged periods,"));
        assert!(text.contains("your cycles show some variation, which is normal."));
        assert!(text.contains("Your average cycle length is 33 days."));
        assert!(text.contains("getting slightly longer recently."));
        assert!(text.contains("Prediction confidence: 55%."));
        assert!(text.ends_with("Keep logging your periods to improve accuracy!"));
    }

    #[test]
    fn shortening_cycles_mentioned() {
        let text = explain(
            &summary(26.0, true, Trend::Decreasing),
            0.9,
            6,
            &PredictionConfig::default(),
        );
        assert!(text.contains("Your cycles have been getting slightly shorter recently."));
        assert!(!text.contains("Keep logging"));
    }

    #[test]
    fn encouragement_boundary_is_exclusive() {
        let text = explain(
            &summary(28.0, true, Trend::Stable),
            0.7,
            4,
            &PredictionConfig::default(),
        );
        assert!(!text.contains("Keep logging"));
    }
}
