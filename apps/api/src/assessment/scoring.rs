//! Score schemas and the weighted overall score.
//!
//! Model ratings are parsed into strict structs: integer fields only, no extra
//! or missing keys, every value within 0..=100. Anything else is a parse
//! failure and the pass falls back to `FALLBACK_SCORE` for all its dimensions.

use std::fmt;
use std::str::FromStr;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[cfg(test)]
use crate::models::session::InterviewSessionRow;

pub const FALLBACK_SCORE: u8 = 70;
pub const MAX_SCORE: u8 = 100;

pub const COMMUNICATION_WEIGHT: f64 = 0.30;
pub const CONTENT_WEIGHT: f64 = 0.50;
pub const BEHAVIORAL_WEIGHT: f64 = 0.20;

// ────────────────────────────────────────────────────────────────────────────
// Rating schemas
// ────────────────────────────────────────────────────────────────────────────

/// A model-scored pass's expected payload.
pub trait Ratings: DeserializeOwned + Send + 'static {
    fn values(&self) -> Vec<u8>;

    /// Every dimension at `FALLBACK_SCORE`.
    fn neutral() -> Self;

    fn validate(&self) -> Result<(), String> {
        match self.values().into_iter().find(|v| *v > MAX_SCORE) {
            Some(v) => Err(format!("score {v} is outside 0..={MAX_SCORE}")),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommunicationRatings {
    pub clarity: u8,
    pub confidence: u8,
    pub pace: u8,
}

impl Ratings for CommunicationRatings {
    fn values(&self) -> Vec<u8> {
        vec![self.clarity, self.confidence, self.pace]
    }

    fn neutral() -> Self {
        Self {
            clarity: FALLBACK_SCORE,
            confidence: FALLBACK_SCORE,
            pace: FALLBACK_SCORE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentRatings {
    pub technical_accuracy: u8,
    pub problem_solving: u8,
    pub structure: u8,
    pub relevance: u8,
}

impl Ratings for ContentRatings {
    fn values(&self) -> Vec<u8> {
        vec![
            self.technical_accuracy,
            self.problem_solving,
            self.structure,
            self.relevance,
        ]
    }

    fn neutral() -> Self {
        Self {
            technical_accuracy: FALLBACK_SCORE,
            problem_solving: FALLBACK_SCORE,
            structure: FALLBACK_SCORE,
            relevance: FALLBACK_SCORE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BehavioralRatings {
    pub star_method: u8,
    pub leadership: u8,
    pub teamwork: u8,
}

impl Ratings for BehavioralRatings {
    fn values(&self) -> Vec<u8> {
        vec![self.star_method, self.leadership, self.teamwork]
    }

    fn neutral() -> Self {
        Self {
            star_method: FALLBACK_SCORE,
            leadership: FALLBACK_SCORE,
            teamwork: FALLBACK_SCORE,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Overall score
// ────────────────────────────────────────────────────────────────────────────

/// How group weights apply when a group (behavioral, outside behavioral
/// interviews) has no scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreWeighting {
    /// Divide by the sum of the present groups' weights, keeping 0..=100.
    Renormalized,
    /// Present groups' weights as-is; a non-behavioral session tops out at 80.
    Legacy,
}

impl fmt::Display for ScoreWeighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScoreWeighting::Renormalized => "renormalized",
            ScoreWeighting::Legacy => "legacy",
        })
    }
}

impl FromStr for ScoreWeighting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "renormalized" => Ok(ScoreWeighting::Renormalized),
            "legacy" => Ok(ScoreWeighting::Legacy),
            other => Err(format!(
                "unknown score weighting '{other}' (expected 'renormalized' or 'legacy')"
            )),
        }
    }
}

/// The ten aggregated dimensions. `None` means not assessed or not applicable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionScores {
    pub clarity: Option<f64>,
    pub confidence: Option<f64>,
    pub pace: Option<f64>,
    pub technical_accuracy: Option<f64>,
    pub problem_solving: Option<f64>,
    pub structure: Option<f64>,
    pub relevance: Option<f64>,
    pub star_method: Option<f64>,
    pub leadership: Option<f64>,
    pub teamwork: Option<f64>,
}

impl DimensionScores {
    /// Reads the persisted per-dimension columns back.
    #[cfg(test)]
    pub fn from_session(session: &InterviewSessionRow) -> Self {
        Self {
            clarity: session.clarity_score,
            confidence: session.confidence_score,
            pace: session.pace_score,
            technical_accuracy: session.technical_accuracy_score,
            problem_solving: session.problem_solving_score,
            structure: session.structure_score,
            relevance: session.relevance_score,
            star_method: session.star_method_score,
            leadership: session.leadership_score,
            teamwork: session.teamwork_score,
        }
    }

    fn groups(&self) -> [(f64, Vec<Option<f64>>); 3] {
        [
            (
                COMMUNICATION_WEIGHT,
                vec![self.clarity, self.confidence, self.pace],
            ),
            (
                CONTENT_WEIGHT,
                vec![
                    self.technical_accuracy,
                    self.problem_solving,
                    self.structure,
                    self.relevance,
                ],
            ),
            (
                BEHAVIORAL_WEIGHT,
                vec![self.star_method, self.leadership, self.teamwork],
            ),
        ]
    }
}

/// Weighted overall score, rounded to two decimals. Pure and deterministic.
///
/// Each group contributes the mean of its present scores; a group with none
/// is left out of the sum.
pub fn compute_overall(scores: &DimensionScores, weighting: ScoreWeighting) -> f64 {
    let mut weighted_sum = 0.0;
    let mut present_weight = 0.0;

    for (weight, values) in scores.groups() {
        let present: Vec<f64> = values.into_iter().flatten().collect();
        if present.is_empty() {
            continue;
        }
        let mean = present.iter().sum::<f64>() / present.len() as f64;
        weighted_sum += weight * mean;
        present_weight += weight;
    }

    let overall = match weighting {
        ScoreWeighting::Legacy => weighted_sum,
        ScoreWeighting::Renormalized if present_weight > 0.0 => weighted_sum / present_weight,
        ScoreWeighting::Renormalized => 0.0,
    };
    round2(overall)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(communication: f64, content: f64, behavioral: Option<f64>) -> DimensionScores {
        DimensionScores {
            clarity: Some(communication),
            confidence: Some(communication),
            pace: Some(communication),
            technical_accuracy: Some(content),
            problem_solving: Some(content),
            structure: Some(content),
            relevance: Some(content),
            star_method: behavioral,
            leadership: behavioral,
            teamwork: behavioral,
        }
    }

    #[test]
    fn test_all_groups_present_weights_sum_to_one() {
        let s = scores(70.0, 90.0, Some(80.0));
        assert_eq!(compute_overall(&s, ScoreWeighting::Legacy), 82.0);
        assert_eq!(compute_overall(&s, ScoreWeighting::Renormalized), 82.0);
    }

    #[test]
    fn test_missing_behavioral_group() {
        let s = scores(70.0, 90.0, None);
        assert_eq!(compute_overall(&s, ScoreWeighting::Legacy), 66.0);
        assert_eq!(compute_overall(&s, ScoreWeighting::Renormalized), 82.5);
    }

    #[test]
    fn test_perfect_non_behavioral_session() {
        let s = scores(100.0, 100.0, None);
        assert_eq!(compute_overall(&s, ScoreWeighting::Legacy), 80.0);
        assert_eq!(compute_overall(&s, ScoreWeighting::Renormalized), 100.0);
    }

    #[test]
    fn test_rounds_to_two_decimals_and_is_deterministic() {
        let s = DimensionScores {
            clarity: Some(71.0),
            confidence: Some(64.0),
            pace: Some(77.0),
            technical_accuracy: Some(83.0),
            problem_solving: Some(79.0),
            structure: Some(68.0),
            relevance: Some(91.0),
            ..Default::default()
        };
        let first = compute_overall(&s, ScoreWeighting::Renormalized);
        // 0.3 * 70.666.. + 0.5 * 80.25 = 61.325, / 0.8 = 76.65625
        assert_eq!(first, 76.66);
        assert_eq!(compute_overall(&s, ScoreWeighting::Renormalized), first);
        assert_eq!(compute_overall(&s, ScoreWeighting::Legacy), 61.33);
    }

    #[test]
    fn test_nothing_assessed_scores_zero() {
        let s = DimensionScores::default();
        assert_eq!(compute_overall(&s, ScoreWeighting::Renormalized), 0.0);
        assert_eq!(compute_overall(&s, ScoreWeighting::Legacy), 0.0);
    }

    #[test]
    fn test_strict_schema_rejects_deviations() {
        let ok: CommunicationRatings =
            serde_json::from_str(r#"{"clarity": 80, "confidence": 75, "pace": 90}"#).unwrap();
        assert!(ok.validate().is_ok());

        for bad in [
            r#"{"clarity": 80, "confidence": 75}"#,
            r#"{"clarity": 80, "confidence": 75, "pace": 90, "tone": 60}"#,
            r#"{"clarity": "80", "confidence": 75, "pace": 90}"#,
            r#"{"clarity": 80.5, "confidence": 75, "pace": 90}"#,
            r#"{"clarity": -1, "confidence": 75, "pace": 90}"#,
            r#"{"clarity": 300, "confidence": 75, "pace": 90}"#,
        ] {
            assert!(
                serde_json::from_str::<CommunicationRatings>(bad).is_err(),
                "accepted {bad}"
            );
        }

        let out_of_range: CommunicationRatings =
            serde_json::from_str(r#"{"clarity": 101, "confidence": 75, "pace": 90}"#).unwrap();
        assert!(out_of_range.validate().is_err());
    }

    #[test]
    fn test_neutral_ratings_are_all_fallback() {
        assert!(ContentRatings::neutral()
            .values()
            .iter()
            .all(|v| *v == FALLBACK_SCORE));
        assert_eq!(BehavioralRatings::neutral().values().len(), 3);
    }

    #[test]
    fn test_weighting_parses_from_config_values() {
        assert_eq!(
            "Legacy".parse::<ScoreWeighting>().unwrap(),
            ScoreWeighting::Legacy
        );
        assert_eq!(
            "renormalized".parse::<ScoreWeighting>().unwrap(),
            ScoreWeighting::Renormalized
        );
        assert!("equal".parse::<ScoreWeighting>().is_err());
    }
}
