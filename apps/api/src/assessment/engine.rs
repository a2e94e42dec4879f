//! Assessment Engine: post-hoc, multi-dimension scoring of a finished transcript.
//!
//! Three independent model passes (communication, content, behavioral) run
//! concurrently; each falls back to neutral scores on its own failure. A
//! fourth call writes the feedback bundle. The result is always complete.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assessment::metrics::{self, CommunicationMetrics};
use crate::assessment::prompts;
use crate::assessment::scoring::{
    compute_overall, round2, BehavioralRatings, CommunicationRatings, ContentRatings,
    DimensionScores, Ratings, ScoreWeighting,
};
use crate::errors::AppError;
use crate::interview::repository as sessions_repo;
use crate::llm_client::prompts::{fill, JSON_ONLY_SYSTEM, SCORE_SCALE_INSTRUCTION};
use crate::llm_client::{complete_json, LanguageModel};
use crate::models::interaction::InteractionRow;
use crate::models::session::{InterviewSessionRow, InterviewType};

pub const SCORING_TEMPERATURE: f32 = 0.3;
const MAX_LIST_ITEMS: usize = 5;

// ────────────────────────────────────────────────────────────────────────────
// Report types
// ────────────────────────────────────────────────────────────────────────────

/// Whether a pass's numbers came from the model or the neutral fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct PassOutcome<T> {
    pub ratings: T,
    pub source: PassSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommunicationScores {
    pub verbal_communication_score: f64,
    pub clarity_score: f64,
    pub confidence_score: f64,
    pub pace_score: f64,
    pub words_per_minute: f64,
    pub filler_word_count: usize,
    pub source: PassSource,
}

impl CommunicationScores {
    fn from_pass(pass: PassOutcome<CommunicationRatings>, metrics: &CommunicationMetrics) -> Self {
        let r = pass.ratings;
        Self {
            verbal_communication_score: (f64::from(r.clarity) + f64::from(r.confidence)) / 2.0,
            clarity_score: f64::from(r.clarity),
            confidence_score: f64::from(r.confidence),
            pace_score: f64::from(r.pace),
            words_per_minute: round2(metrics.words_per_minute),
            filler_word_count: metrics.filler_word_count,
            source: pass.source,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentScores {
    pub technical_accuracy_score: f64,
    pub problem_solving_score: f64,
    pub structure_score: f64,
    pub relevance_score: f64,
    pub source: PassSource,
}

impl From<PassOutcome<ContentRatings>> for ContentScores {
    fn from(pass: PassOutcome<ContentRatings>) -> Self {
        let r = pass.ratings;
        Self {
            technical_accuracy_score: f64::from(r.technical_accuracy),
            problem_solving_score: f64::from(r.problem_solving),
            structure_score: f64::from(r.structure),
            relevance_score: f64::from(r.relevance),
            source: pass.source,
        }
    }
}

/// All `None` outside behavioral interviews.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BehavioralScores {
    pub star_method_score: Option<f64>,
    pub leadership_score: Option<f64>,
    pub teamwork_score: Option<f64>,
    pub source: Option<PassSource>,
}

impl From<Option<PassOutcome<BehavioralRatings>>> for BehavioralScores {
    fn from(pass: Option<PassOutcome<BehavioralRatings>>) -> Self {
        match pass {
            Some(pass) => Self {
                star_method_score: Some(f64::from(pass.ratings.star_method)),
                leadership_score: Some(f64::from(pass.ratings.leadership)),
                teamwork_score: Some(f64::from(pass.ratings.teamwork)),
                source: Some(pass.source),
            },
            None => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentFeedback {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub improvements: Vec<String>,
    pub detailed_feedback: String,
    pub next_steps: Vec<String>,
    pub recommended_topics: Vec<String>,
    pub source: PassSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentReport {
    pub session_id: Uuid,
    pub interview_type: InterviewType,
    pub overall_score: f64,
    pub weighting: ScoreWeighting,
    pub communication_scores: CommunicationScores,
    pub content_scores: ContentScores,
    pub behavioral_scores: BehavioralScores,
    pub feedback: AssessmentFeedback,
    pub assessed_at: DateTime<Utc>,
}

impl AssessmentReport {
    pub fn dimension_scores(&self) -> DimensionScores {
        let c = &self.communication_scores;
        let k = &self.content_scores;
        let b = &self.behavioral_scores;
        DimensionScores {
            clarity: Some(c.clarity_score),
            confidence: Some(c.confidence_score),
            pace: Some(c.pace_score),
            technical_accuracy: Some(k.technical_accuracy_score),
            problem_solving: Some(k.problem_solving_score),
            structure: Some(k.structure_score),
            relevance: Some(k.relevance_score),
            star_method: b.star_method_score,
            leadership: b.leadership_score,
            teamwork: b.teamwork_score,
        }
    }
}

/// What the feedback call is asked to return. Missing keys become empty and
/// are then filled from the fallback bundle.
#[derive(Debug, Default, Deserialize)]
struct FeedbackPayload {
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    improvements: Vec<String>,
    #[serde(default)]
    detailed_feedback: String,
    #[serde(default)]
    next_steps: Vec<String>,
    #[serde(default)]
    recommended_topics: Vec<String>,
}

pub fn fallback_feedback() -> AssessmentFeedback {
    let weaknesses = vec!["Could provide more specific examples".to_string()];
    AssessmentFeedback {
        strengths: vec![
            "Completed the interview".to_string(),
            "Engaged with questions".to_string(),
        ],
        improvements: weaknesses.clone(),
        weaknesses,
        detailed_feedback: "Overall decent performance with room for improvement.".to_string(),
        next_steps: vec!["Practice more interview questions".to_string()],
        recommended_topics: vec!["Interview techniques".to_string()],
        source: PassSource::Fallback,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

pub struct AssessmentEngine {
    llm: Arc<dyn LanguageModel>,
    weighting: ScoreWeighting,
}

impl AssessmentEngine {
    pub fn new(llm: Arc<dyn LanguageModel>, weighting: ScoreWeighting) -> Self {
        Self { llm, weighting }
    }

    /// Loads the transcript, scores it and persists the result onto the session.
    /// Rejects sessions without interactions before any model call.
    pub async fn assess(
        &self,
        pool: &PgPool,
        session: &InterviewSessionRow,
    ) -> Result<AssessmentReport, AppError> {
        let interactions = sessions_repo::list_interactions(pool, session.id).await?;
        if interactions.is_empty() {
            return Err(AppError::Validation(
                "Session has no interactions to assess".to_string(),
            ));
        }

        let report = self
            .evaluate(session.id, session.kind(), &interactions)
            .await;
        sessions_repo::save_assessment(pool, &report).await?;

        info!(
            "Assessed session {}: overall {} ({} weighting)",
            session.id, report.overall_score, report.weighting
        );
        Ok(report)
    }

    /// Scores a transcript. Never fails: each model-dependent part has a fallback.
    pub async fn evaluate(
        &self,
        session_id: Uuid,
        interview_type: InterviewType,
        interactions: &[InteractionRow],
    ) -> AssessmentReport {
        let transcript = metrics::render_transcript(interactions);
        let comm_metrics = metrics::communication_metrics(interactions);
        let type_label = interview_type.label();

        let communication_prompt = fill(
            prompts::COMMUNICATION_PROMPT,
            &[
                (
                    "words_per_minute",
                    &format!("{:.0}", comm_metrics.words_per_minute),
                ),
                (
                    "filler_word_count",
                    &comm_metrics.filler_word_count.to_string(),
                ),
                ("transcript", &transcript),
            ],
        );
        let content_system = fill(
            prompts::CONTENT_SYSTEM,
            &[
                ("interview_type", &type_label),
                ("type_guidance", prompts::content_guidance(interview_type)),
            ],
        );
        let content_prompt = fill(
            prompts::CONTENT_PROMPT,
            &[("interview_type", &type_label), ("transcript", &transcript)],
        );
        let behavioral_prompt = fill(prompts::BEHAVIORAL_PROMPT, &[("transcript", &transcript)]);

        let (communication, content, behavioral) = tokio::join!(
            self.score_pass::<CommunicationRatings>(
                session_id,
                "communication",
                prompts::COMMUNICATION_SYSTEM,
                &communication_prompt,
            ),
            self.score_pass::<ContentRatings>(
                session_id,
                "content",
                &content_system,
                &content_prompt,
            ),
            async {
                if interview_type.is_behavioral() {
                    Some(
                        self.score_pass::<BehavioralRatings>(
                            session_id,
                            "behavioral",
                            prompts::BEHAVIORAL_SYSTEM,
                            &behavioral_prompt,
                        )
                        .await,
                    )
                } else {
                    None
                }
            },
        );

        let communication_scores = CommunicationScores::from_pass(communication, &comm_metrics);
        let content_scores = ContentScores::from(content);
        let behavioral_scores = BehavioralScores::from(behavioral);

        let feedback = self
            .synthesize_feedback(
                session_id,
                &type_label,
                &transcript,
                &communication_scores,
                &content_scores,
                &behavioral_scores,
            )
            .await;

        let mut report = AssessmentReport {
            session_id,
            interview_type,
            overall_score: 0.0,
            weighting: self.weighting,
            communication_scores,
            content_scores,
            behavioral_scores,
            feedback,
            assessed_at: Utc::now(),
        };
        report.overall_score = compute_overall(&report.dimension_scores(), self.weighting);
        report
    }

    async fn score_pass<T: Ratings>(
        &self,
        session_id: Uuid,
        pass: &str,
        system: &str,
        prompt: &str,
    ) -> PassOutcome<T> {
        let system = format!("{system}\n\n{SCORE_SCALE_INSTRUCTION}\n{JSON_ONLY_SYSTEM}");
        let parsed = complete_json::<T>(self.llm.as_ref(), &system, prompt, SCORING_TEMPERATURE)
            .await
            .map_err(|e| e.to_string())
            .and_then(|ratings| ratings.validate().map(|_| ratings));

        match parsed {
            Ok(ratings) => PassOutcome {
                ratings,
                source: PassSource::Model,
            },
            Err(e) => {
                warn!("Session {session_id} {pass} scoring fell back to neutral scores: {e}");
                PassOutcome {
                    ratings: T::neutral(),
                    source: PassSource::Fallback,
                }
            }
        }
    }

    async fn synthesize_feedback(
        &self,
        session_id: Uuid,
        type_label: &str,
        transcript: &str,
        communication: &CommunicationScores,
        content: &ContentScores,
        behavioral: &BehavioralScores,
    ) -> AssessmentFeedback {
        let prompt = fill(
            prompts::FEEDBACK_PROMPT,
            &[
                ("interview_type", type_label),
                (
                    "scores",
                    &scores_summary(communication, content, behavioral),
                ),
                ("transcript", transcript),
            ],
        );

        let system = format!("{}\n\n{JSON_ONLY_SYSTEM}", prompts::FEEDBACK_SYSTEM);
        match complete_json::<FeedbackPayload>(
            self.llm.as_ref(),
            &system,
            &prompt,
            SCORING_TEMPERATURE,
        )
        .await
        {
            Ok(payload) => merge_feedback(payload),
            Err(e) => {
                warn!("Session {session_id} feedback synthesis fell back to defaults: {e}");
                fallback_feedback()
            }
        }
    }
}

fn scores_summary(
    communication: &CommunicationScores,
    content: &ContentScores,
    behavioral: &BehavioralScores,
) -> String {
    let mut lines = vec![
        format!("- Clarity: {}", communication.clarity_score),
        format!("- Confidence: {}", communication.confidence_score),
        format!("- Pace: {}", communication.pace_score),
        format!("- Technical accuracy: {}", content.technical_accuracy_score),
        format!("- Problem solving: {}", content.problem_solving_score),
        format!("- Structure: {}", content.structure_score),
        format!("- Relevance: {}", content.relevance_score),
    ];
    let behavioral_lines = [
        ("STAR method", behavioral.star_method_score),
        ("Leadership", behavioral.leadership_score),
        ("Teamwork", behavioral.teamwork_score),
    ];
    for (label, score) in behavioral_lines {
        if let Some(score) = score {
            lines.push(format!("- {label}: {score}"));
        }
    }
    lines.join("\n")
}

/// Cleans the model's lists and fills anything left empty from the fallback.
fn merge_feedback(payload: FeedbackPayload) -> AssessmentFeedback {
    let defaults = fallback_feedback();
    let strengths = clean_list(payload.strengths, defaults.strengths);
    let improvements = clean_list(payload.improvements, defaults.improvements);
    let detailed = payload.detailed_feedback.trim();

    AssessmentFeedback {
        strengths,
        weaknesses: improvements.clone(),
        improvements,
        detailed_feedback: if detailed.is_empty() {
            defaults.detailed_feedback
        } else {
            detailed.to_string()
        },
        next_steps: clean_list(payload.next_steps, defaults.next_steps),
        recommended_topics: clean_list(payload.recommended_topics, defaults.recommended_topics),
        source: PassSource::Model,
    }
}

fn clean_list(items: Vec<String>, default: Vec<String>) -> Vec<String> {
    let cleaned: Vec<String> = items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .take(MAX_LIST_ITEMS)
        .collect();
    if cleaned.is_empty() {
        default
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{unavailable, ScriptedModel};
    use crate::llm_client::ChatMessage;
    use crate::models::interaction::{interaction_fixture, MessageRole};
    use crate::models::session::session_fixture;

    const COMMUNICATION_JSON: &str = r#"{"clarity": 80, "confidence": 60, "pace": 90}"#;
    const CONTENT_JSON: &str =
        r#"{"technical_accuracy": 85, "problem_solving": 75, "structure": 65, "relevance": 95}"#;
    const BEHAVIORAL_JSON: &str = r#"{"star_method": 88, "leadership": 72, "teamwork": 91}"#;
    const FEEDBACK_JSON: &str = r#"Here you go:
        {"strengths": ["Concrete metrics", "  ", "Calm delivery"],
         "improvements": ["Shorter intros"],
         "detailed_feedback": "Solid answers overall.",
         "next_steps": [],
         "recommended_topics": ["Negotiation"]}"#;

    #[derive(Clone, Copy, PartialEq)]
    enum Pass {
        Communication,
        Content,
        Behavioral,
        Feedback,
    }

    fn pass_of(system: &str) -> Pass {
        if system.contains("communication coach") {
            Pass::Communication
        } else if system.contains("answer content") {
            Pass::Content
        } else if system.contains("STAR") {
            Pass::Behavioral
        } else {
            Pass::Feedback
        }
    }

    /// Answers every pass with valid JSON except those in `failing`.
    fn model(failing: &'static [Pass]) -> Arc<ScriptedModel> {
        Arc::new(ScriptedModel::new(move |system, _history: &[ChatMessage]| {
            let pass = pass_of(system);
            if failing.contains(&pass) {
                return Err(unavailable());
            }
            Ok(match pass {
                Pass::Communication => COMMUNICATION_JSON,
                Pass::Content => CONTENT_JSON,
                Pass::Behavioral => BEHAVIORAL_JSON,
                Pass::Feedback => FEEDBACK_JSON,
            }
            .to_string())
        }))
    }

    fn transcript() -> Vec<InteractionRow> {
        vec![
            interaction_fixture(0, MessageRole::Assistant, "Tell me about a conflict."),
            interaction_fixture(1, MessageRole::User, "Um, I basically mediated it."),
            interaction_fixture(2, MessageRole::Assistant, "What was the result?"),
            interaction_fixture(3, MessageRole::User, "We shipped on time."),
            interaction_fixture(4, MessageRole::Assistant, "How did you lead?"),
            interaction_fixture(5, MessageRole::User, "I set up daily syncs."),
        ]
    }

    /// The session row as `save_assessment` leaves it.
    fn stored_row(report: &AssessmentReport) -> InterviewSessionRow {
        let c = &report.communication_scores;
        let k = &report.content_scores;
        let b = &report.behavioral_scores;
        let mut row = session_fixture(Uuid::new_v4(), report.interview_type);
        row.id = report.session_id;
        row.overall_score = Some(report.overall_score);
        row.verbal_communication_score = Some(c.verbal_communication_score);
        row.clarity_score = Some(c.clarity_score);
        row.confidence_score = Some(c.confidence_score);
        row.pace_score = Some(c.pace_score);
        row.technical_accuracy_score = Some(k.technical_accuracy_score);
        row.problem_solving_score = Some(k.problem_solving_score);
        row.structure_score = Some(k.structure_score);
        row.relevance_score = Some(k.relevance_score);
        row.star_method_score = b.star_method_score;
        row.leadership_score = b.leadership_score;
        row.teamwork_score = b.teamwork_score;
        row
    }

    #[tokio::test]
    async fn test_behavioral_session_scores_every_group() {
        let model = model(&[]);
        let engine = AssessmentEngine::new(model.clone(), ScoreWeighting::Renormalized);

        let report = engine
            .evaluate(Uuid::new_v4(), InterviewType::Behavioral, &transcript())
            .await;

        assert_eq!(model.calls(), 4);
        assert_eq!(report.communication_scores.verbal_communication_score, 70.0);
        assert_eq!(report.communication_scores.words_per_minute, 150.0);
        assert_eq!(report.communication_scores.filler_word_count, 2);
        assert_eq!(report.content_scores.relevance_score, 95.0);
        assert_eq!(report.behavioral_scores.star_method_score, Some(88.0));
        assert_eq!(report.behavioral_scores.source, Some(PassSource::Model));
        // comm 76.67, content 80, behavioral 83.67
        assert_eq!(report.overall_score, 79.73);
    }

    #[tokio::test]
    async fn test_non_behavioral_session_leaves_behavioral_null() {
        let model = model(&[]);
        let engine = AssessmentEngine::new(model.clone(), ScoreWeighting::Renormalized);

        let report = engine
            .evaluate(Uuid::new_v4(), InterviewType::General, &transcript())
            .await;

        assert_eq!(model.calls(), 3);
        assert!(report.behavioral_scores.star_method_score.is_none());
        assert!(report.behavioral_scores.leadership_score.is_none());
        assert!(report.behavioral_scores.teamwork_score.is_none());
        assert!((0.0..=100.0).contains(&report.overall_score));

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["behavioral_scores"]["teamwork_score"].is_null());
    }

    #[tokio::test]
    async fn test_failed_content_pass_falls_back_alone() {
        let engine = AssessmentEngine::new(model(&[Pass::Content]), ScoreWeighting::Renormalized);

        let report = engine
            .evaluate(Uuid::new_v4(), InterviewType::Behavioral, &transcript())
            .await;

        let content = &report.content_scores;
        assert_eq!(content.source, PassSource::Fallback);
        for score in [
            content.technical_accuracy_score,
            content.problem_solving_score,
            content.structure_score,
            content.relevance_score,
        ] {
            assert_eq!(score, 70.0);
        }
        assert_eq!(report.communication_scores.clarity_score, 80.0);
        assert_eq!(report.communication_scores.source, PassSource::Model);
        assert_eq!(report.behavioral_scores.teamwork_score, Some(91.0));
        assert_eq!(report.feedback.source, PassSource::Model);
    }

    #[tokio::test]
    async fn test_malformed_scores_are_treated_as_failures() {
        let model = Arc::new(ScriptedModel::new(|system, _| {
            Ok(match pass_of(system) {
                Pass::Communication => r#"{"clarity": 120, "confidence": 60, "pace": 90}"#,
                Pass::Content => r#"{"technical_accuracy": 85, "problem_solving": 75}"#,
                _ => "no json at all",
            }
            .to_string())
        }));
        let engine = AssessmentEngine::new(model, ScoreWeighting::Legacy);

        let report = engine
            .evaluate(Uuid::new_v4(), InterviewType::Technical, &transcript())
            .await;

        assert_eq!(report.communication_scores.source, PassSource::Fallback);
        assert_eq!(report.content_scores.source, PassSource::Fallback);
        assert_eq!(report.feedback.source, PassSource::Fallback);
        // Every dimension at 70; legacy weights without behavioral give 0.8 * 70.
        assert_eq!(report.overall_score, 56.0);
    }

    #[tokio::test]
    async fn test_total_outage_still_yields_complete_report() {
        let engine = AssessmentEngine::new(
            Arc::new(ScriptedModel::failing()),
            ScoreWeighting::Renormalized,
        );

        let report = engine
            .evaluate(Uuid::new_v4(), InterviewType::Behavioral, &transcript())
            .await;

        assert_eq!(report.overall_score, 70.0);
        assert_eq!(report.behavioral_scores.leadership_score, Some(70.0));
        let feedback = &report.feedback;
        assert_eq!(feedback.strengths.len(), 2);
        assert_eq!(feedback.weaknesses, feedback.improvements);
        assert!(!feedback.detailed_feedback.is_empty());
        assert!(!feedback.next_steps.is_empty());
        assert!(!feedback.recommended_topics.is_empty());
    }

    #[tokio::test]
    async fn test_feedback_lists_are_cleaned_and_completed() {
        let engine = AssessmentEngine::new(model(&[]), ScoreWeighting::Renormalized);
        let report = engine
            .evaluate(Uuid::new_v4(), InterviewType::General, &transcript())
            .await;

        let feedback = &report.feedback;
        assert_eq!(feedback.strengths, vec!["Concrete metrics", "Calm delivery"]);
        assert_eq!(feedback.weaknesses, vec!["Shorter intros"]);
        assert_eq!(feedback.improvements, feedback.weaknesses);
        assert_eq!(feedback.next_steps, fallback_feedback().next_steps);
        assert_eq!(feedback.recommended_topics, vec!["Negotiation"]);
    }

    #[tokio::test]
    async fn test_overall_is_reproducible_from_dimensions() {
        let engine = AssessmentEngine::new(model(&[]), ScoreWeighting::Renormalized);
        let report = engine
            .evaluate(Uuid::new_v4(), InterviewType::Behavioral, &transcript())
            .await;

        assert_eq!(
            compute_overall(&report.dimension_scores(), ScoreWeighting::Renormalized),
            report.overall_score
        );
    }

    #[tokio::test]
    async fn test_stored_overall_is_recomputable_from_stored_columns() {
        for (interview_type, weighting) in [
            (InterviewType::Behavioral, ScoreWeighting::Renormalized),
            (InterviewType::General, ScoreWeighting::Renormalized),
            (InterviewType::Behavioral, ScoreWeighting::Legacy),
            (InterviewType::Technical, ScoreWeighting::Legacy),
        ] {
            let engine = AssessmentEngine::new(model(&[Pass::Content]), weighting);
            let report = engine
                .evaluate(Uuid::new_v4(), interview_type, &transcript())
                .await;
            let row = stored_row(&report);

            let stored = DimensionScores::from_session(&row);
            assert_eq!(Some(compute_overall(&stored, weighting)), row.overall_score);
            assert_eq!(
                row.teamwork_score.is_some(),
                interview_type == InterviewType::Behavioral
            );
        }
    }
}
