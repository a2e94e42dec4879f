//! Objective communication metrics computed straight from the transcript.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::models::interaction::{InteractionRow, MessageRole};

/// Assumed speaking rate when no candidate turn carries audio duration.
pub const BASELINE_WPM: f64 = 150.0;

static FILLER_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(um|uh|like|you know|basically|actually|literally)\b")
        .expect("filler word pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunicationMetrics {
    pub total_words: usize,
    pub total_duration_seconds: f64,
    pub words_per_minute: f64,
    pub filler_word_count: usize,
}

/// Whole-word, case-insensitive filler count. "Like totally, I liked it" counts one.
pub fn count_filler_words(text: &str) -> usize {
    FILLER_WORDS.find_iter(&text.to_lowercase()).count()
}

/// `None` when there is no positive duration to divide by.
pub fn words_per_minute(words: usize, duration_seconds: f64) -> Option<f64> {
    (duration_seconds > 0.0).then(|| words as f64 / duration_seconds * 60.0)
}

pub fn is_candidate(interaction: &InteractionRow) -> bool {
    interaction.role == MessageRole::User.as_str()
}

pub fn communication_metrics(interactions: &[InteractionRow]) -> CommunicationMetrics {
    let mut total_words = 0usize;
    let mut total_duration_seconds = 0.0f64;
    let mut filler_word_count = 0usize;

    for turn in interactions.iter().filter(|i| is_candidate(i)) {
        total_words += turn.content.split_whitespace().count();
        total_duration_seconds += turn
            .audio_duration_seconds
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(0.0);
        filler_word_count += count_filler_words(&turn.content);
    }

    CommunicationMetrics {
        total_words,
        total_duration_seconds,
        words_per_minute: words_per_minute(total_words, total_duration_seconds)
            .unwrap_or(BASELINE_WPM),
        filler_word_count,
    }
}

/// "Interviewer:" / "Candidate:" lines separated by blank lines.
/// System and tool rows are not part of the conversation and are skipped.
pub fn render_transcript(interactions: &[InteractionRow]) -> String {
    interactions
        .iter()
        .filter_map(|turn| {
            let speaker = if turn.is_interviewer() {
                "Interviewer"
            } else if is_candidate(turn) {
                "Candidate"
            } else {
                return None;
            };
            Some(format!("{speaker}: {}", turn.content))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
