//! Interview workflow prompt templates.
//! All prompts for the interview module are defined here.

/// Spoken in place of a model reply the interviewer could not produce.
pub const APOLOGY: &str = "I apologize, but I encountered an error. Let's continue.";

/// Closes the transcript when the summary call fails.
pub const CLOSING_FALLBACK: &str = "\
Thank you for your time today; that completes the interview. \
Your detailed assessment will be available once the session is completed.";

pub const INTERVIEWER_SYSTEM: &str = "\
{persona}

Session details:
- Interview type: {interview_type}
{brief}
Progress: you have asked {asked} of {max_questions} questions so far.
Ask exactly one question per turn. Keep each turn under 150 words.";

pub const FINAL_QUESTION_NOTE: &str = "\
This is the final question of the session; do not announce further questions.";

/// Sent after the transcript to obtain the interviewer's closing summary.
pub const CLOSING_SUMMARY_PROMPT: &str = "\
The {interview_type} interview is over after {asked} questions. \
Speaking directly to the candidate, close the session with a short summary in four labelled parts:
Overall assessment: two or three sentences.
Strengths: two or three bullet points drawn from specific answers.
Improvements: two or three bullet points.
Recommendations: two or three concrete practice suggestions.
Do not ask any further questions.";
