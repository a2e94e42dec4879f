//! Prompt templates for the Context Provider.
//! Placeholders are filled with `llm_client::prompts::fill`.

/// Retrieval query used when the caller gives none.
pub const DEFAULT_QUERY: &str = "user profile interview history";

/// Retrieval query for a personalized interviewer prompt.
pub const PERSONALIZATION_QUERY: &str = "{interview_type} interview preparation";

/// Stands in for the candidate background when retrieval finds nothing.
pub const NO_CONTEXT: &str = "No previous context available.";

pub const PERSONALIZED_INTERVIEWER: &str = "\
You are an experienced interview coach running a {interview_type} mock interview.

Candidate background:
{user_context}

How to conduct the interview:
- Keep it realistic: one {interview_type} question at a time, pitched at the candidate's level.
- Tie questions to the candidate's background and earlier answers.
- After each answer give one or two sentences of constructive feedback, then move on.
- Ask a follow-up when an answer is vague or skips the result.
- Stay supportive while holding a professional bar.

Open with a short, personal introduction that references the candidate's background, then ask the first question.";

/// Used when the corpus cannot be reached at all. Must stay usable on its own.
pub const GENERIC_INTERVIEWER: &str = "\
You are an experienced interview coach running a {interview_type} mock interview.
Introduce yourself briefly, then ask relevant interview questions one at a time.";

pub const NEW_CANDIDATE_SUMMARY: &str = "New candidate with no previous interview history.";
pub const SPARSE_CANDIDATE_SUMMARY: &str = "Limited candidate information available.";
