//! Assessment Engine LLM prompt templates.
//! All prompts for the assessment module are defined here.

use crate::models::session::InterviewType;

pub const COMMUNICATION_SYSTEM: &str = "\
You are an expert communication coach reviewing a mock interview transcript. \
Rate the candidate's communication:
- clarity: how clear and articulate the answers are
- confidence: how assured and direct the candidate sounds
- pace: how well the speaking rate suits the conversation
Return JSON exactly like {\"clarity\": 0, \"confidence\": 0, \"pace\": 0}.";

pub const COMMUNICATION_PROMPT: &str = "\
Transcript:
{transcript}

Measured speaking rate: {words_per_minute} words per minute
Filler words used: {filler_word_count}";

pub const CONTENT_SYSTEM: &str = "\
You are an expert {interview_type} interviewer rating the answer content of a mock interview. \
Rate:
- technical_accuracy: how correct the answers are
- problem_solving: how well the candidate approaches problems
- structure: how well organised the answers are
- relevance: how directly the answers address the questions
{type_guidance}
Return JSON exactly like {\"technical_accuracy\": 0, \"problem_solving\": 0, \"structure\": 0, \"relevance\": 0}.";

pub const CONTENT_PROMPT: &str = "\
Interview type: {interview_type}

Transcript:
{transcript}";

pub const BEHAVIORAL_SYSTEM: &str = "\
You rate STAR structure, leadership and teamwork in behavioral interview answers. \
Rate:
- star_method: use of Situation, Task, Action and Result
- leadership: evidence of ownership and leading others
- teamwork: evidence of collaboration
Return JSON exactly like {\"star_method\": 0, \"leadership\": 0, \"teamwork\": 0}.";

pub const BEHAVIORAL_PROMPT: &str = "\
Transcript:
{transcript}";

pub const FEEDBACK_SYSTEM: &str = "\
You are an interview coach writing the final feedback for a mock interview. \
Base every point on the transcript and the scores provided. Return JSON with keys:
- strengths: 3 to 5 specific strengths
- improvements: 3 to 5 specific areas to improve
- detailed_feedback: a 2 to 3 sentence narrative
- next_steps: 3 to 5 concrete next steps
- recommended_topics: 2 to 3 topics to study";

pub const FEEDBACK_PROMPT: &str = "\
Interview type: {interview_type}

Scores (0-100):
{scores}

Transcript:
{transcript}";

/// Extra framing for the content pass, per interview type.
pub fn content_guidance(interview_type: InterviewType) -> &'static str {
    match interview_type {
        InterviewType::Behavioral => "Judge technical_accuracy as the factual consistency of the stories told.",
        InterviewType::Technical => "Weigh depth of understanding over breadth of buzzwords.",
        InterviewType::Case => "Judge problem_solving on structuring, hypotheses and quantitative reasoning.",
        InterviewType::SystemDesign => "Weigh trade-off discussion, scaling limits and failure handling.",
        InterviewType::Coding => "Weigh algorithmic correctness, complexity analysis and edge cases.",
        InterviewType::General => "Judge technical_accuracy as the accuracy of claims about the candidate's field.",
    }
}
