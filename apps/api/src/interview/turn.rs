use std::sync::Arc;

use tracing::{debug, warn};

use crate::interview::prompts;
use crate::interview::state::{InterviewRunState, SessionBrief};
use crate::llm_client::prompts::fill;
use crate::llm_client::{ChatMessage, LanguageModel};

pub const INTERVIEW_TEMPERATURE: f32 = 0.7;

/// Produces one interviewer utterance per call. The transcript only grows:
/// existing messages are never removed or reordered.
#[derive(Clone)]
pub struct TurnEngine {
    llm: Arc<dyn LanguageModel>,
}

impl TurnEngine {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Appends `incoming` (if any), asks the model for the next turn and appends it.
    ///
    /// A failed model call yields the fixed apology as the utterance; nothing
    /// else about the state changes.
    pub async fn next_turn(
        &self,
        mut state: InterviewRunState,
        incoming: Option<&str>,
    ) -> (String, InterviewRunState) {
        if let Some(answer) = incoming.map(str::trim).filter(|a| !a.is_empty()) {
            state.messages.push(ChatMessage::user(answer));
        }

        let system = system_instruction(&state);
        let reply = match self
            .llm
            .complete(&system, &state.messages, INTERVIEW_TEMPERATURE)
            .await
        {
            Ok(reply) => {
                debug!(
                    "Session {} question {} generated ({} chars)",
                    state.session_id,
                    state.question_count + 1,
                    reply.len()
                );
                reply
            }
            Err(e) => {
                warn!(
                    "Interviewer turn failed for session {}: {e}; using fallback",
                    state.session_id
                );
                prompts::APOLOGY.to_string()
            }
        };

        state.messages.push(ChatMessage::assistant(reply.clone()));
        (reply, state)
    }
}

/// Persona, session details and progress for the interviewer.
pub fn system_instruction(state: &InterviewRunState) -> String {
    let asked = state.question_count.to_string();
    let max_questions = state.max_questions.to_string();

    let mut instruction = fill(
        prompts::INTERVIEWER_SYSTEM,
        &[
            ("persona", state.user_context.trim()),
            ("interview_type", &state.interview_type.label()),
            ("brief", &brief_lines(&state.brief)),
            ("asked", &asked),
            ("max_questions", &max_questions),
        ],
    );

    if state.question_count + 1 == state.max_questions {
        instruction.push('\n');
        instruction.push_str(prompts::FINAL_QUESTION_NOTE);
    }
    instruction
}

fn brief_lines(brief: &SessionBrief) -> String {
    [
        ("Target role", &brief.role_context),
        ("Target company", &brief.company_context),
        ("Difficulty", &brief.difficulty_level),
        ("Additional instructions", &brief.custom_instructions),
    ]
    .into_iter()
    .filter_map(|(label, value)| {
        let value = value.as_deref()?.trim();
        (!value.is_empty()).then(|| format!("- {label}: {value}\n"))
    })
    .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use uuid::Uuid;

    use super::*;
    use crate::interview::state::{RunStatus, WorkflowNode};
    use crate::llm_client::testing::ScriptedModel;
    use crate::llm_client::ChatRole;
    use crate::models::session::InterviewType;

    pub(crate) fn run_state(interview_type: InterviewType, max_questions: u32) -> InterviewRunState {
        InterviewRunState {
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            interview_type,
            brief: SessionBrief::default(),
            user_context: "You are a friendly interviewer.".to_string(),
            messages: Vec::new(),
            question_count: 0,
            max_questions,
            status: RunStatus::Active,
            analysis: BTreeMap::new(),
            node: WorkflowNode::ConductingInterview,
        }
    }

    #[tokio::test]
    async fn test_next_turn_appends_answer_and_reply() {
        let engine = TurnEngine::new(Arc::new(ScriptedModel::replying("Tell me about a hard bug.")));
        let mut state = run_state(InterviewType::Technical, 5);
        state.messages.push(ChatMessage::assistant("Welcome! Why this role?"));

        let (reply, state) = engine.next_turn(state, Some("  I like systems work.  ")).await;

        assert_eq!(reply, "Tell me about a hard bug.");
        assert_eq!(
            state.messages,
            vec![
                ChatMessage::assistant("Welcome! Why this role?"),
                ChatMessage::user("I like systems work."),
                ChatMessage::assistant("Tell me about a hard bug."),
            ]
        );
    }

    #[tokio::test]
    async fn test_model_failure_yields_apology_without_corrupting_state() {
        let engine = TurnEngine::new(Arc::new(ScriptedModel::failing()));
        let mut state = run_state(InterviewType::General, 5);
        state.question_count = 2;

        let (reply, state) = engine.next_turn(state, Some("My answer")).await;

        assert_eq!(reply, prompts::APOLOGY);
        assert_eq!(state.question_count, 2);
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].role, ChatRole::User);
        assert_eq!(state.last_assistant_message(), Some(prompts::APOLOGY));
    }

    #[tokio::test]
    async fn test_blank_incoming_is_ignored() {
        let engine = TurnEngine::new(Arc::new(ScriptedModel::replying("First question?")));
        let (_, state) = engine
            .next_turn(run_state(InterviewType::General, 5), Some("   "))
            .await;
        assert_eq!(state.messages, vec![ChatMessage::assistant("First question?")]);
    }

    #[tokio::test]
    async fn test_model_sees_progress_and_full_history() {
        let model = Arc::new(ScriptedModel::new(|system, history| {
            assert!(system.contains("you have asked 3 of 5 questions"));
            assert!(system.contains("You are a friendly interviewer."));
            assert_eq!(history.len(), 2);
            Ok("Next question?".to_string())
        }));
        let engine = TurnEngine::new(model.clone());
        let mut state = run_state(InterviewType::Behavioral, 5);
        state.question_count = 3;
        state.messages.push(ChatMessage::assistant("Q3"));

        let (reply, _) = engine.next_turn(state, Some("A3")).await;
        assert_eq!(reply, "Next question?");
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn test_system_instruction_lists_brief_and_final_note() {
        let mut state = run_state(InterviewType::SystemDesign, 3);
        state.question_count = 2;
        state.brief = SessionBrief {
            role_context: Some("Platform Engineer".to_string()),
            company_context: None,
            difficulty_level: Some(" hard ".to_string()),
            custom_instructions: Some(String::new()),
        };

        let instruction = system_instruction(&state);
        assert!(instruction.contains("- Interview type: system design"));
        assert!(instruction.contains("- Target role: Platform Engineer"));
        assert!(instruction.contains("- Difficulty: hard"));
        assert!(!instruction.contains("Target company"));
        assert!(!instruction.contains("Additional instructions"));
        assert!(instruction.contains(prompts::FINAL_QUESTION_NOTE));
    }
}
