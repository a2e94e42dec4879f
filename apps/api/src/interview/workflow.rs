//! Interview State Machine.
//!
//! ```text
//! preparing_context -> conducting_interview -> analyzing_response -> checking_completion
//!                            ^                                             |
//!                            +------------- question_count < max ----------+
//!                                                                          |
//!                                  generating_feedback <- question_count == max
//!                                          |
//!                                         done
//! ```
//!
//! The loop is bounded by `max_questions`. `run` drives to `done` in one go;
//! `start`/`resume` pause after every interviewer turn so each candidate answer
//! advances exactly one conduct/analyze/check cycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::ContextProvider;
use crate::errors::AppError;
use crate::interview::prompts;
use crate::interview::state::{
    InterviewRunState, ResponseAnalysis, RunStatus, SessionBrief, WorkflowNode,
};
use crate::interview::turn::{TurnEngine, INTERVIEW_TEMPERATURE};
use crate::llm_client::prompts::fill;
use crate::llm_client::{ChatMessage, LanguageModel};
use crate::models::session::InterviewType;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("The interview has already finished")]
    Finished,

    #[error("The interview has already started")]
    AlreadyStarted,

    #[error("The interview is not waiting for an answer (currently {0})")]
    NotAwaitingAnswer(WorkflowNode),

    #[error("Stored interview state is unreadable: {0}")]
    CorruptCursor(String),
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::CorruptCursor(_) => AppError::Internal(anyhow::Error::new(err)),
            other => AppError::Validation(other.to_string()),
        }
    }
}

pub struct InterviewWorkflow {
    context: ContextProvider,
    turns: TurnEngine,
    llm: Arc<dyn LanguageModel>,
    max_questions: u32,
}

impl InterviewWorkflow {
    pub fn new(context: ContextProvider, llm: Arc<dyn LanguageModel>, max_questions: u32) -> Self {
        Self {
            context,
            turns: TurnEngine::new(llm.clone()),
            llm,
            max_questions: max_questions.max(1),
        }
    }

    pub fn initial_state(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        interview_type: InterviewType,
        brief: SessionBrief,
    ) -> InterviewRunState {
        InterviewRunState {
            user_id,
            session_id,
            interview_type,
            brief,
            user_context: String::new(),
            messages: Vec::new(),
            question_count: 0,
            max_questions: self.max_questions,
            status: RunStatus::Initializing,
            analysis: BTreeMap::new(),
            node: WorkflowNode::PreparingContext,
        }
    }

    /// Executes the node under the cursor and moves the cursor along its edge.
    pub async fn step(&self, state: InterviewRunState) -> InterviewRunState {
        match state.node {
            WorkflowNode::PreparingContext => self.prepare_context(state).await,
            WorkflowNode::ConductingInterview => self.conduct(state).await,
            WorkflowNode::AnalyzingResponse => analyze_response(state),
            WorkflowNode::CheckingCompletion => check_completion(state),
            WorkflowNode::GeneratingFeedback => self.generate_feedback(state).await,
            WorkflowNode::Done => state,
        }
    }

    /// Drives the graph to `done` without waiting for candidate input.
    #[cfg(test)]
    pub async fn run(&self, mut state: InterviewRunState) -> InterviewRunState {
        while !state.is_finished() {
            state = self.step(state).await;
        }
        state
    }

    /// Prepares context and asks the first question, then waits for an answer.
    pub async fn start(&self, state: InterviewRunState) -> Result<InterviewRunState, WorkflowError> {
        if state.node != WorkflowNode::PreparingContext {
            return Err(WorkflowError::AlreadyStarted);
        }
        let state = self.step(state).await;
        Ok(self.step(state).await)
    }

    /// Records the candidate's answer and advances one cycle: analyze, check,
    /// then either the next question or the closing summary.
    pub async fn resume(
        &self,
        mut state: InterviewRunState,
        answer: &str,
    ) -> Result<InterviewRunState, WorkflowError> {
        match state.node {
            WorkflowNode::AnalyzingResponse => {}
            WorkflowNode::Done => return Err(WorkflowError::Finished),
            other => return Err(WorkflowError::NotAwaitingAnswer(other)),
        }

        state.messages.push(ChatMessage::user(answer.trim()));

        let mut state = self.step(state).await;
        while !matches!(
            state.node,
            WorkflowNode::AnalyzingResponse | WorkflowNode::Done
        ) {
            state = self.step(state).await;
        }
        Ok(state)
    }

    async fn prepare_context(&self, mut state: InterviewRunState) -> InterviewRunState {
        info!(
            "Preparing {} interview context for user {} (session {})",
            state.interview_type, state.user_id, state.session_id
        );

        state.user_context = self
            .context
            .build_personalized_prompt(state.user_id, state.interview_type)
            .await;
        state.question_count = 0;
        state.status = RunStatus::Active;
        state.analysis.clear();
        state.node = WorkflowNode::ConductingInterview;
        state
    }

    async fn conduct(&self, state: InterviewRunState) -> InterviewRunState {
        let (_, mut state) = self.turns.next_turn(state, None).await;
        state.node = WorkflowNode::AnalyzingResponse;
        state
    }

    async fn generate_feedback(&self, mut state: InterviewRunState) -> InterviewRunState {
        info!(
            "Generating closing summary for session {} after {} questions",
            state.session_id, state.question_count
        );

        let request = fill(
            prompts::CLOSING_SUMMARY_PROMPT,
            &[
                ("interview_type", &state.interview_type.label()),
                ("asked", &state.question_count.to_string()),
            ],
        );
        let mut history = state.messages.clone();
        history.push(ChatMessage::user(request));

        let summary = match self
            .llm
            .complete(&state.user_context, &history, INTERVIEW_TEMPERATURE)
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                warn!(
                    "Closing summary failed for session {}: {e}; using fallback",
                    state.session_id
                );
                prompts::CLOSING_FALLBACK.to_string()
            }
        };

        state.messages.push(ChatMessage::assistant(summary));
        state.node = WorkflowNode::Done;
        state
    }
}

/// Records metrics for the latest candidate answer under the current question index.
fn analyze_response(mut state: InterviewRunState) -> InterviewRunState {
    if let Some(answer) = state.last_user_message() {
        let analysis = ResponseAnalysis::of(answer);
        state.analysis.insert(state.question_count, analysis);
    }
    state.node = WorkflowNode::CheckingCompletion;
    state
}

fn check_completion(mut state: InterviewRunState) -> InterviewRunState {
    state.question_count += 1;
    if state.question_count >= state.max_questions {
        state.status = RunStatus::Completed;
        state.node = WorkflowNode::GeneratingFeedback;
    } else {
        state.node = WorkflowNode::ConductingInterview;
    }
    state
}
