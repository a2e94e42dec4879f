pub mod handlers;
pub mod prompts;
pub mod repository;
pub mod state;
pub mod turn;
pub mod workflow;

pub use workflow::InterviewWorkflow;
