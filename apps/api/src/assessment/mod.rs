pub mod engine;
pub mod handlers;
pub mod metrics;
pub mod prompts;
pub mod scoring;

pub use engine::AssessmentEngine;
