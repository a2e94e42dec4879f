//! Context Provider: a per-user searchable corpus built from profile, resume
//! and interview history, and the personalized interviewer prompt built on it.
//! Retrieval failures never reach the interview; callers get an empty list or
//! the generic prompt instead.

pub mod chunking;
pub mod handlers;
pub mod prompts;
pub mod provider;
pub mod store;

pub use provider::ContextProvider;
