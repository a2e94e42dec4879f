//! Shared prompt constants and prompt-building utilities.
//! Each service that needs LLM calls defines its own prompts.rs alongside it.
//! This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every scoring prompt so ratings stay on one scale.
pub const SCORE_SCALE_INSTRUCTION: &str = "\
    Every score is an integer from 0 to 100 inclusive. \
    Use exactly the keys requested; do not add or omit keys.";

/// Fills `{name}` placeholders in a prompt template.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{name}}}"), value)
    })
}
