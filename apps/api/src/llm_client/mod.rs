//! LLM Client: the single point of entry for all model calls in the interview API.
//!
//! ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
//! Services depend on the `LanguageModel` trait; `LlmClient` is the production
//! implementation and is injected through `AppState`.
//!
//! Model: claude-sonnet-4-5, fixed for every call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 2048;

/// Sent as the opening user turn when a conversation starts with the interviewer.
const KICKOFF_TURN: &str = "Hello, I'm ready to begin the interview.";
/// Sent as the closing user turn when the interviewer spoke last.
const CONTINUE_TURN: &str = "Please continue.";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM reply contained no JSON object")]
    NoJsonObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One turn of conversation history as the model sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// The completion capability every service depends on.
///
/// Carried in `AppState` as `Arc<dyn LanguageModel>` so tests can swap in a
/// scripted model without touching callers.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generates the next assistant turn for `messages` under `system`.
    async fn complete(
        &self,
        system: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, LlmError>;
}

/// Sends a single prompt and deserializes the first JSON object in the reply.
///
/// Prose or code fences around the payload are tolerated; anything that does
/// not deserialize into `T` is an error for the caller to absorb.
pub async fn complete_json<T: DeserializeOwned>(
    llm: &dyn LanguageModel,
    system: &str,
    prompt: &str,
    temperature: f32,
) -> Result<T, LlmError> {
    let reply = llm
        .complete(system, &[ChatMessage::user(prompt)], temperature)
        .await?;
    let payload = extract_json_object(&reply).ok_or(LlmError::NoJsonObject)?;
    serde_json::from_str(payload).map_err(LlmError::Parse)
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Production `LanguageModel` backed by the Anthropic Messages API.
/// Retries on transport errors, 429 and 5xx with exponential backoff.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    max_retries: u32,
}

impl LlmClient {
    pub fn new(api_key: String, timeout: Duration, max_retries: u32) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            max_retries,
        })
    }

    /// Makes a raw call to the Claude API, returning the full response object.
    /// Performs at most `1 + max_retries` attempts.
    pub async fn call(
        &self,
        system: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<LlmResponse, LlmError> {
        let turns = vendor_turns(messages);
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            temperature,
            system,
            messages: turns
                .iter()
                .map(|(role, content)| AnthropicMessage {
                    role: role.as_str(),
                    content: content.as_str(),
                })
                .collect(),
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1).min(4)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                llm_response.usage.input_tokens, llm_response.usage.output_tokens
            );

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: self.max_retries,
        }))
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(
        &self,
        system: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, LlmError> {
        let response = self.call(system, messages, temperature).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(text.to_string())
    }
}

/// Shapes interview history for the Messages API: the first and last turns
/// must come from the user and consecutive turns of one role are merged.
/// The caller's transcript is never modified.
fn vendor_turns(messages: &[ChatMessage]) -> Vec<(ChatRole, String)> {
    let mut turns: Vec<(ChatRole, String)> = Vec::with_capacity(messages.len() + 2);

    for message in messages {
        match turns.last_mut() {
            Some((role, content)) if *role == message.role => {
                content.push_str("\n\n");
                content.push_str(&message.content);
            }
            _ => turns.push((message.role, message.content.clone())),
        }
    }

    if turns.first().map(|(role, _)| *role) != Some(ChatRole::User) {
        turns.insert(0, (ChatRole::User, KICKOFF_TURN.to_string()));
    }
    if turns.last().map(|(role, _)| *role) != Some(ChatRole::User) {
        turns.push((ChatRole::User, CONTINUE_TURN.to_string()));
    }

    turns
}

/// Returns the first balanced `{ ... }` span in `text`.
///
/// Braces inside JSON string literals do not count toward nesting.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();

    for (start, _) in text.match_indices('{') {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (offset, &byte) in bytes[start..].iter().enumerate() {
            if in_string {
                match byte {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match byte {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..=start + offset]);
                    }
                }
                _ => {}
            }
        }
    }

    None
}

#[cfg(test)]
pub mod testing {
    //! In-process model doubles for unit tests.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::{ChatMessage, LanguageModel, LlmError};

    type Script = dyn Fn(&str, &[ChatMessage]) -> Result<String, LlmError> + Send + Sync;

    /// A model whose replies are computed by a closure over (system, history).
    pub struct ScriptedModel {
        script: Box<Script>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        pub fn new(
            script: impl Fn(&str, &[ChatMessage]) -> Result<String, LlmError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                script: Box::new(script),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn replying(text: &str) -> Self {
            let text = text.to_string();
            Self::new(move |_, _| Ok(text.clone()))
        }

        pub fn failing() -> Self {
            Self::new(|_, _| Err(unavailable()))
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    pub fn unavailable() -> LlmError {
        LlmError::Api {
            status: 503,
            message: "model overloaded".to_string(),
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(
            &self,
            system: &str,
            messages: &[ChatMessage],
            _temperature: f32,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.script)(system, messages)
        }
    }
}
