//! LLM Provider Abstraction Layer
//!
//! This module provides the interface between the generation pipeline and the
//! external completion service. The `LLMProvider` trait defines the contract a
//! provider must implement; [`openai::OpenAIProvider`] talks to any
//! OpenAI-compatible `/chat/completions` endpoint.
//!
//! Also home to the two pieces of response handling every stage shares:
//! usage metadata normalization and structured-output extraction.

use async_trait::async_trait;
use sdk::errors::VariantError;
use sdk::types::UsageRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub mod openai;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request ({status}): {message}")]
    InvalidRequest { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl LLMError {
    /// Whether another attempt could succeed without changing configuration
    ///
    /// Credential failures and request rejections repeat on every attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            LLMError::AuthenticationFailed(_) | LLMError::InvalidRequest { .. }
        )
    }
}

impl From<LLMError> for VariantError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::ProviderUnavailable(msg) => VariantError::UpstreamUnavailable(msg),
            LLMError::AuthenticationFailed(_) => VariantError::UpstreamUnavailable(
                "completion service rejected the configured credentials".to_string(),
            ),
            LLMError::RateLimitExceeded => VariantError::UpstreamRateLimited,
            LLMError::InvalidRequest { status, message } => {
                VariantError::UpstreamRejected { status, message }
            }
            LLMError::NetworkError(msg) => VariantError::UpstreamUnavailable(msg),
            LLMError::Timeout => VariantError::UpstreamTimeout,
            LLMError::ParseError(msg) => VariantError::UpstreamMalformedOutput(msg),
        }
    }
}

/// Message in a completion request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Pipeline stage issuing a call
///
/// Carried on every request for logging and so test doubles can route on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallStage {
    Analyze,
    Plan,
    Draft,
    Review,
}

impl CallStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStage::Analyze => "analyze",
            CallStage::Plan => "plan",
            CallStage::Draft => "draft",
            CallStage::Review => "review",
        }
    }
}

impl fmt::Display for CallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call to the completion service
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub stage: CallStage,
    pub messages: Vec<Message>,

    /// Effort hint forwarded as `reasoning_effort`
    pub effort: Option<String>,

    /// Ask for a JSON object response
    pub json_object: bool,
}

impl CompletionRequest {
    pub fn new(stage: CallStage, messages: Vec<Message>) -> Self {
        Self {
            stage,
            messages,
            effort: None,
            json_object: false,
        }
    }

    /// Concatenated message text, useful for routing in test doubles
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Generated text plus the usage it cost
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: UsageRecord,
}

impl Completion {
    pub fn new(content: impl Into<String>, usage: UsageRecord) -> Self {
        Self {
            content: content.into(),
            usage,
        }
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "openai")
    fn name(&self) -> &str;

    /// Model identity requests are sent to
    fn model(&self) -> &str;

    /// Run one completion
    ///
    /// # Returns
    /// * `Ok(Completion)` - Generated text and normalized usage
    /// * `Err(LLMError)` - If the request fails
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;

    /// Check if the provider is currently healthy and available
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Normalize a provider usage object into a [`UsageRecord`]
///
/// Accepts both chat-completions names (`prompt_tokens`, `completion_tokens`)
/// and responses-API names (`input_tokens`, `output_tokens`). Missing,
/// negative or non-numeric fields count as zero. When `total_tokens` is
/// absent or zero, the total is the sum of the other three fields.
pub fn usage_from_metadata(metadata: &Value) -> UsageRecord {
    let field = |path: &[&str]| -> u64 {
        let mut node = metadata;
        for key in path {
            match node.get(key) {
                Some(next) => node = next,
                None => return 0,
            }
        }
        token_count(node)
    };
    let first_nonzero = |paths: &[&[&str]]| -> u64 {
        paths.iter().map(|p| field(p)).find(|n| *n > 0).unwrap_or(0)
    };

    let input = first_nonzero(&[&["prompt_tokens"], &["input_tokens"]]);
    let output = first_nonzero(&[&["completion_tokens"], &["output_tokens"]]);
    let reasoning = first_nonzero(&[
        &["reasoning_tokens"],
        &["completion_tokens_details", "reasoning_tokens"],
        &["output_tokens_details", "reasoning_tokens"],
    ]);
    let total = match field(&["total_tokens"]) {
        0 => input.saturating_add(output).saturating_add(reasoning),
        n => n,
    };

    UsageRecord::new(input, output, reasoning, total)
}

fn token_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && *f >= 0.0)
                        .map(|f| f as u64)
                })
                .unwrap_or(0)
        }
        _ => 0,
    }
}

/// Extract the first JSON value a model response carries
///
/// Handles multiple output formats:
/// 1. Raw JSON: the whole trimmed text parses
/// 2. Fenced JSON (with or without trailing text): ` ```json\n{...}\n``` `
/// 3. An object embedded in prose, found by brace matching
pub fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() || value.is_array() {
            return Some(value);
        }
    }

    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(inner.trim()) {
            if value.is_object() || value.is_array() {
                return Some(value);
            }
        }
    }

    trimmed
        .match_indices('{')
        .filter_map(|(pos, _)| extract_balanced_json(&trimmed[pos..]))
        .find_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
}

/// Like [`extract_json`], restricted to objects
pub fn extract_json_object(content: &str) -> Option<serde_json::Map<String, Value>> {
    match extract_json(content)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
