//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities — clone them freely.
//! Every call takes a [`CancellationToken`] so the caller owns the deadline;
//! providers only promise to stop promptly once it fires.

pub mod providers;
pub mod resolver;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    /// Transport-level failure (DNS, connect, reset, client build).
    #[error("provider request failed: {0}")]
    Request(String),
    /// Non-2xx reply. `message` comes from the `{error:{message}}` body when
    /// present, otherwise from the status line.
    #[error("API error (HTTP {status}): {message}")]
    Status { status: u16, message: String },
    /// 2xx reply whose body was not a chat completion.
    #[error("failed to parse response body: {0}")]
    Decode(String),
    /// The caller's cancellation token fired before the reply arrived.
    #[error("request cancelled")]
    Cancelled,
}

// ── Request / response ────────────────────────────────────────────────────────

/// Sampling parameters forwarded to the backend unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
        }
    }
}

fn default_temperature() -> f32 { 0.7 }
fn default_max_tokens() -> u32 { 1000 }
fn default_top_p() -> f32 { 1.0 }

/// Token usage as reported by the backend.
///
/// Every count is optional: some backends omit usage entirely, others report
/// only a subset. Consumers normalise missing values to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: Option<f64>,
    #[serde(default)]
    pub completion_tokens: Option<f64>,
    #[serde(default)]
    pub total_tokens: Option<f64>,
}

impl TokenUsage {
    /// Total tokens for display: the reported total, else prompt + completion.
    pub fn total(&self) -> u64 {
        let reported = self.total_tokens.map(sanitize_count);
        reported.unwrap_or_else(|| {
            sanitize_count(self.prompt_tokens.unwrap_or(0.0))
                + sanitize_count(self.completion_tokens.unwrap_or(0.0))
        })
    }
}

fn sanitize_count(n: f64) -> u64 {
    if n.is_finite() && n > 0.0 { n.round() as u64 } else { 0 }
}

/// A normalised single-choice chat completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    /// Content of the first choice; empty when the backend sent none.
    pub text: String,
    pub usage: TokenUsage,
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new `complete` arm.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
    Dummy(providers::dummy::DummyProvider),
}

impl LlmProvider {
    /// Send `prompt` as a single user message to `model_id`.
    pub async fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> Result<ChatCompletion, ProviderError> {
        match self {
            LlmProvider::OpenAiCompatible(p) => p.complete(model_id, prompt, params, cancel).await,
            LlmProvider::Dummy(p) => p.complete(model_id, prompt, params, cancel).await,
        }
    }

    /// Short identifier for logs and the status banner.
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::OpenAiCompatible(_) => "openai",
            LlmProvider::Dummy(_) => "dummy",
        }
    }
}
