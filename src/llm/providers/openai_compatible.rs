//! OpenAI-compatible chat completion provider (`/v1/chat/completions`).
//!
//! One round-trip per call: the prompt goes out as the only user message and
//! the first choice comes back. All OpenAI wire types are private to this
//! module — callers only see [`ChatCompletion`] or [`ProviderError`].

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::llm::{ChatCompletion, GenerationParams, ProviderError, TokenUsage};

// ── Public provider ───────────────────────────────────────────────────────────

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions`.
///
/// Covers OpenRouter, OpenAI and compatible local servers. Constructed once
/// at startup, then cheaply cloned because `reqwest::Client` is an `Arc`
/// internally. No request-level timeout is configured on the client: the
/// playground enforces its own per-call deadline through the cancellation
/// token.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// Build a provider. `api_key` is `None` for keyless local models; when
    /// present it is sent as `Authorization: Bearer <key>`.
    pub fn new(
        api_base_url: String,
        connect_timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_base_url, api_key })
    }

    pub async fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> Result<ChatCompletion, ProviderError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(model = %model_id, "LLM request cancelled");
                Err(ProviderError::Cancelled)
            }
            result = self.send(model_id, prompt, params) => result,
        }
    }

    async fn send(
        &self,
        model_id: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ChatCompletion, ProviderError> {
        let payload = ChatCompletionRequest {
            model: model_id,
            messages: vec![Message { role: "user", content: prompt }],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
        };

        debug!(
            model = %model_id,
            temperature = params.temperature,
            max_tokens = params.max_tokens,
            top_p = params.top_p,
            prompt_len = prompt.len(),
            "sending LLM request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full LLM request payload");
        }

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            warn!(url = %self.api_base_url, error = %e, "LLM HTTP request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;

        let response = check_status(response).await?;

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            warn!(model = %model_id, error = %e, "failed to deserialize LLM response");
            ProviderError::Decode(e.to_string())
        })?;

        debug!(model = %model_id, choices = parsed.choices.len(), "received LLM response");

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(ChatCompletion { text, usage: parsed.usage.unwrap_or_default() })
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(status, &body);

    warn!(%status, %message, "LLM request returned HTTP error");
    Err(ProviderError::Status { status: status.as_u16(), message })
}

/// Human-readable message for a failed reply: the structured error body's
/// message when it parses, otherwise the status text.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) if !env.error.message.trim().is_empty() => env.error.message,
        _ => status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string()),
    }
}
