//! Dummy LLM provider — echoes the prompt back, tagged with the model id.
//!
//! Runs the whole playground offline: usage is a whitespace word count and an
//! optional fixed latency makes concurrency and timeout behaviour observable.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::llm::{ChatCompletion, GenerationParams, ProviderError, TokenUsage};

#[derive(Debug, Clone, Default)]
pub struct DummyProvider {
    latency: Duration,
}

impl DummyProvider {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    pub async fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        _params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> Result<ChatCompletion, ProviderError> {
        if !self.latency.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(self.latency) => {}
            }
        } else if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let text = format!("[echo:{model_id}] {prompt}");
        let prompt_tokens = prompt.split_whitespace().count() as f64;
        let completion_tokens = text.split_whitespace().count() as f64;
        Ok(ChatCompletion {
            text,
            usage: TokenUsage {
                prompt_tokens: Some(prompt_tokens),
                completion_tokens: Some(completion_tokens),
                total_tokens: Some(prompt_tokens + completion_tokens),
            },
        })
    }
}
