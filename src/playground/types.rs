//! Playground data model.
//!
//! [`ModelResult`] keeps success and failure apart as [`CallOutcome`] in Rust
//! and flattens to the wire shape clients expect: an optional `error` field
//! marks a failed call.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::GenerationParams;

use super::cost::{ZERO_COST, parse_cost};

// ── Validation ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("promptText must not be empty")]
    EmptyPrompt,
    #[error("models must contain at least one model")]
    NoModels,
    #[error("model name at index {0} is empty")]
    EmptyModelName(usize),
    #[error("temperature must be within [0, 1], got {0}")]
    Temperature(f32),
    #[error("maxTokens must be at least 1")]
    MaxTokens,
    #[error("topP must be within [0, 1], got {0}")]
    TopP(f32),
    #[error("concurrency must be at least 1")]
    Concurrency,
    #[error("timeoutMs must be at least 1")]
    Timeout,
    #[error("rating must be between 1 and 5, got {0}")]
    Rating(u8),
}

// ── Request ──────────────────────────────────────────────────────────────────

/// Per-request overrides of the runner defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub concurrency: Option<usize>,
}

/// One playground submission. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequest {
    pub prompt_text: String,
    pub models: Vec<String>,
    #[serde(default)]
    pub parameters: GenerationParams,
    #[serde(default)]
    pub options: RunOptions,
}

impl TestRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.prompt_text.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        if self.models.is_empty() {
            return Err(ValidationError::NoModels);
        }
        if let Some(idx) = self.models.iter().position(|m| m.trim().is_empty()) {
            return Err(ValidationError::EmptyModelName(idx));
        }
        let p = &self.parameters;
        if !(0.0..=1.0).contains(&p.temperature) {
            return Err(ValidationError::Temperature(p.temperature));
        }
        if p.max_tokens < 1 {
            return Err(ValidationError::MaxTokens);
        }
        if !(0.0..=1.0).contains(&p.top_p) {
            return Err(ValidationError::TopP(p.top_p));
        }
        if self.options.concurrency == Some(0) {
            return Err(ValidationError::Concurrency);
        }
        if self.options.timeout_ms == Some(0) {
            return Err(ValidationError::Timeout);
        }
        Ok(())
    }
}

// ── Rating ───────────────────────────────────────────────────────────────────

/// A user rating, 1 to 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = ValidationError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        if (1..=5).contains(&v) { Ok(Self(v)) } else { Err(ValidationError::Rating(v)) }
    }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> u8 {
        r.0
    }
}

// ── ModelResult ──────────────────────────────────────────────────────────────

/// What came back from one model call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Success { response: String, token_count: u64, cost: String },
    Failure { error: String },
}

/// One model's result within a batch.
///
/// Created once per model per run. Only the rating fields change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ModelResultWire", from = "ModelResultWire")]
pub struct ModelResult {
    /// Model name exactly as requested.
    pub model: String,
    /// Wall-clock latency, recorded for failures too.
    pub response_time_ms: u64,
    pub outcome: CallOutcome,
    pub rating: Option<Rating>,
    pub rated_at: Option<DateTime<Utc>>,
}

impl ModelResult {
    pub fn success(
        model: impl Into<String>,
        response: String,
        token_count: u64,
        cost: String,
        elapsed: Duration,
    ) -> Self {
        Self {
            model: model.into(),
            response_time_ms: elapsed.as_millis() as u64,
            outcome: CallOutcome::Success { response, token_count, cost },
            rating: None,
            rated_at: None,
        }
    }

    pub fn failure(model: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            model: model.into(),
            response_time_ms: elapsed.as_millis() as u64,
            outcome: CallOutcome::Failure { error: error.into() },
            rating: None,
            rated_at: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CallOutcome::Success { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            CallOutcome::Failure { error } => Some(error),
            CallOutcome::Success { .. } => None,
        }
    }

    /// Response text; empty for failures.
    pub fn response(&self) -> &str {
        match &self.outcome {
            CallOutcome::Success { response, .. } => response,
            CallOutcome::Failure { .. } => "",
        }
    }

    pub fn token_count(&self) -> u64 {
        match &self.outcome {
            CallOutcome::Success { token_count, .. } => *token_count,
            CallOutcome::Failure { .. } => 0,
        }
    }

    /// Cost as a decimal string; `"0.00"` for failures.
    pub fn cost(&self) -> &str {
        match &self.outcome {
            CallOutcome::Success { cost, .. } => cost,
            CallOutcome::Failure { .. } => ZERO_COST,
        }
    }

    /// Cost parsed back to a number, zero when unparseable.
    pub fn cost_value(&self) -> f64 {
        parse_cost(self.cost())
    }

    pub fn attach_rating(&mut self, rating: Rating, at: DateTime<Utc>) {
        self.rating = Some(rating);
        self.rated_at = Some(at);
    }
}

/// Flat JSON shape of a [`ModelResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelResultWire {
    model: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    token_count: u64,
    #[serde(default = "zero_cost")]
    cost: String,
    response_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rating: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rated_at: Option<DateTime<Utc>>,
}

fn zero_cost() -> String {
    ZERO_COST.to_string()
}

impl From<ModelResult> for ModelResultWire {
    fn from(r: ModelResult) -> Self {
        let (response, token_count, cost, error) = match r.outcome {
            CallOutcome::Success { response, token_count, cost } => (response, token_count, cost, None),
            CallOutcome::Failure { error } => (String::new(), 0, zero_cost(), Some(error)),
        };
        Self {
            model: r.model,
            response,
            token_count,
            cost,
            response_time: r.response_time_ms,
            error,
            rating: r.rating,
            rated_at: r.rated_at,
        }
    }
}

impl From<ModelResultWire> for ModelResult {
    fn from(w: ModelResultWire) -> Self {
        let outcome = match w.error {
            Some(error) => CallOutcome::Failure { error },
            None => CallOutcome::Success {
                response: w.response,
                token_count: w.token_count,
                cost: w.cost,
            },
        };
        Self {
            model: w.model,
            response_time_ms: w.response_time,
            outcome,
            rating: w.rating,
            rated_at: w.rated_at,
        }
    }
}

// ── TestOutcome ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub successful: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Batch-level result: one [`ModelResult`] per requested model, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub results: Vec<ModelResult>,
    pub total_cost: String,
    pub summary: Summary,
}

impl TestOutcome {
    pub fn from_results(results: Vec<ModelResult>, duration: Duration) -> Self {
        let successful = results.iter().filter(|r| r.is_success()).count();
        let total: f64 = results.iter().map(ModelResult::cost_value).sum();
        Self {
            total_cost: format!("{total:.6}"),
            summary: Summary {
                successful,
                failed: results.len() - successful,
                duration_ms: duration.as_millis() as u64,
            },
            results,
        }
    }
}
