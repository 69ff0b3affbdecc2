//! Public configuration types.
//!
//! These are the resolved, ready-to-use structs the playground consumes.
//! Raw TOML deserialization types live in `raw.rs`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

// ── Server ───────────────────────────────────────────────────────────────────

/// HTTP API configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the axum listener binds to.
    pub bind: String,
}

// ── LLM ──────────────────────────────────────────────────────────────────────

/// OpenAI-compatible backend configuration (`[llm.openai]`).
///
/// The default endpoints point at OpenRouter, which serves every model in the
/// resolver table behind one chat-completions URL.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model listing endpoint used by the pricing cache.
    pub models_url: String,
    /// TCP connect timeout. Per-call deadlines come from the playground.
    pub connect_timeout_seconds: u64,
}

/// Offline echo backend configuration (`[llm.dummy]`).
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Artificial latency added to every completion.
    pub latency_ms: u64,
}

/// LLM backend configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"openai"` or `"dummy"`).
    pub provider: String,
    pub openai: OpenAiConfig,
    pub dummy: DummyConfig,
}

// ── Playground ───────────────────────────────────────────────────────────────

/// Winner fallback policies for the comparison metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Pick the first successful result as quality winner when nothing is rated.
    pub quality_fallback: bool,
    /// Pick the cost winner as efficiency winner when no rated, costed result exists.
    pub efficiency_fallback: bool,
}

/// Batch runner defaults (`[playground]`).
#[derive(Debug, Clone)]
pub struct PlaygroundConfig {
    /// Maximum concurrent model calls per chunk.
    pub concurrency: usize,
    /// Per-call deadline.
    pub timeout: Duration,
    /// Write completed tests to `{work_dir}/tests/` as JSON.
    pub persist: bool,
    pub metrics: MetricsConfig,
}

// ── Pricing ──────────────────────────────────────────────────────────────────

/// Where the pricing cache gets its table from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingSourceKind {
    /// Fetch from `llm.openai.models_url`, falling back to the static table.
    Remote,
    /// Always serve the static table.
    Static,
}

/// Pricing cache configuration (`[pricing]`).
#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub source: PricingSourceKind,
    /// How long a successful fetch stays fresh.
    pub ttl: Duration,
    /// Deadline for one fetch of the model listing endpoint.
    pub fetch_timeout: Duration,
}

// ── Models ───────────────────────────────────────────────────────────────────

/// Extra short-name → backend-id mappings (`[models.aliases]`).
#[derive(Debug, Clone, Default)]
pub struct ModelsConfig {
    pub aliases: HashMap<String, String>,
}

// ── Top level ────────────────────────────────────────────────────────────────

/// Fully-resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    /// Working directory for persisted data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Optional log file; stderr when absent.
    pub log_file: Option<PathBuf>,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` env var — `None` for keyless local models.
    /// Never sourced from TOML.
    pub llm_api_key: Option<String>,
    pub playground: PlaygroundConfig,
    pub pricing: PricingConfig,
    pub models: ModelsConfig,
}

impl Config {
    /// Directory completed tests are written to when persistence is on.
    pub fn tests_dir(&self) -> PathBuf {
        self.work_dir.join("tests")
    }
}
