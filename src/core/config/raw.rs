//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use std::collections::HashMap;

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape — serde target before resolution.
#[derive(Deserialize)]
pub(super) struct RawConfig {
    pub server: RawServer,
    #[serde(default)]
    pub llm: RawLlm,
    #[serde(default)]
    pub playground: RawPlayground,
    #[serde(default)]
    pub pricing: RawPricing,
    #[serde(default)]
    pub models: RawModels,
}

#[derive(Deserialize)]
pub(super) struct RawServer {
    #[serde(default = "default_name")]
    pub name: String,
    pub work_dir: String,
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default = "default_bind")]
    pub bind: String,
}

// ── LLM ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub openai: RawOpenAiConfig,
    #[serde(default)]
    pub dummy: RawDummyConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            openai: RawOpenAiConfig::default(),
            dummy: RawDummyConfig::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_openai_models_url")]
    pub models_url: String,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            models_url: default_openai_models_url(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
        }
    }
}

#[derive(Deserialize, Default)]
pub(super) struct RawDummyConfig {
    #[serde(default)]
    pub latency_ms: u64,
}

// ── Playground ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawPlayground {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_false")]
    pub persist: bool,
    #[serde(default)]
    pub metrics: RawMetrics,
}

impl Default for RawPlayground {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_ms: default_timeout_ms(),
            persist: false,
            metrics: RawMetrics::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawMetrics {
    #[serde(default = "default_true")]
    pub quality_fallback: bool,
    #[serde(default = "default_true")]
    pub efficiency_fallback: bool,
}

impl Default for RawMetrics {
    fn default() -> Self {
        Self { quality_fallback: true, efficiency_fallback: true }
    }
}

// ── Pricing ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawPricing {
    #[serde(default = "default_pricing_source")]
    pub source: String,
    #[serde(default = "default_pricing_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_pricing_fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u64,
}

impl Default for RawPricing {
    fn default() -> Self {
        Self {
            source: default_pricing_source(),
            ttl_seconds: default_pricing_ttl_seconds(),
            fetch_timeout_seconds: default_pricing_fetch_timeout_seconds(),
        }
    }
}

// ── Models ──────────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub(super) struct RawModels {
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

// ── Defaults ────────────────────────────────────────────────────────────────

pub(super) fn default_name() -> String { "promptlab".to_string() }
pub(super) fn default_bind() -> String { "127.0.0.1:8080".to_string() }
pub(super) fn default_llm_provider() -> String { "openai".to_string() }
pub(super) fn default_openai_api_base_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}
pub(super) fn default_openai_models_url() -> String {
    "https://openrouter.ai/api/v1/models".to_string()
}
pub(super) fn default_connect_timeout_seconds() -> u64 { 10 }
pub(super) fn default_concurrency() -> usize { 3 }
pub(super) fn default_timeout_ms() -> u64 { 30_000 }
pub(super) fn default_pricing_source() -> String { "remote".to_string() }
pub(super) fn default_pricing_ttl_seconds() -> u64 { 600 }
pub(super) fn default_pricing_fetch_timeout_seconds() -> u64 { 10 }

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}
