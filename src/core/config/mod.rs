//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `PROMPTLAB_WORK_DIR` and `PROMPTLAB_LOG_LEVEL` env overrides.
//!
//! # Module layout
//!
//! - **types** — Public configuration structs (`Config`, `LlmConfig`,
//!   `PlaygroundConfig`, `PricingConfig`, …).
//! - **raw** — Raw TOML deserialization types (`RawConfig`, `RawLlm`, …).
//!   These mirror the file shape and use serde defaults; kept private.
//! - **load** — Loading logic: `merge_toml`, `load_raw_merged`, `load`,
//!   `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{expand_home, load, load_from};
pub use types::*;

#[cfg(test)]
impl Config {
    /// Safe `Config` for unit tests — dummy LLM, static pricing, no external calls.
    pub fn test_default(work_dir: &std::path::Path) -> Self {
        Self {
            name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            log_file: None,
            server: ServerConfig { bind: raw::default_bind() },
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    models_url: "http://localhost:0/v1/models".into(),
                    connect_timeout_seconds: 1,
                },
                dummy: DummyConfig { latency_ms: 0 },
            },
            llm_api_key: None,
            playground: PlaygroundConfig {
                concurrency: 3,
                timeout: std::time::Duration::from_secs(1),
                persist: false,
                metrics: MetricsConfig { quality_fallback: true, efficiency_fallback: true },
            },
            pricing: PricingConfig {
                source: PricingSourceKind::Static,
                ttl: std::time::Duration::from_secs(600),
                fetch_timeout: std::time::Duration::from_secs(1),
            },
            models: ModelsConfig::default(),
        }
    }
}
