//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies `PROMPTLAB_WORK_DIR` and `PROMPTLAB_LOG_LEVEL` env overrides.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

use super::raw::{
    RawConfig, RawLlm, RawModels, RawPlayground, RawPricing, RawServer, default_bind,
    default_name,
};
use super::types::*;

/// Deep-merge two TOML values.
/// Tables are merged recursively — the overlay only needs to specify keys that
/// differ from the base. For every other type (string, integer, array, …)
/// the overlay value replaces the base value wholesale.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// fully merged `toml::Value`. `visited` carries canonicalized paths already
/// seen in this chain so circular references are caught early.
fn load_raw_merged(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// If no path is given and `config/default.toml` does not exist, returns a hardcoded minimal default.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("PROMPTLAB_WORK_DIR").ok();
    let log_level_override = env::var("PROMPTLAB_LOG_LEVEL").ok();

    if let Some(path) = config_path {
        return load_from(
            Path::new(path),
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        );
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        return load_from(
            default_path,
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        );
    }

    // Hardcoded minimal default
    let raw = RawConfig {
        server: RawServer {
            name: default_name(),
            work_dir: "~/.promptlab".to_string(),
            log_level: "info".to_string(),
            log_file: None,
            bind: default_bind(),
        },
        llm: RawLlm::default(),
        playground: RawPlayground::default(),
        pricing: RawPricing::default(),
        models: RawModels::default(),
    };
    resolve(
        raw,
        work_dir_override.as_deref(),
        log_level_override.as_deref(),
        env::var("LLM_API_KEY").ok(),
    )
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
/// Follows `[meta] base = "..."` inheritance chains before resolving.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = Deserialize::deserialize(merged_val)
        .map_err(|e: toml::de::Error| {
            AppError::Config(format!("config error in {}: {e}", path.display()))
        })?;

    resolve(
        parsed,
        work_dir_override,
        log_level_override,
        env::var("LLM_API_KEY").ok(),
    )
}

/// Turn raw TOML values into the resolved [`Config`], validating enums and
/// alias targets on the way.
fn resolve(
    parsed: RawConfig,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
    llm_api_key: Option<String>,
) -> Result<Config, AppError> {
    let s = parsed.server;

    let work_dir_str = work_dir_override.unwrap_or(&s.work_dir).to_string();
    let work_dir = expand_home(&work_dir_str);
    let log_level = log_level_override.unwrap_or(&s.log_level).to_string();
    let log_file = s.log_file.map(|p| {
        let p = expand_home(&p);
        if p.is_absolute() { p } else { work_dir.join(p) }
    });

    match parsed.llm.provider.as_str() {
        "openai" | "openai-compatible" | "dummy" => {}
        other => {
            return Err(AppError::Config(format!("unknown llm provider: {other}")));
        }
    }

    let source = match parsed.pricing.source.as_str() {
        "remote" => PricingSourceKind::Remote,
        "static" => PricingSourceKind::Static,
        other => {
            return Err(AppError::Config(format!(
                "pricing.source must be \"remote\" or \"static\", got \"{other}\""
            )));
        }
    };

    if let Some((name, target)) = parsed
        .models
        .aliases
        .iter()
        .find(|(_, target)| !target.contains('/'))
    {
        return Err(AppError::Config(format!(
            "models.aliases.{name} must map to a vendor-qualified id, got \"{target}\""
        )));
    }

    Ok(Config {
        name: s.name,
        work_dir,
        log_level,
        log_file,
        server: ServerConfig { bind: s.bind },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                models_url: parsed.llm.openai.models_url,
                connect_timeout_seconds: parsed.llm.openai.connect_timeout_seconds,
            },
            dummy: DummyConfig { latency_ms: parsed.llm.dummy.latency_ms },
        },
        llm_api_key,
        playground: PlaygroundConfig {
            concurrency: parsed.playground.concurrency.max(1),
            timeout: Duration::from_millis(parsed.playground.timeout_ms.max(1)),
            persist: parsed.playground.persist,
            metrics: MetricsConfig {
                quality_fallback: parsed.playground.metrics.quality_fallback,
                efficiency_fallback: parsed.playground.metrics.efficiency_fallback,
            },
        },
        pricing: PricingConfig {
            source,
            ttl: Duration::from_secs(parsed.pricing.ttl_seconds),
            fetch_timeout: Duration::from_secs(parsed.pricing.fetch_timeout_seconds.max(1)),
        },
        models: ModelsConfig { aliases: parsed.models.aliases },
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
