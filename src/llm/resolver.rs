//! Model resolver — maps playground model names to backend model ids.
//!
//! Short names (`gpt-4o-mini`) resolve through a fixed table, optionally
//! extended by `[models.aliases]`. Anything containing a `/` is already a
//! vendor-qualified id and passes through untouched.

use std::collections::BTreeMap;
use std::collections::HashMap;

use thiserror::Error;

/// Separator between vendor and model in a qualified id.
const NAMESPACE_SEPARATOR: char = '/';

/// Built-in short-name table.
const BUILTIN_MODELS: &[(&str, &str)] = &[
    ("gpt-4o", "openai/gpt-4o"),
    ("gpt-4o-mini", "openai/gpt-4o-mini"),
    ("gpt-4-turbo", "openai/gpt-4-turbo"),
    ("claude-3.5-sonnet", "anthropic/claude-3.5-sonnet"),
    ("claude-3-opus", "anthropic/claude-3-opus"),
    ("claude-3-haiku", "anthropic/claude-3-haiku"),
    ("gemini-1.5-pro", "google/gemini-1.5-pro"),
    ("gemini-1.5-flash", "google/gemini-1.5-flash"),
    ("llama-3.1-70b", "meta-llama/llama-3.1-70b-instruct"),
    ("mistral-large", "mistralai/mistral-large"),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unsupported model: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone)]
pub struct ModelResolver {
    // BTreeMap keeps `supported_models` output stable.
    table: BTreeMap<String, String>,
}

impl Default for ModelResolver {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}

impl ModelResolver {
    /// Built-in table plus `aliases`; an alias with the same short name as a
    /// built-in entry replaces it.
    pub fn new(aliases: &HashMap<String, String>) -> Self {
        let mut table: BTreeMap<String, String> = BUILTIN_MODELS
            .iter()
            .map(|(short, id)| (short.to_string(), id.to_string()))
            .collect();
        for (short, id) in aliases {
            table.insert(short.clone(), id.clone());
        }
        Self { table }
    }

    pub fn resolve(&self, name: &str) -> Result<String, ResolveError> {
        let name = name.trim();
        if is_qualified(name) {
            return Ok(name.to_string());
        }
        self.table
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::Unsupported(name.to_string()))
    }

    pub fn is_supported(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// `(short name, backend id)` pairs, sorted by short name.
    pub fn supported_models(&self) -> impl Iterator<Item = (&str, &str)> {
        self.table.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// `vendor/model` with both halves non-empty.
fn is_qualified(name: &str) -> bool {
    match name.split_once(NAMESPACE_SEPARATOR) {
        Some((vendor, model)) => !vendor.is_empty() && !model.is_empty(),
        None => false,
    }
}
