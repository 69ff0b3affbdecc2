//! Pricing cache — per-model token prices with a TTL and a static fallback.
//!
//! # Refresh rules
//!
//! - A table younger than the TTL is served as-is.
//! - Otherwise the [`PricingFetcher`] is asked for a fresh table. A successful,
//!   non-empty fetch replaces the cached table wholesale together with its
//!   timestamp.
//! - Any fetch failure is swallowed: the static fallback table is served and
//!   the cache is left untouched, so the next call tries the fetch again.
//!
//! Concurrent callers that find the cache stale may each fetch; the last write
//! wins and every write is a complete table, so readers never see a mix.
//!
//! Clock and fetcher are injected so TTL behaviour can be driven from tests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

// ── Table ────────────────────────────────────────────────────────────────────

/// USD price per 1000 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingEntry {
    pub prompt: f64,
    pub completion: f64,
}

/// Backend model id → price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PricingTable {
    entries: HashMap<String, PricingEntry>,
}

impl PricingTable {
    pub fn from_entries(entries: impl IntoIterator<Item = (String, PricingEntry)>) -> Self {
        Self { entries: entries.into_iter().collect() }
    }

    pub fn get(&self, model_id: &str) -> Option<&PricingEntry> {
        self.entries.get(model_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Prices for the built-in models, used whenever the live table is unavailable.
pub fn static_pricing() -> PricingTable {
    const STATIC: &[(&str, f64, f64)] = &[
        ("openai/gpt-4o", 0.0025, 0.01),
        ("openai/gpt-4o-mini", 0.00015, 0.0006),
        ("openai/gpt-4-turbo", 0.01, 0.03),
        ("anthropic/claude-3.5-sonnet", 0.003, 0.015),
        ("anthropic/claude-3-opus", 0.015, 0.075),
        ("anthropic/claude-3-haiku", 0.00025, 0.00125),
        ("google/gemini-1.5-pro", 0.00125, 0.005),
        ("google/gemini-1.5-flash", 0.000075, 0.0003),
        ("meta-llama/llama-3.1-70b-instruct", 0.00052, 0.00075),
        ("mistralai/mistral-large", 0.002, 0.006),
    ];
    PricingTable::from_entries(STATIC.iter().map(|(id, prompt, completion)| {
        (id.to_string(), PricingEntry { prompt: *prompt, completion: *completion })
    }))
}

// ── Seams ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("pricing request failed: {0}")]
    Request(String),
    #[error("pricing endpoint returned HTTP {0}")]
    Status(u16),
    #[error("malformed pricing payload: {0}")]
    Decode(String),
    #[error("pricing payload contained no usable entries")]
    Empty,
}

/// A boxed, borrowed future returned by [`PricingFetcher::fetch`].
pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<PricingTable, PricingError>> + Send + 'a>>;

/// Source of a fresh pricing table.
pub trait PricingFetcher: Send + Sync {
    fn fetch(&self) -> FetchFuture<'_>;
}

/// Monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// ── Remote fetcher ───────────────────────────────────────────────────────────

/// Fetches the model listing endpoint (`{data:[{id, pricing:{prompt, completion}}]}`)
/// and converts per-token USD prices into per-1000-token prices.
#[derive(Debug, Clone)]
pub struct RemotePricingFetcher {
    client: Client,
    url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl RemotePricingFetcher {
    pub fn new(client: Client, url: String, api_key: Option<String>, timeout: Duration) -> Self {
        Self { client, url, api_key, timeout }
    }

    async fn fetch_table(&self) -> Result<PricingTable, PricingError> {
        let mut req = self.client.get(&self.url).timeout(self.timeout);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await.map_err(|e| PricingError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PricingError::Status(status.as_u16()));
        }
        let body = response.text().await.map_err(|e| PricingError::Request(e.to_string()))?;
        parse_models_payload(&body)
    }
}

impl PricingFetcher for RemotePricingFetcher {
    fn fetch(&self) -> FetchFuture<'_> {
        Box::pin(self.fetch_table())
    }
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<WireModel>,
}

#[derive(Deserialize)]
struct WireModel {
    id: String,
    #[serde(default)]
    pricing: Option<WirePricing>,
}

#[derive(Deserialize)]
struct WirePricing {
    #[serde(default)]
    prompt: Option<serde_json::Value>,
    #[serde(default)]
    completion: Option<serde_json::Value>,
}

/// Parse a model listing; entries without two valid per-token prices are skipped.
fn parse_models_payload(body: &str) -> Result<PricingTable, PricingError> {
    let parsed: ModelsResponse =
        serde_json::from_str(body).map_err(|e| PricingError::Decode(e.to_string()))?;
    let total = parsed.data.len();

    let table = PricingTable::from_entries(parsed.data.into_iter().filter_map(|m| {
        let pricing = m.pricing?;
        let prompt = per_token_rate(pricing.prompt.as_ref()?)?;
        let completion = per_token_rate(pricing.completion.as_ref()?)?;
        Some((m.id, PricingEntry { prompt: prompt * 1000.0, completion: completion * 1000.0 }))
    }));

    if table.is_empty() {
        return Err(PricingError::Empty);
    }
    if table.len() < total {
        debug!(usable = table.len(), total, "skipped model entries without valid pricing");
    }
    Ok(table)
}

/// Prices arrive as decimal strings (`"0.000003"`) or plain numbers.
fn per_token_rate(v: &serde_json::Value) -> Option<f64> {
    let rate = match v {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        serde_json::Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    (rate.is_finite() && rate >= 0.0).then_some(rate)
}

// ── Cache ────────────────────────────────────────────────────────────────────

struct CachedTable {
    table: Arc<PricingTable>,
    fetched_at: Instant,
}

struct Inner {
    /// `None` = static-only mode, never fetch.
    fetcher: Option<Arc<dyn PricingFetcher>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    fallback: Arc<PricingTable>,
    slot: RwLock<Option<CachedTable>>,
}

/// Shared pricing cache. Clone freely — all clones see the same table.
#[derive(Clone)]
pub struct PricingCache {
    inner: Arc<Inner>,
}

impl PricingCache {
    pub fn new(fetcher: Arc<dyn PricingFetcher>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self::build(Some(fetcher), clock, ttl)
    }

    /// A cache that never fetches and always serves [`static_pricing`].
    pub fn static_only() -> Self {
        Self::build(None, Arc::new(SystemClock), Duration::ZERO)
    }

    fn build(fetcher: Option<Arc<dyn PricingFetcher>>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                clock,
                ttl,
                fallback: Arc::new(static_pricing()),
                slot: RwLock::new(None),
            }),
        }
    }

    /// Current pricing table. Never fails.
    pub async fn get_pricing(&self) -> Arc<PricingTable> {
        let Some(fetcher) = &self.inner.fetcher else {
            return self.inner.fallback.clone();
        };

        if let Some(table) = self.fresh().await {
            return table;
        }

        match fetcher.fetch().await {
            Ok(table) if !table.is_empty() => {
                let table = Arc::new(table);
                info!(models = table.len(), "pricing table refreshed");
                *self.inner.slot.write().await = Some(CachedTable {
                    table: table.clone(),
                    fetched_at: self.inner.clock.now(),
                });
                table
            }
            Ok(_) => {
                warn!("pricing fetch returned an empty table — using static fallback");
                self.inner.fallback.clone()
            }
            Err(e) => {
                warn!(error = %e, "pricing fetch failed — using static fallback");
                self.inner.fallback.clone()
            }
        }
    }

    async fn fresh(&self) -> Option<Arc<PricingTable>> {
        let slot = self.inner.slot.read().await;
        let cached = slot.as_ref()?;
        let age = self.inner.clock.now().saturating_duration_since(cached.fetched_at);
        (age < self.inner.ttl).then(|| cached.table.clone())
    }
}
