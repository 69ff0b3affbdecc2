//! HTTP API — axum router over the playground runner and test store.
//!
//! ```text
//! GET  /api/health
//! GET  /api/models
//! GET  /api/pricing
//! POST /api/playground/tests
//! GET  /api/playground/tests/{test_id}
//! POST /api/playground/tests/{test_id}/ratings
//! ```
//!
//! [`serve`] runs until the [`CancellationToken`] fires, then drains
//! in-flight requests (axum graceful shutdown).

mod api;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{Config, PricingSourceKind};
use crate::error::AppError;
use crate::llm::providers;
use crate::llm::resolver::ModelResolver;
use crate::playground::pricing::{RemotePricingFetcher, SystemClock};
use crate::playground::{
    MetricsPolicy, PlaygroundRunner, PricingCache, RunnerDefaults, TestStore,
};

/// Router state injected into every handler via [`axum::extract::State`].
///
/// Cheap to clone — the runner and store are reference-counted inside.
#[derive(Clone)]
pub struct AppState {
    pub runner: PlaygroundRunner,
    pub store: TestStore,
    pub metrics: MetricsPolicy,
}

impl AppState {
    /// Wire provider, resolver, pricing cache, runner and store from config.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let provider = providers::build(&config.llm, config.llm_api_key.clone())
            .map_err(|e| AppError::Config(e.to_string()))?;
        let resolver = Arc::new(ModelResolver::new(&config.models.aliases));

        let pricing = match config.pricing.source {
            PricingSourceKind::Static => PricingCache::static_only(),
            PricingSourceKind::Remote => {
                let client = reqwest::Client::builder()
                    .connect_timeout(Duration::from_secs(config.llm.openai.connect_timeout_seconds))
                    .build()
                    .map_err(|e| AppError::Config(format!("pricing http client: {e}")))?;
                let fetcher = RemotePricingFetcher::new(
                    client,
                    config.llm.openai.models_url.clone(),
                    config.llm_api_key.clone(),
                    config.pricing.fetch_timeout,
                );
                PricingCache::new(Arc::new(fetcher), Arc::new(SystemClock), config.pricing.ttl)
            }
        };

        let store = if config.playground.persist {
            TestStore::open(&config.tests_dir()).map_err(|e| AppError::Store(e.to_string()))?
        } else {
            TestStore::in_memory()
        };

        Ok(Self {
            runner: PlaygroundRunner::new(
                provider,
                resolver,
                pricing,
                RunnerDefaults::from(&config.playground),
            ),
            store,
            metrics: MetricsPolicy::from(&config.playground.metrics),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health",                             get(api::health))
        .route("/api/models",                             get(api::models))
        .route("/api/pricing",                            get(api::pricing))
        .route("/api/playground/tests",                   post(api::create_test))
        .route("/api/playground/tests/{test_id}",         get(api::get_test))
        .route("/api/playground/tests/{test_id}/ratings", post(api::rate_model))
        .with_state(state)
}

/// Bind `bind_addr` and serve until `shutdown` is cancelled.
pub async fn serve(state: AppState, bind_addr: &str, shutdown: CancellationToken) -> Result<(), AppError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {bind_addr}: {e}")))?;

    let local = listener
        .local_addr()
        .map_err(|e| AppError::Server(format!("local_addr: {e}")))?;
    info!(%local, "http api listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("axum server error: {e}")))?;

    info!("http api shut down");
    Ok(())
}
