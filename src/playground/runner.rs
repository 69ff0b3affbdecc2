//! Batch runner — fans one prompt out to many models.
//!
//! Models run in sequential chunks of `concurrency`; every call inside a chunk
//! runs concurrently and the next chunk starts only once the whole chunk has
//! settled. Results come back in request order.
//!
//! Nothing in here returns an error. Resolution failures, backend failures and
//! timeouts all become error-carrying [`ModelResult`]s.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PlaygroundConfig;
use crate::llm::resolver::ModelResolver;
use crate::llm::{GenerationParams, LlmProvider, ProviderError};

use super::cost::compute_cost;
use super::pricing::{PricingCache, PricingTable};
use super::types::{ModelResult, RunOptions, TestOutcome};

/// Runner-wide defaults; a request may override either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerDefaults {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for RunnerDefaults {
    fn default() -> Self {
        Self { concurrency: 3, timeout: Duration::from_secs(30) }
    }
}

impl From<&PlaygroundConfig> for RunnerDefaults {
    fn from(cfg: &PlaygroundConfig) -> Self {
        Self { concurrency: cfg.concurrency, timeout: cfg.timeout }
    }
}

#[derive(Clone)]
pub struct PlaygroundRunner {
    provider: LlmProvider,
    resolver: Arc<ModelResolver>,
    pricing: PricingCache,
    defaults: RunnerDefaults,
}

impl PlaygroundRunner {
    pub fn new(
        provider: LlmProvider,
        resolver: Arc<ModelResolver>,
        pricing: PricingCache,
        defaults: RunnerDefaults,
    ) -> Self {
        Self { provider, resolver, pricing, defaults }
    }

    /// Short name of the active backend.
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn resolver(&self) -> &ModelResolver {
        &self.resolver
    }

    pub fn pricing(&self) -> &PricingCache {
        &self.pricing
    }

    pub fn defaults(&self) -> RunnerDefaults {
        self.defaults
    }

    /// Run `prompt` against every model in `models`.
    pub async fn run_batch(
        &self,
        models: &[String],
        prompt: &str,
        params: &GenerationParams,
        options: RunOptions,
    ) -> TestOutcome {
        let started = Instant::now();
        let concurrency = options.concurrency.unwrap_or(self.defaults.concurrency).max(1);
        let timeout = options
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.defaults.timeout);

        info!(models = models.len(), concurrency, timeout_ms = timeout.as_millis() as u64, "batch started");

        // Spawned so a panic while fetching pricing surfaces as a JoinError
        // instead of unwinding through the request handler.
        let cache = self.pricing.clone();
        let pricing = match tokio::spawn(async move { cache.get_pricing().await }).await {
            Ok(table) => table,
            Err(e) => {
                error!(error = %e, "batch setup failed");
                let message = format!("batch setup failed: {e}");
                let results = models
                    .iter()
                    .map(|m| ModelResult::failure(m.as_str(), message.as_str(), started.elapsed()))
                    .collect();
                return TestOutcome::from_results(results, started.elapsed());
            }
        };

        let mut results = Vec::with_capacity(models.len());
        for chunk in models.chunks(concurrency) {
            let calls = chunk
                .iter()
                .map(|name| self.test_model(name, prompt, params, &pricing, timeout));
            results.extend(join_all(calls).await);
        }

        let outcome = TestOutcome::from_results(results, started.elapsed());
        info!(
            successful = outcome.summary.successful,
            failed = outcome.summary.failed,
            duration_ms = outcome.summary.duration_ms,
            total_cost = %outcome.total_cost,
            "batch finished"
        );
        outcome
    }

    /// Run `prompt` against a single model. Never fails.
    pub async fn test_model(
        &self,
        name: &str,
        prompt: &str,
        params: &GenerationParams,
        pricing: &PricingTable,
        timeout: Duration,
    ) -> ModelResult {
        let started = Instant::now();

        let model_id = match self.resolver.resolve(name) {
            Ok(id) => id,
            Err(e) => {
                warn!(model = name, error = %e, "model not resolved");
                return ModelResult::failure(name, e.to_string(), started.elapsed());
            }
        };

        // The deadline lives inside this future, so dropping the call drops it too.
        let cancel = CancellationToken::new();
        let call = self.provider.complete(&model_id, prompt, params, &cancel);
        let reply = match tokio::time::timeout(timeout, call).await {
            Ok(reply) => reply,
            Err(_) => {
                cancel.cancel();
                Err(ProviderError::Cancelled)
            }
        };

        match reply {
            Ok(completion) => {
                let cost = compute_cost(&model_id, &completion.usage, pricing);
                let elapsed = started.elapsed();
                debug!(model = name, model_id = %model_id, elapsed_ms = elapsed.as_millis() as u64, cost = %cost, "model call succeeded");
                ModelResult::success(name, completion.text, completion.usage.total(), cost, elapsed)
            }
            Err(ProviderError::Cancelled) => {
                let message = format!("request timed out after {} ms", timeout.as_millis());
                warn!(model = name, model_id = %model_id, "{message}");
                ModelResult::failure(name, message, started.elapsed())
            }
            Err(e) => {
                warn!(model = name, model_id = %model_id, error = %e, "model call failed");
                ModelResult::failure(name, e.to_string(), started.elapsed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::dummy::DummyProvider;
    use crate::playground::pricing::{Clock, FetchFuture, PricingError, PricingFetcher, SystemClock};

    fn runner(latency_ms: u64) -> PlaygroundRunner {
        PlaygroundRunner::new(
            LlmProvider::Dummy(DummyProvider::new(Duration::from_millis(latency_ms))),
            Arc::new(ModelResolver::default()),
            PricingCache::static_only(),
            RunnerDefaults::default(),
        )
    }

    fn names(models: &[&str]) -> Vec<String> {
        models.iter().map(|m| m.to_string()).collect()
    }

    #[tokio::test]
    async fn results_follow_request_order() {
        let models = names(&["gpt-4o", "claude-3-haiku", "acme/custom", "gemini-1.5-flash", "gpt-4o-mini"]);
        let out = runner(5)
            .run_batch(&models, "Hello", &GenerationParams::default(), RunOptions { concurrency: Some(2), ..Default::default() })
            .await;

        let got: Vec<&str> = out.results.iter().map(|r| r.model.as_str()).collect();
        assert_eq!(got, ["gpt-4o", "claude-3-haiku", "acme/custom", "gemini-1.5-flash", "gpt-4o-mini"]);
        assert_eq!(out.summary.successful, 5);
        assert_eq!(out.results[2].response(), "[echo:acme/custom] Hello");
    }

    #[tokio::test]
    async fn unsupported_model_is_a_failed_result() {
        let models = names(&["gpt-9000", "gpt-4o"]);
        let out = runner(0)
            .run_batch(&models, "Hi", &GenerationParams::default(), RunOptions::default())
            .await;

        assert_eq!(out.results.len(), 2);
        assert_eq!(out.results[0].error(), Some("unsupported model: gpt-9000"));
        assert_eq!(out.results[0].cost(), "0.00");
        assert_eq!(out.results[0].token_count(), 0);
        assert!(out.results[1].is_success());
        assert_eq!(out.summary.failed, 1);
        assert_eq!(out.summary.successful, 1);
    }

    #[tokio::test]
    async fn timeout_produces_distinct_message() {
        let models = names(&["gpt-4o"]);
        let out = runner(500)
            .run_batch(&models, "Hi", &GenerationParams::default(), RunOptions { timeout_ms: Some(30), ..Default::default() })
            .await;

        let r = &out.results[0];
        assert_eq!(r.error(), Some("request timed out after 30 ms"));
        assert!(r.response_time_ms >= 30);
        assert!(r.response_time_ms < 500);
    }

    #[tokio::test]
    async fn dropped_call_leaves_no_task_behind() {
        let runner = runner(1_000);
        let table = PricingTable::default();
        let params = GenerationParams::default();
        let call = runner.test_model("gpt-4o", "Hi", &params, &table, Duration::from_secs(60));
        assert!(tokio::time::timeout(Duration::from_millis(10), call).await.is_err());
        assert_eq!(tokio::runtime::Handle::current().metrics().num_alive_tasks(), 0);
    }

    #[tokio::test]
    async fn chunks_bound_concurrency() {
        // 5 models, 2 at a time, 40 ms each -> at least 3 sequential chunks.
        let models = names(&["gpt-4o", "gpt-4o", "gpt-4o", "gpt-4o", "gpt-4o"]);
        let started = Instant::now();
        let out = runner(40)
            .run_batch(&models, "Hi", &GenerationParams::default(), RunOptions { concurrency: Some(2), ..Default::default() })
            .await;
        assert!(started.elapsed() >= Duration::from_millis(120));
        assert_eq!(out.results.len(), 5);
    }

    #[tokio::test]
    async fn zero_concurrency_runs_sequentially() {
        let models = names(&["gpt-4o", "gpt-4o-mini"]);
        let out = runner(0)
            .run_batch(&models, "Hi", &GenerationParams::default(), RunOptions { concurrency: Some(0), ..Default::default() })
            .await;
        assert_eq!(out.summary.successful, 2);
    }

    #[tokio::test]
    async fn success_is_priced_from_table() {
        let out = runner(0)
            .run_batch(&names(&["gpt-4o"]), "a b c d", &GenerationParams::default(), RunOptions::default())
            .await;
        let r = &out.results[0];
        // 4 prompt tokens, 5 completion tokens ("[echo:openai/gpt-4o] a b c d")
        // at 0.0025 / 0.01 per 1K.
        assert_eq!(r.cost(), "0.000060");
        assert_eq!(r.token_count(), 9);
        assert_eq!(out.total_cost, "0.000060");
    }

    struct PanickingFetcher;

    async fn explode() -> Result<PricingTable, PricingError> {
        panic!("pricing backend exploded")
    }

    impl PricingFetcher for PanickingFetcher {
        fn fetch(&self) -> FetchFuture<'_> {
            Box::pin(explode())
        }
    }

    #[tokio::test]
    async fn setup_failure_still_yields_one_result_per_model() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let runner = PlaygroundRunner::new(
            LlmProvider::Dummy(DummyProvider::default()),
            Arc::new(ModelResolver::default()),
            PricingCache::new(Arc::new(PanickingFetcher), clock, Duration::from_secs(60)),
            RunnerDefaults::default(),
        );
        let models = names(&["gpt-4o", "claude-3-haiku", "nope"]);
        let out = runner
            .run_batch(&models, "Hi", &GenerationParams::default(), RunOptions::default())
            .await;

        assert_eq!(out.results.len(), 3);
        assert_eq!(out.summary.failed, 3);
        assert_eq!(out.total_cost, "0.000000");
        for (r, m) in out.results.iter().zip(&models) {
            assert_eq!(&r.model, m);
            assert!(r.error().unwrap().starts_with("batch setup failed"));
        }
    }

    #[tokio::test]
    async fn empty_model_list_is_empty_outcome() {
        let out = runner(0)
            .run_batch(&[], "Hi", &GenerationParams::default(), RunOptions::default())
            .await;
        assert!(out.results.is_empty());
        assert_eq!(out.summary.successful, 0);
        assert_eq!(out.summary.failed, 0);
    }
}
