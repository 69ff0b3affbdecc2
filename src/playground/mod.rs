//! Multi-model playground.
//!
//! One prompt, many models, side-by-side results:
//!
//! - **pricing** — TTL-cached per-model token prices with a static fallback.
//! - **cost** — per-call cost from token usage.
//! - **runner** — concurrency-bounded batch execution; failures are data.
//! - **metrics** — winners and summary statistics over a batch.
//! - **store** — completed tests and their ratings.
//! - **types** — request, result and outcome types shared by all of the above.

pub mod cost;
pub mod metrics;
pub mod pricing;
pub mod runner;
pub mod store;
pub mod types;

pub use metrics::{ComparisonMetrics, MetricsPolicy, compute_metrics, compute_metrics_with};
pub use pricing::{PricingCache, PricingTable};
pub use runner::{PlaygroundRunner, RunnerDefaults};
pub use store::{StoreError, StoredTest, TestStore};
pub use types::{ModelResult, Rating, RunOptions, TestOutcome, TestRequest, ValidationError};
