//! promptlab — run one prompt against many LLMs and compare the results.
//!
//! - **core** — configuration and the application error type.
//! - **bootstrap** — logger initialisation.
//! - **llm** — provider backends and the model-name resolver.
//! - **playground** — pricing, batch runner, cost, comparison metrics, test store.
//! - **http** — axum API over the playground.

pub mod bootstrap;
pub mod core;
pub mod http;
pub mod llm;
pub mod playground;

pub use bootstrap::logger;
pub use core::{config, error};
