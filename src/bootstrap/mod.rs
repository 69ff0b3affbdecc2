//! Bootstrap layer — modules that run before the playground starts.
//!
//! - **logger** — tracing-subscriber initialisation.

pub mod logger;
