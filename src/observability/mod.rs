//! # Observability Infrastructure
//!
//! Structured logging for the CLI. Every module logs through `tracing` with
//! structured fields (`certificate`, `thumbprint`, `path`, ...).

pub mod logging;

pub use logging::{init_logging, LoggingConfig};
