//! # Error Handling
//!
//! Error types for certsync built with `thiserror`. Library code returns
//! [`CertsyncError`]; the CLI boundary wraps it in `anyhow`.

pub mod format;
pub mod types;

pub use format::FormatError;
pub use types::{CertsyncError, Result};
