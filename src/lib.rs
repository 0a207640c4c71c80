//! # certsync
//!
//! Keeps TLS certificates held in a secret vault (Azure Key Vault or
//! HashiCorp Vault) in sync with local consumers: a directory tree of PEM and
//! PKCS#12 files, or the Windows certificate store.
//!
//! ## Architecture
//!
//! ```text
//! vault → CertificateCatalog → DownloadFlow ─┬→ FileCertificateStore
//!                                  │          └→ NativeCertificateStore
//!                                  ├→ deploy / post hooks
//!                                  └→ AutomationConfigManager → sync (replay)
//! ```
//!
//! ## Core Components
//!
//! - **vault**: the [`vault::CertificateVault`] trait and its Key Vault, HashiCorp
//!   and in-memory implementations, plus identity resolution
//! - **convert**: PKCS#12 ⇄ PEM conversion, chain ordering, thumbprints
//! - **stores**: the [`stores::CertificateStore`] trait and its two implementations
//! - **flows**: one module per CLI verb
//! - **hooks**: deploy and post hook execution
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use certsync::flows::{open_store, DownloadConfig, DownloadFlow};
//! use certsync::hooks::PostHookAggregator;
//! use certsync::vault::{MemoryVault, CertificateVault};
//!
//! # async fn run() -> certsync::Result<()> {
//! let config = DownloadConfig {
//!     vault: "demo".into(),
//!     path: Some("/etc/ssl/certsync".into()),
//!     ..DownloadConfig::default()
//! };
//! let vault: Arc<dyn CertificateVault> = Arc::new(MemoryVault::new("demo"));
//! let store = open_store(&config)?;
//! let mut post_hooks = PostHookAggregator::new();
//! let outcome = DownloadFlow::new(config, vault, store).run(&mut post_hooks).await?;
//! assert!(outcome.success);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod convert;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod hooks;
pub mod observability;
pub mod stores;
pub mod utils;
pub mod vault;

// Re-export commonly used types and traits
pub use errors::{CertsyncError, FormatError, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
