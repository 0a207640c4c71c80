//! # Vault Access
//!
//! Everything that talks to the remote secret store:
//!
//! - [`CertificateVault`]: list/get/set/delete secrets
//! - [`KeyVaultClient`]: Azure Key Vault REST (default backend)
//! - `HashiCorpVaultClient`: HashiCorp Vault KV v2 (`hashicorp` feature)
//! - [`MemoryVault`]: in-process vault for tests
//! - [`CertificateCatalog`]: certificate identities derived from secret metadata
//! - [`VaultConnector`]: builds a client from a vault name

pub mod catalog;
pub mod client;
pub mod connector;
pub mod credential;
#[cfg(feature = "hashicorp")]
pub mod hashicorp;
pub mod keyvault;
pub mod memory;
pub mod types;

pub use catalog::{parse_name_filter, CertificateCatalog};
pub use client::{CertificateVault, SecretProperties, SecretWrite, VaultSecret};
pub use connector::{EnvVaultConnector, VaultBackend, VaultConnector};
pub use credential::{DefaultCredential, TokenCredential};
#[cfg(feature = "hashicorp")]
pub use hashicorp::{HashiCorpConfig, HashiCorpVaultClient};
pub use keyvault::KeyVaultClient;
pub use memory::{InjectedFailure, MemoryConnector, MemoryVault};
pub use types::SecretString;
