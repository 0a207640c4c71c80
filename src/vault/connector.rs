//! Builds vault clients by backend and name.
//!
//! Replay runs every persisted configuration against the vault and backend it
//! names, so clients are created through a [`VaultConnector`] rather than once
//! up front.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::CertificateVault;
use super::credential::DefaultCredential;
use super::keyvault::KeyVaultClient;
use crate::errors::Result;

/// Which vault service a vault name refers to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum VaultBackend {
    /// Azure Key Vault
    #[default]
    Keyvault,
    /// HashiCorp Vault KV v2 (the vault name is the mount path)
    Hashicorp,
}

impl fmt::Display for VaultBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultBackend::Keyvault => f.write_str("keyvault"),
            VaultBackend::Hashicorp => f.write_str("hashicorp"),
        }
    }
}

#[async_trait]
pub trait VaultConnector: Send + Sync {
    async fn connect(
        &self,
        backend: VaultBackend,
        vault_name: &str,
    ) -> Result<Arc<dyn CertificateVault>>;
}

/// Connector whose credentials come from the process environment.
#[derive(Debug, Clone)]
pub struct EnvVaultConnector {
    timeout: Duration,
}

impl EnvVaultConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl VaultConnector for EnvVaultConnector {
    async fn connect(
        &self,
        backend: VaultBackend,
        vault_name: &str,
    ) -> Result<Arc<dyn CertificateVault>> {
        tracing::debug!(vault = %vault_name, backend = %backend, "Connecting to vault");
        match backend {
            VaultBackend::Keyvault => {
                let credential = DefaultCredential::from_env(self.timeout)?;
                Ok(Arc::new(KeyVaultClient::new(vault_name, credential, self.timeout)?))
            }
            #[cfg(feature = "hashicorp")]
            VaultBackend::Hashicorp => {
                Ok(Arc::new(super::hashicorp::HashiCorpVaultClient::from_env(vault_name)?))
            }
            #[cfg(not(feature = "hashicorp"))]
            VaultBackend::Hashicorp => Err(crate::errors::CertsyncError::config(
                "HashiCorp Vault support was not compiled in (enable the `hashicorp` feature)",
            )),
        }
    }
}
