//! In-process vault.
//!
//! Backs the integration tests. Every write creates a new version; reads
//! return the latest. Failures can be injected per secret.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::client::{CertificateVault, SecretProperties, SecretWrite, VaultSecret};
use super::connector::{VaultBackend, VaultConnector};
use crate::errors::{CertsyncError, Result};

/// Failure to return from `get_secret` for one secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    Remote,
    Credential,
}

#[derive(Default)]
struct State {
    secrets: BTreeMap<String, VaultSecret>,
    failures: HashMap<String, InjectedFailure>,
    reads: usize,
    writes: usize,
}

#[derive(Default)]
pub struct MemoryVault {
    name: String,
    state: Mutex<State>,
}

impl MemoryVault {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), state: Mutex::new(State::default()) }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `get_secret(name)` fail until cleared.
    pub fn inject_failure(&self, name: &str, failure: InjectedFailure) {
        self.state().failures.insert(name.to_string(), failure);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Number of successful `get_secret` calls.
    pub fn read_count(&self) -> usize {
        self.state().reads
    }

    /// Number of `set_secret` calls.
    pub fn write_count(&self) -> usize {
        self.state().writes
    }

    pub fn secret_names(&self) -> Vec<String> {
        self.state().secrets.keys().cloned().collect()
    }
}

#[async_trait]
impl CertificateVault for MemoryVault {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_secret_properties(&self) -> Result<Vec<SecretProperties>> {
        Ok(self.state().secrets.values().map(|secret| secret.properties.clone()).collect())
    }

    async fn get_secret(&self, name: &str) -> Result<VaultSecret> {
        let mut state = self.state();
        match state.failures.get(name) {
            Some(InjectedFailure::Remote) => {
                return Err(CertsyncError::remote_status(500, format!("injected failure for {}", name)))
            }
            Some(InjectedFailure::Credential) => {
                return Err(CertsyncError::credential_unavailable("injected credential failure"))
            }
            None => {}
        }

        let secret =
            state.secrets.get(name).cloned().ok_or_else(|| CertsyncError::not_found("Secret", name))?;
        state.reads += 1;
        Ok(secret)
    }

    async fn set_secret(&self, secret: SecretWrite) -> Result<SecretProperties> {
        let version = Uuid::new_v4().simple().to_string();
        let properties = SecretProperties {
            id: format!("memory://{}/secrets/{}/{}", self.name, secret.name, version),
            name: secret.name.clone(),
            version: Some(version),
            content_type: secret.content_type,
            enabled: Some(true),
            not_before: secret.not_before.or_else(|| Some(Utc::now())),
            expires_on: secret.expires_on,
            tags: secret.tags,
        };

        let mut state = self.state();
        state.writes += 1;
        state.secrets.insert(
            secret.name,
            VaultSecret { properties: properties.clone(), value: secret.value },
        );
        Ok(properties)
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        self.state()
            .secrets
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CertsyncError::not_found("Secret", name))
    }
}

/// Connector handing out pre-registered [`MemoryVault`]s by backend and name.
///
/// Every connection request is recorded, including ones that fail.
#[derive(Default)]
pub struct MemoryConnector {
    vaults: Mutex<HashMap<(VaultBackend, String), Arc<MemoryVault>>>,
    connections: Mutex<Vec<(VaultBackend, String)>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `vault` under the default backend.
    pub fn register(&self, vault: Arc<MemoryVault>) {
        self.register_for(VaultBackend::default(), vault);
    }

    pub fn register_for(&self, backend: VaultBackend, vault: Arc<MemoryVault>) {
        self.vaults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((backend, vault.name().to_ascii_lowercase()), vault);
    }

    /// Backend and vault name of every `connect` call, in order.
    pub fn connections(&self) -> Vec<(VaultBackend, String)> {
        self.connections.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

#[async_trait]
impl VaultConnector for MemoryConnector {
    async fn connect(
        &self,
        backend: VaultBackend,
        vault_name: &str,
    ) -> Result<Arc<dyn CertificateVault>> {
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((backend, vault_name.to_string()));

        let vaults = self.vaults.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        vaults
            .get(&(backend, vault_name.to_ascii_lowercase()))
            .cloned()
            .map(|vault| vault as Arc<dyn CertificateVault>)
            .ok_or_else(|| CertsyncError::not_found("Vault", format!("{} ({})", vault_name, backend)))
    }
}
