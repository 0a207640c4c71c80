//! HashiCorp Vault KV v2 backend.
//!
//! Each certificate secret is one KV entry whose data holds the same fields a
//! Key Vault secret carries:
//!
//! ```json
//! { "value": "<base64 PKCS#12>", "contentType": "application/x-pkcs12",
//!   "tags": { "CertificateId": "/certificates/web", ... },
//!   "notBefore": "2026-01-01T00:00:00Z", "expiresOn": "2027-01-01T00:00:00Z" }
//! ```
//!
//! The vault name passed on the command line is the KV mount path.
//!
//! # Configuration
//!
//! - `VAULT_ADDR`: Vault server address
//! - `VAULT_TOKEN`: Authentication token
//! - `VAULT_NAMESPACE`: Optional namespace

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::kv2;

use super::client::{CertificateVault, SecretProperties, SecretWrite, VaultSecret};
use super::types::SecretString;
use crate::errors::{CertsyncError, Result};

/// Connection settings for a Vault server.
#[derive(Debug, Clone)]
pub struct HashiCorpConfig {
    pub address: String,
    pub token: Option<SecretString>,
    pub namespace: Option<String>,
    pub mount_path: String,
}

impl HashiCorpConfig {
    /// Reads `VAULT_ADDR`, `VAULT_TOKEN` and `VAULT_NAMESPACE`.
    pub fn from_env(mount_path: &str) -> Result<Self> {
        let address = std::env::var("VAULT_ADDR")
            .map_err(|_| CertsyncError::config("VAULT_ADDR environment variable not set"))?;
        let token = std::env::var("VAULT_TOKEN").ok().map(SecretString::new);
        if token.is_none() {
            return Err(CertsyncError::credential_unavailable("VAULT_TOKEN is not set"));
        }

        Ok(Self {
            address,
            token,
            namespace: std::env::var("VAULT_NAMESPACE").ok(),
            mount_path: mount_path.to_string(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KvCertificateEntry {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    not_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_on: Option<DateTime<Utc>>,
}

pub struct HashiCorpVaultClient {
    client: VaultClient,
    address: String,
    mount_path: String,
}

impl HashiCorpVaultClient {
    pub fn new(config: HashiCorpConfig) -> Result<Self> {
        if config.address.is_empty() {
            return Err(CertsyncError::config("Vault address cannot be empty"));
        }

        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder.address(&config.address);

        if let Some(ref token) = config.token {
            settings_builder.token(token.expose_secret());
        }

        if let Some(namespace) = config.namespace {
            settings_builder.namespace(Some(namespace));
        }

        let settings = settings_builder
            .build()
            .map_err(|e| CertsyncError::config(format!("Invalid Vault configuration: {}", e)))?;

        let client = VaultClient::new(settings)
            .map_err(|e| CertsyncError::remote(format!("Failed to create Vault client: {}", e)))?;

        Ok(Self { client, address: config.address, mount_path: config.mount_path })
    }

    pub fn from_env(mount_path: &str) -> Result<Self> {
        Self::new(HashiCorpConfig::from_env(mount_path)?)
    }

    fn locator(&self, key: &str, version: Option<u64>) -> String {
        match version {
            Some(v) => format!("{}/v1/{}/data/{}?version={}", self.address, self.mount_path, key, v),
            None => format!("{}/v1/{}/data/{}", self.address, self.mount_path, key),
        }
    }

    fn properties(&self, key: &str, version: Option<u64>, entry: &KvCertificateEntry) -> SecretProperties {
        SecretProperties {
            id: self.locator(key, version),
            name: key.to_string(),
            version: version.map(|v| v.to_string()),
            content_type: entry.content_type.clone(),
            enabled: Some(true),
            not_before: entry.not_before,
            expires_on: entry.expires_on,
            tags: entry.tags.clone(),
        }
    }

    async fn current_version(&self, key: &str) -> Option<u64> {
        kv2::read_metadata(&self.client, &self.mount_path, key)
            .await
            .ok()
            .map(|metadata| metadata.current_version)
    }
}

fn map_error(error: ClientError, key: &str) -> CertsyncError {
    match error {
        ClientError::APIError { code: 404, .. } => CertsyncError::not_found("Secret", key),
        ClientError::APIError { code: 401 | 403, errors } => CertsyncError::credential_unavailable(
            format!("Vault rejected the token: {}", errors.join("; ")),
        ),
        ClientError::APIError { code, errors } => CertsyncError::remote_status(code, errors.join("; ")),
        other => CertsyncError::remote(other.to_string()),
    }
}

#[async_trait]
impl CertificateVault for HashiCorpVaultClient {
    fn name(&self) -> &str {
        &self.mount_path
    }

    async fn list_secret_properties(&self) -> Result<Vec<SecretProperties>> {
        let keys = match kv2::list(&self.client, &self.mount_path, "").await {
            Ok(keys) => keys,
            // An empty mount answers the LIST with 404
            Err(ClientError::APIError { code: 404, .. }) => Vec::new(),
            Err(e) => return Err(map_error(e, &self.mount_path)),
        };

        let mut secrets = Vec::new();
        for key in keys.iter().filter(|key| !key.ends_with('/')) {
            match kv2::read::<KvCertificateEntry>(&self.client, &self.mount_path, key).await {
                Ok(entry) => {
                    let version = self.current_version(key).await;
                    secrets.push(self.properties(key, version, &entry));
                }
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "Skipping unreadable Vault entry");
                }
            }
        }

        Ok(secrets)
    }

    async fn get_secret(&self, name: &str) -> Result<VaultSecret> {
        let entry: KvCertificateEntry = kv2::read(&self.client, &self.mount_path, name)
            .await
            .map_err(|e| map_error(e, name))?;
        let version = self.current_version(name).await;

        Ok(VaultSecret {
            properties: self.properties(name, version, &entry),
            value: SecretString::new(entry.value),
        })
    }

    async fn set_secret(&self, secret: SecretWrite) -> Result<SecretProperties> {
        let entry = KvCertificateEntry {
            value: secret.value.expose_secret().to_string(),
            content_type: secret.content_type,
            tags: secret.tags,
            not_before: secret.not_before,
            expires_on: secret.expires_on,
        };

        let metadata = kv2::set(&self.client, &self.mount_path, &secret.name, &entry)
            .await
            .map_err(|e| map_error(e, &secret.name))?;

        tracing::info!(key = %secret.name, mount_path = %self.mount_path, "Stored secret in Vault");
        Ok(self.properties(&secret.name, Some(metadata.version), &entry))
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        kv2::delete_metadata(&self.client, &self.mount_path, name)
            .await
            .map_err(|e| map_error(e, name))?;

        tracing::info!(key = %name, mount_path = %self.mount_path, "Deleted secret from Vault");
        Ok(())
    }
}
