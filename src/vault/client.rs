//! Vault client trait and the secret shapes it exchanges.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::SecretString;
use crate::errors::Result;

/// Metadata of one secret, without its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretProperties {
    /// Backend locator of the current version
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    pub content_type: Option<String>,
    pub enabled: Option<bool>,
    pub not_before: Option<DateTime<Utc>>,
    pub expires_on: Option<DateTime<Utc>>,
    pub tags: HashMap<String, String>,
}

impl SecretProperties {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            version: None,
            content_type: None,
            enabled: Some(true),
            not_before: None,
            expires_on: None,
            tags: HashMap::new(),
        }
    }
}

/// A secret's current value plus its properties.
#[derive(Debug, Clone)]
pub struct VaultSecret {
    pub properties: SecretProperties,
    pub value: SecretString,
}

/// A new secret version to write.
#[derive(Debug, Clone)]
pub struct SecretWrite {
    pub name: String,
    pub value: SecretString,
    pub content_type: Option<String>,
    pub not_before: Option<DateTime<Utc>>,
    pub expires_on: Option<DateTime<Utc>>,
    pub tags: HashMap<String, String>,
}

/// Narrow view of a secret vault used by the sync engine.
///
/// Implementations MUST NOT log secret values.
#[async_trait]
pub trait CertificateVault: Send + Sync {
    /// Vault name or address, for log fields.
    fn name(&self) -> &str;

    /// Properties of every secret, following pagination to the end.
    async fn list_secret_properties(&self) -> Result<Vec<SecretProperties>>;

    /// Current version of a secret.
    ///
    /// # Errors
    ///
    /// - [`CertsyncError::NotFound`](crate::errors::CertsyncError::NotFound) if absent
    /// - [`CertsyncError::RemoteRequestFailed`](crate::errors::CertsyncError::RemoteRequestFailed) on transport failure
    /// - [`CertsyncError::CredentialUnavailable`](crate::errors::CertsyncError::CredentialUnavailable) if no token can be acquired
    async fn get_secret(&self, name: &str) -> Result<VaultSecret>;

    /// Write a new version, creating the secret if needed.
    async fn set_secret(&self, secret: SecretWrite) -> Result<SecretProperties>;

    async fn delete_secret(&self, name: &str) -> Result<()>;
}
