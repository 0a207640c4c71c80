//! Azure AD token acquisition for the Key Vault client.
//!
//! Three sources are supported, tried in this order by
//! [`DefaultCredential::from_env`]:
//!
//! 1. `AZURE_ACCESS_TOKEN`: a pre-issued bearer token
//! 2. `AZURE_TENANT_ID` + `AZURE_CLIENT_ID` + `AZURE_CLIENT_SECRET`: OAuth2
//!    client-credentials grant
//! 3. `AZURE_USE_MANAGED_IDENTITY=true`: the instance metadata service, with
//!    `AZURE_CLIENT_ID` selecting a user-assigned identity
//!
//! Every failure to obtain a token surfaces as
//! [`CertsyncError::CredentialUnavailable`], which aborts a batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::types::SecretString;
use crate::errors::{CertsyncError, Result};

pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";
const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN_SECS: i64 = 300;

/// A bearer token and its expiry.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: SecretString,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        self.expires_on - chrono::Duration::seconds(EXPIRY_MARGIN_SECS) > Utc::now()
    }
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scope: &str) -> Result<AccessToken>;
}

/// Fixed bearer token.
pub struct StaticTokenCredential {
    token: SecretString,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<SecretString>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _scope: &str) -> Result<AccessToken> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_on: DateTime::<Utc>::MAX_UTC,
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds; IMDS sends it as a string
    expires_in: serde_json::Value,
}

impl TokenResponse {
    fn into_access_token(self) -> AccessToken {
        let seconds = match &self.expires_in {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .unwrap_or(3600);
        AccessToken {
            token: SecretString::new(self.access_token),
            expires_on: Utc::now() + chrono::Duration::seconds(seconds),
        }
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
        CertsyncError::credential_unavailable(format!("Failed to build HTTP client: {}", e))
    })
}

async fn read_token_response(response: reqwest::Response, source: &str) -> Result<AccessToken> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CertsyncError::credential_unavailable(format!(
            "{} token request failed with status {}: {}",
            source,
            status.as_u16(),
            body
        )));
    }
    let parsed: TokenResponse = response.json().await.map_err(|e| {
        CertsyncError::credential_unavailable(format!("{} token response invalid: {}", source, e))
    })?;
    Ok(parsed.into_access_token())
}

/// OAuth2 client-credentials grant against Azure AD, cached until expiry.
pub struct ClientSecretCredential {
    tenant_id: String,
    client_id: String,
    client_secret: SecretString,
    authority: String,
    http: reqwest::Client,
    cache: Mutex<Option<AccessToken>>,
}

impl ClientSecretCredential {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<SecretString>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority: DEFAULT_AUTHORITY.to_string(),
            http: http_client(timeout)?,
            cache: Mutex::new(None),
        })
    }

    /// Override the login endpoint (sovereign clouds, tests).
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref().filter(|token| token.is_fresh()) {
            return Ok(token.clone());
        }

        let url = format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("scope", scope),
        ];

        debug!(tenant_id = %self.tenant_id, client_id = %self.client_id, "Requesting client credentials token");
        let response = self.http.post(&url).form(&form).send().await.map_err(|e| {
            CertsyncError::credential_unavailable(format!("Token request failed: {}", e))
        })?;

        let token = read_token_response(response, "Client secret").await?;
        *cache = Some(token.clone());
        Ok(token)
    }
}

/// Token from the Azure instance metadata service.
pub struct ManagedIdentityCredential {
    client_id: Option<String>,
    endpoint: String,
    http: reqwest::Client,
    cache: Mutex<Option<AccessToken>>,
}

impl ManagedIdentityCredential {
    pub fn new(client_id: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client_id,
            endpoint: DEFAULT_IMDS_ENDPOINT.to_string(),
            http: http_client(timeout)?,
            cache: Mutex::new(None),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref().filter(|token| token.is_fresh()) {
            return Ok(token.clone());
        }

        let resource = scope.trim_end_matches("/.default");
        let mut query = vec![("api-version", "2018-02-01"), ("resource", resource)];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let response = self
            .http
            .get(&self.endpoint)
            .header("Metadata", "true")
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                CertsyncError::credential_unavailable(format!(
                    "Managed identity endpoint unreachable: {}",
                    e
                ))
            })?;

        let token = read_token_response(response, "Managed identity").await?;
        *cache = Some(token.clone());
        Ok(token)
    }
}

/// Chooses a credential from the environment.
pub struct DefaultCredential;

impl DefaultCredential {
    pub fn from_env(timeout: Duration) -> Result<Arc<dyn TokenCredential>> {
        let var = |name: &str| std::env::var(name).ok().filter(|value| !value.trim().is_empty());

        if let Some(token) = var("AZURE_ACCESS_TOKEN") {
            debug!("Using static access token credential");
            return Ok(Arc::new(StaticTokenCredential::new(token)));
        }

        if let (Some(tenant_id), Some(client_id), Some(client_secret)) =
            (var("AZURE_TENANT_ID"), var("AZURE_CLIENT_ID"), var("AZURE_CLIENT_SECRET"))
        {
            debug!(tenant_id = %tenant_id, client_id = %client_id, "Using client secret credential");
            let mut credential =
                ClientSecretCredential::new(tenant_id, client_id, client_secret, timeout)?;
            if let Some(authority) = var("AZURE_AUTHORITY_HOST") {
                credential = credential.with_authority(authority);
            }
            return Ok(Arc::new(credential));
        }

        let use_managed_identity = var("AZURE_USE_MANAGED_IDENTITY")
            .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        if use_managed_identity {
            debug!("Using managed identity credential");
            return Ok(Arc::new(ManagedIdentityCredential::new(var("AZURE_CLIENT_ID"), timeout)?));
        }

        Err(CertsyncError::credential_unavailable(
            "No Azure credential configured; set AZURE_ACCESS_TOKEN, \
             AZURE_TENANT_ID/AZURE_CLIENT_ID/AZURE_CLIENT_SECRET or AZURE_USE_MANAGED_IDENTITY",
        ))
    }
}
