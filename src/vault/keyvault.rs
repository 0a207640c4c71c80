//! Azure Key Vault secrets REST client.
//!
//! Talks to the data-plane API directly with `reqwest`:
//!
//! - `GET /secrets` (paged through `nextLink`)
//! - `GET /secrets/{name}`
//! - `PUT /secrets/{name}`
//! - `DELETE /secrets/{name}`
//!
//! Any non-2xx response becomes [`CertsyncError::RemoteRequestFailed`] with the
//! service's error message; a 404 on a named secret becomes
//! [`CertsyncError::NotFound`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::client::{CertificateVault, SecretProperties, SecretWrite, VaultSecret};
use super::credential::{TokenCredential, KEY_VAULT_SCOPE};
use super::types::SecretString;
use crate::errors::{CertsyncError, Result};

pub const API_VERSION: &str = "7.4";

#[derive(Debug, Default, Deserialize, Serialize)]
struct SecretAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nbf: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretItem {
    id: String,
    #[serde(default)]
    attributes: SecretAttributes,
    #[serde(default)]
    tags: Option<HashMap<String, String>>,
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretListPage {
    #[serde(default)]
    value: Vec<SecretItem>,
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretBundle {
    value: SecretString,
    id: String,
    content_type: Option<String>,
    #[serde(default)]
    attributes: SecretAttributes,
    #[serde(default)]
    tags: Option<HashMap<String, String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetSecretRequest<'a> {
    value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<&'a str>,
    attributes: SecretAttributes,
    tags: &'a HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Key Vault secrets client authenticated with an Azure AD credential.
pub struct KeyVaultClient {
    name: String,
    base_url: Url,
    http: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
}

impl KeyVaultClient {
    /// `vault` is either a bare vault name (`https://<vault>.vault.azure.net`)
    /// or a full URL.
    pub fn new(
        vault: &str,
        credential: Arc<dyn TokenCredential>,
        timeout: Duration,
    ) -> Result<Self> {
        let base = if vault.contains("://") {
            vault.trim_end_matches('/').to_string()
        } else {
            format!("https://{}.vault.azure.net", vault)
        };
        let base_url = Url::parse(&format!("{}/", base))
            .map_err(|e| CertsyncError::config(format!("Invalid vault URL '{}': {}", base, e)))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CertsyncError::remote(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { name: vault.to_string(), base_url, http, credential })
    }

    fn secret_url(&self, path: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| CertsyncError::config(format!("Invalid secret path '{}': {}", path, e)))?;
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let token = self.credential.get_token(KEY_VAULT_SCOPE).await?;
        let response = request
            .bearer_auth(token.token.expose_secret())
            .send()
            .await
            .map_err(|e| CertsyncError::remote(format!("Request to {} failed: {}", self.name, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|e| match (e.error.code, e.error.message) {
                (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
                (None, Some(message)) => Some(message),
                (Some(code), None) => Some(code),
                (None, None) => None,
            })
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

        Err(CertsyncError::remote_status(status.as_u16(), message))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| CertsyncError::remote(format!("Invalid response body: {}", e)))
    }
}

/// Splits `https://host/secrets/{name}[/{version}]`.
fn parse_secret_id(id: &str) -> (String, Option<String>) {
    let path = Url::parse(id).map(|url| url.path().to_string()).unwrap_or_else(|_| id.to_string());
    let mut segments = path.trim_matches('/').split('/').skip_while(|segment| *segment != "secrets");
    segments.next();
    let name = segments.next().unwrap_or_default().to_string();
    let version = segments.next().filter(|v| !v.is_empty()).map(str::to_string);
    (name, version)
}

fn timestamp(seconds: Option<i64>) -> Option<DateTime<Utc>> {
    seconds.and_then(|s| DateTime::from_timestamp(s, 0))
}

fn properties_from_parts(
    id: String,
    attributes: &SecretAttributes,
    tags: Option<HashMap<String, String>>,
    content_type: Option<String>,
) -> SecretProperties {
    let (name, version) = parse_secret_id(&id);
    SecretProperties {
        id,
        name,
        version,
        content_type,
        enabled: attributes.enabled,
        not_before: timestamp(attributes.nbf),
        expires_on: timestamp(attributes.exp),
        tags: tags.unwrap_or_default(),
    }
}

#[async_trait]
impl CertificateVault for KeyVaultClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_secret_properties(&self) -> Result<Vec<SecretProperties>> {
        let mut secrets = Vec::new();
        let mut next = Some(self.secret_url("secrets")?);

        while let Some(url) = next.take() {
            let response = self.send(self.http.get(url)).await?;
            let page: SecretListPage = Self::read_json(response).await?;

            secrets.extend(page.value.into_iter().map(|item| {
                properties_from_parts(item.id, &item.attributes, item.tags, item.content_type)
            }));

            next = match page.next_link.filter(|link| !link.is_empty()) {
                Some(link) => Some(Url::parse(&link).map_err(|e| {
                    CertsyncError::remote(format!("Invalid nextLink '{}': {}", link, e))
                })?),
                None => None,
            };
        }

        debug!(vault = %self.name, count = secrets.len(), "Listed Key Vault secrets");
        Ok(secrets)
    }

    async fn get_secret(&self, name: &str) -> Result<VaultSecret> {
        let url = self.secret_url(&format!("secrets/{}", name))?;
        let response = match self.send(self.http.get(url)).await {
            Err(CertsyncError::RemoteRequestFailed { status: Some(404), .. }) => {
                return Err(CertsyncError::not_found("Secret", name));
            }
            other => other?,
        };
        let bundle: SecretBundle = Self::read_json(response).await?;

        Ok(VaultSecret {
            properties: properties_from_parts(
                bundle.id,
                &bundle.attributes,
                bundle.tags,
                bundle.content_type,
            ),
            value: bundle.value,
        })
    }

    async fn set_secret(&self, secret: SecretWrite) -> Result<SecretProperties> {
        let url = self.secret_url(&format!("secrets/{}", secret.name))?;
        let body = SetSecretRequest {
            value: secret.value.expose_secret(),
            content_type: secret.content_type.as_deref(),
            attributes: SecretAttributes {
                enabled: Some(true),
                nbf: secret.not_before.map(|t| t.timestamp()),
                exp: secret.expires_on.map(|t| t.timestamp()),
            },
            tags: &secret.tags,
        };

        let response = self.send(self.http.put(url).json(&body)).await?;
        let bundle: SecretBundle = Self::read_json(response).await?;

        info!(vault = %self.name, secret = %secret.name, "Stored secret in Key Vault");
        Ok(properties_from_parts(bundle.id, &bundle.attributes, bundle.tags, bundle.content_type))
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        let url = self.secret_url(&format!("secrets/{}", name))?;
        match self.send(self.http.delete(url)).await {
            Err(CertsyncError::RemoteRequestFailed { status: Some(404), .. }) => {
                Err(CertsyncError::not_found("Secret", name))
            }
            Err(e) => Err(e),
            Ok(_) => {
                info!(vault = %self.name, secret = %name, "Deleted secret from Key Vault");
                Ok(())
            }
        }
    }
}
