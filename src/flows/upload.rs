//! Upload a local PEM certificate into the vault.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::convert::{self, PKCS12_CONTENT_TYPE};
use crate::domain::{CERTIFICATE_ID_TAG, CERTIFICATE_STATE_TAG, SERIAL_NUMBER_TAG, THUMBPRINT_TAG};
use crate::errors::{CertsyncError, Result};
use crate::vault::{CertificateCatalog, CertificateVault, SecretString, SecretWrite};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadConfig {
    pub name: String,
    pub certificate: PathBuf,
    pub private_key: PathBuf,
    pub chain: Option<PathBuf>,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The vault already holds a certificate with the same thumbprint
    Unchanged { secret_name: String },
    Uploaded { secret_name: String, thumbprint: String },
}

pub struct UploadFlow {
    config: UploadConfig,
    vault: Arc<dyn CertificateVault>,
}

impl UploadFlow {
    pub fn new(config: UploadConfig, vault: Arc<dyn CertificateVault>) -> Self {
        Self { config, vault }
    }

    pub async fn run(&self) -> Result<UploadOutcome> {
        let name = self.config.name.as_str();
        if name.trim().is_empty() {
            return Err(CertsyncError::config("Certificate name is required"));
        }

        let chain = convert::load_pem_chain(
            &self.config.certificate,
            &self.config.private_key,
            self.config.chain.as_deref(),
        )?;
        let leaf = chain.leaf();
        let thumbprint = leaf.thumbprint();
        let info = leaf.info()?;

        let catalog = CertificateCatalog::load(self.vault.as_ref()).await?;
        let secret_name = match catalog.find_by_name(name) {
            Some(existing) => {
                if existing.has_thumbprint(&thumbprint) {
                    if !self.config.force {
                        info!(certificate = %name, thumbprint = %thumbprint, "Vault certificate has identical thumbprint");
                        return Ok(UploadOutcome::Unchanged { secret_name: existing.secret_name.clone() });
                    }
                    info!(certificate = %name, "Force replacing vault certificate");
                } else {
                    debug!(certificate = %name, secret = %existing.secret_name, "Updating vault certificate");
                }
                existing.secret_name.clone()
            }
            None => {
                debug!(certificate = %name, "Creating vault certificate");
                format!("{}-{}", name, Uuid::new_v4())
            }
        };

        let value = convert::encode_chain_base64(&chain)?;
        let tags = HashMap::from([
            (CERTIFICATE_ID_TAG.to_string(), format!("/certificates/{}", name)),
            (CERTIFICATE_STATE_TAG.to_string(), "Ready".to_string()),
            (SERIAL_NUMBER_TAG.to_string(), info.serial_number.clone()),
            (THUMBPRINT_TAG.to_string(), thumbprint.clone()),
        ]);

        self.vault
            .set_secret(SecretWrite {
                name: secret_name.clone(),
                value: SecretString::new(value),
                content_type: Some(PKCS12_CONTENT_TYPE.to_string()),
                not_before: Some(info.not_before),
                expires_on: Some(info.not_after),
                tags,
            })
            .await?;

        info!(certificate = %name, secret = %secret_name, thumbprint = %thumbprint, "Uploaded certificate");
        Ok(UploadOutcome::Uploaded { secret_name, thumbprint })
    }
}
