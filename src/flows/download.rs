//! The download flow: vault → local store, with hooks and automation.
//!
//! Certificates are processed one at a time. Each ends in exactly one of
//! three states: skipped (an identical certificate is already present),
//! saved, or failed. A failure of one certificate never stops the others;
//! only missing names and credential failures abort the run.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::automation::{AutomationConfigManager, DownloadConfig};
use crate::convert::{self, CertificateChain, KeyStorageFlags};
use crate::domain::{CertificateIdentity, SyncResult, SyncStatus};
use crate::errors::{CertsyncError, Result};
use crate::hooks::{self, PostHookAggregator};
use crate::stores::{CertificateStore, FileCertificateStore, StoreLocation};
use crate::vault::{CertificateCatalog, CertificateVault, SecretString};

/// Results of one download run.
#[derive(Debug, Clone, Default)]
pub struct DownloadOutcome {
    pub results: Vec<SyncResult>,
    /// False if any certificate failed, or a deploy hook or automation save failed
    pub success: bool,
}

impl DownloadOutcome {
    pub fn count(&self, status: SyncStatus) -> usize {
        self.results.iter().filter(|result| result.status() == status).count()
    }
}

/// Build the store a download configuration targets.
///
/// Exactly one of `path` and `store` must be set, and `path` must be an
/// existing directory.
pub fn open_store(config: &DownloadConfig) -> Result<Box<dyn CertificateStore>> {
    match (&config.path, config.store) {
        (Some(path), None) => {
            if !path.is_dir() {
                return Err(CertsyncError::config(format!(
                    "Directory {} does not exist",
                    path.display()
                )));
            }
            let mut store = FileCertificateStore::new(path, config.file_types);
            if let Some(password) = &config.keystore_password {
                store = store.with_keystore_password(SecretString::new(password.clone()));
            }
            Ok(Box::new(store))
        }
        (None, Some(location)) => native_store(location),
        (Some(_), Some(_)) => Err(CertsyncError::config("Specify only one of --path or --store")),
        (None, None) => Err(CertsyncError::config("Must specify --path or --store")),
    }
}

#[cfg(windows)]
fn native_store(location: StoreLocation) -> Result<Box<dyn CertificateStore>> {
    use crate::stores::{NativeCertificateStore, WindowsSystemStore};
    Ok(Box::new(NativeCertificateStore::new(WindowsSystemStore::new(location))))
}

#[cfg(not(windows))]
fn native_store(location: StoreLocation) -> Result<Box<dyn CertificateStore>> {
    Err(CertsyncError::local_store(format!(
        "Certificate store {} is only supported on Windows",
        location
    )))
}

pub struct DownloadFlow {
    config: DownloadConfig,
    vault: Arc<dyn CertificateVault>,
    store: Box<dyn CertificateStore>,
    automation: Option<AutomationConfigManager>,
}

impl DownloadFlow {
    pub fn new(
        config: DownloadConfig,
        vault: Arc<dyn CertificateVault>,
        store: Box<dyn CertificateStore>,
    ) -> Self {
        Self { config, vault, store, automation: None }
    }

    /// Where automation snapshots go when `config.automate` is set.
    pub fn with_automation(mut self, manager: AutomationConfigManager) -> Self {
        self.automation = Some(manager);
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    fn key_flags(&self) -> KeyStorageFlags {
        KeyStorageFlags {
            exportable: self.config.path.is_some() || self.config.mark_exportable,
            machine_scoped: self.config.store == Some(StoreLocation::LocalMachine),
        }
    }

    /// Run the download. Saved certificates are registered with `post_hooks`
    /// under the configured post hook; the caller runs them.
    pub async fn run(&self, post_hooks: &mut PostHookAggregator) -> Result<DownloadOutcome> {
        let catalog = CertificateCatalog::load(self.vault.as_ref()).await?;
        let identities = catalog.find_by_names(self.config.names.as_deref())?;

        info!(vault = %self.vault.name(), count = identities.len(), "Processing certificates");

        let mut outcome = DownloadOutcome { results: Vec::with_capacity(identities.len()), success: true };

        for identity in &identities {
            info!(certificate = %identity.display_name(), "Processing certificate");
            debug!("{}", identity);

            let result = self.download_certificate(identity).await?;

            match result.status() {
                SyncStatus::Error => outcome.success = false,
                SyncStatus::Downloaded => {
                    if let Some(command) = &self.config.deploy_hook {
                        if let Err(e) = hooks::run_deploy_hook(command, &result).await {
                            error!(certificate = %identity.display_name(), error = %e, "Deploy hook failed");
                            outcome.success = false;
                        }
                    }
                    if let Some(command) = &self.config.post_hook {
                        post_hooks.add(command, result.clone());
                    }
                }
                SyncStatus::AlreadyExists => {}
            }

            if self.config.automate
                && result.status() != SyncStatus::Error
                && !self.save_automation(identity)
            {
                outcome.success = false;
            }

            outcome.results.push(result);
        }

        info!(
            downloaded = outcome.count(SyncStatus::Downloaded),
            already_exists = outcome.count(SyncStatus::AlreadyExists),
            errors = outcome.count(SyncStatus::Error),
            "Download complete"
        );
        Ok(outcome)
    }

    /// Fetch, compare and store one certificate. Only fatal errors are
    /// returned as `Err`; everything else becomes an `Error` result.
    async fn download_certificate(&self, identity: &CertificateIdentity) -> Result<SyncResult> {
        let chain = match self.fetch_chain(identity).await {
            Ok(chain) => chain,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(certificate = %identity.display_name(), error = %e, "Error downloading certificate from vault");
                return Ok(SyncResult::error(identity));
            }
        };

        if !self.config.force && self.store.exists(identity) {
            info!(
                certificate = %identity.display_name(),
                thumbprint = identity.thumbprint.as_deref().unwrap_or_default(),
                "Local certificate has identical thumbprint"
            );
            return Ok(SyncResult::already_exists(identity));
        }

        match self.store.save(identity, &chain) {
            Ok(result) => {
                info!(certificate = %identity.display_name(), "Certificate saved");
                Ok(result)
            }
            Err(e) => {
                error!(certificate = %identity.display_name(), error = %e, "Error saving certificate");
                Ok(SyncResult::error(identity))
            }
        }
    }

    async fn fetch_chain(&self, identity: &CertificateIdentity) -> Result<CertificateChain> {
        let secret = self.vault.get_secret(&identity.secret_name).await?;
        let chain = convert::decode_chain(
            secret.value.expose_secret(),
            secret.properties.content_type.as_deref(),
            self.key_flags(),
        )?;

        let thumbprint = chain.leaf().thumbprint();
        if !identity.has_thumbprint(&thumbprint) {
            warn!(
                certificate = %identity.display_name(),
                tagged = identity.thumbprint.as_deref().unwrap_or_default(),
                actual = %thumbprint,
                "Secret thumbprint tag does not match its certificate"
            );
        }
        Ok(chain)
    }

    fn save_automation(&self, identity: &CertificateIdentity) -> bool {
        let Some(manager) = &self.automation else {
            warn!(certificate = %identity.display_name(), "Automation requested without a config directory");
            return false;
        };
        match manager.save(&self.config, identity.display_name()) {
            Ok(_) => true,
            Err(e) => {
                error!(certificate = %identity.display_name(), error = %e, "Error saving automation config");
                false
            }
        }
    }
}
