//! Download configuration and its persisted per-certificate snapshot.
//!
//! [`DownloadConfig`] is what one `download` invocation runs with.
//! [`PersistedDownloadConfig`] is the subset written to
//! `<config_dir>/download_<name>.json` when automation is enabled, pinned to a
//! single certificate; `sync` later replays those files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::FileTypeSet;
use crate::errors::{CertsyncError, Result};
use crate::stores::StoreLocation;
use crate::utils::write_file;
use crate::vault::VaultBackend;

pub const AUTOMATION_FILE_PREFIX: &str = "download_";
pub const AUTOMATION_FILE_SUFFIX: &str = ".json";

/// Runtime configuration of a download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadConfig {
    pub vault: String,
    pub backend: VaultBackend,
    /// Comma-separated certificate names; `None` means all certificates
    pub names: Option<String>,
    pub path: Option<PathBuf>,
    pub store: Option<StoreLocation>,
    pub file_types: FileTypeSet,
    pub keystore_password: Option<String>,
    pub mark_exportable: bool,
    pub deploy_hook: Option<String>,
    pub post_hook: Option<String>,
    pub force: bool,
    pub quiet: bool,
    pub automate: bool,
}

impl DownloadConfig {
    /// Snapshot pinned to `certificate_name`, without session-only flags.
    pub fn to_persisted(&self, certificate_name: &str) -> PersistedDownloadConfig {
        PersistedDownloadConfig {
            vault: self.vault.clone(),
            backend: self.backend,
            name: certificate_name.to_string(),
            path: self.path.clone(),
            store: self.store,
            file_types: self.file_types,
            keystore_password: self.keystore_password.clone(),
            mark_exportable: self.mark_exportable,
            deploy_hook: self.deploy_hook.clone(),
            post_hook: self.post_hook.clone(),
        }
    }
}

/// The persisted form of a [`DownloadConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedDownloadConfig {
    pub vault: String,
    #[serde(default)]
    pub backend: VaultBackend,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreLocation>,
    #[serde(default)]
    pub file_types: FileTypeSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystore_password: Option<String>,
    #[serde(default)]
    pub mark_exportable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_hook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_hook: Option<String>,
}

impl PersistedDownloadConfig {
    /// Runtime configuration for a replay. Replays never re-persist.
    pub fn into_runtime(self, force: bool) -> DownloadConfig {
        DownloadConfig {
            vault: self.vault,
            backend: self.backend,
            names: Some(self.name),
            path: self.path,
            store: self.store,
            file_types: self.file_types,
            keystore_password: self.keystore_password,
            mark_exportable: self.mark_exportable,
            deploy_hook: self.deploy_hook,
            post_hook: self.post_hook,
            force,
            quiet: false,
            automate: false,
        }
    }
}

/// Reads and writes persisted download configurations in one directory.
#[derive(Debug, Clone)]
pub struct AutomationConfigManager {
    config_dir: PathBuf,
}

impl AutomationConfigManager {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self { config_dir: config_dir.into() }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn file_path(&self, certificate_name: &str) -> PathBuf {
        self.config_dir.join(format!(
            "{}{}{}",
            AUTOMATION_FILE_PREFIX,
            certificate_name.to_lowercase(),
            AUTOMATION_FILE_SUFFIX
        ))
    }

    /// Persist `config` pinned to `certificate_name`.
    pub fn save(&self, config: &DownloadConfig, certificate_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| CertsyncError::io_path("create", &self.config_dir, e))?;

        let persisted = config.to_persisted(certificate_name);
        let json = serde_json::to_string_pretty(&persisted)
            .map_err(|e| CertsyncError::serialization("automation config", e))?;

        let path = self.file_path(certificate_name);
        write_file(&path, json.as_bytes(), true)?;
        info!(certificate = %certificate_name, path = %path.display(), "Saved automation config");
        Ok(path)
    }

    /// Persisted configuration files, sorted by file name.
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.config_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.config_dir.display(), "Config directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(CertsyncError::io_path("read", &self.config_dir, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CertsyncError::io_path("read", &self.config_dir, e))?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(AUTOMATION_FILE_PREFIX)
                && file_name.ends_with(AUTOMATION_FILE_SUFFIX)
                && entry.path().is_file()
            {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn load(&self, path: &Path) -> Result<PersistedDownloadConfig> {
        let contents = fs::read_to_string(path).map_err(|e| CertsyncError::io_path("read", path, e))?;
        serde_json::from_str(&contents)
            .map_err(|e| CertsyncError::serialization(format!("automation config {}", path.display()), e))
    }
}
