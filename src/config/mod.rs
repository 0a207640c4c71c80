//! # Configuration Management
//!
//! The application config lives in `<config_dir>/config.json` next to the
//! automation snapshots. It carries one thing: an `environment` map of vault
//! credentials, so that unattended `sync` runs (cron, systemd timers) see the
//! same `AZURE_*` / `VAULT_*` variables the operator had when setting up.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::write_file;

pub const CONFIG_FILE: &str = "config.json";

/// Environment variable prefixes captured into the config after a successful run.
pub const CAPTURED_ENV_PREFIXES: [&str; 2] = ["AZURE_", "VAULT_"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl AppConfig {
    pub fn config_path(config_dir: &Path) -> PathBuf {
        config_dir.join(CONFIG_FILE)
    }

    /// Load configuration from a specific path; a missing file is the default config.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save configuration to a specific path, owner-readable only.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize configuration")?;

        write_file(path, contents.as_bytes(), true)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Export the stored variables that are not already set. Returns how many were set.
    pub fn apply_environment(&self) -> usize {
        let mut applied = 0;
        for (key, value) in &self.environment {
            if std::env::var_os(key).is_none() {
                std::env::set_var(key, value);
                applied += 1;
            }
        }
        applied
    }

    /// Capture credential variables from the process environment.
    pub fn capture_environment(&mut self) -> bool {
        self.capture_from(std::env::vars())
    }

    /// Record every variable with a captured prefix. Returns whether anything changed.
    pub fn capture_from<I>(&mut self, vars: I) -> bool
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut changed = false;
        for (key, value) in vars {
            let upper = key.to_ascii_uppercase();
            if !CAPTURED_ENV_PREFIXES.iter().any(|prefix| upper.starts_with(prefix)) {
                continue;
            }
            if self.environment.get(&key) != Some(&value) {
                self.environment.insert(key, value);
                changed = true;
            }
        }
        changed
    }
}

/// `/etc/certsync` on Unix, `%ProgramData%\certsync\config` on Windows.
pub fn default_config_dir() -> PathBuf {
    #[cfg(windows)]
    {
        program_data().join("certsync").join("config")
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/etc/certsync")
    }
}

/// `/var/log/certsync` on Unix, `%ProgramData%\certsync\logs` on Windows.
pub fn default_log_dir() -> PathBuf {
    #[cfg(windows)]
    {
        program_data().join("certsync").join("logs")
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/var/log/certsync")
    }
}

#[cfg(windows)]
fn program_data() -> PathBuf {
    std::env::var_os("ProgramData")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(r"C:\ProgramData"))
}
