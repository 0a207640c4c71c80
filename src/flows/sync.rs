//! Unattended replay of persisted download configurations.

use std::path::Path;

use tracing::{error, info};

use super::automation::AutomationConfigManager;
use super::download::{open_store, DownloadFlow};
use crate::hooks::PostHookAggregator;
use crate::vault::VaultConnector;

/// Replay every `download_*.json` in `config_dir`.
///
/// Files are processed in name order, each against the vault and backend it
/// was saved with. A file that cannot be read or parsed,
/// or whose download fails, marks the replay failed without stopping the
/// remaining files. Returns whether everything succeeded.
pub async fn replay_all(
    config_dir: &Path,
    global_force: bool,
    connector: &dyn VaultConnector,
    post_hooks: &mut PostHookAggregator,
) -> bool {
    let manager = AutomationConfigManager::new(config_dir);
    let files = match manager.list_files() {
        Ok(files) => files,
        Err(e) => {
            error!(path = %config_dir.display(), error = %e, "Error enumerating config files");
            return false;
        }
    };

    info!(path = %config_dir.display(), count = files.len(), "Replaying automation configs");

    let mut success = true;
    for file in files {
        let persisted = match manager.load(&file) {
            Ok(persisted) => persisted,
            Err(e) => {
                error!(file = %file.display(), error = %e, "Error loading config");
                success = false;
                continue;
            }
        };

        let config = persisted.into_runtime(global_force);
        info!(
            file = %file.display(),
            vault = %config.vault,
            backend = %config.backend,
            certificate = config.names.as_deref().unwrap_or_default(),
            "Replaying download"
        );

        let vault = match connector.connect(config.backend, &config.vault).await {
            Ok(vault) => vault,
            Err(e) => {
                error!(file = %file.display(), vault = %config.vault, error = %e, "Error connecting to vault");
                success = false;
                continue;
            }
        };
        let store = match open_store(&config) {
            Ok(store) => store,
            Err(e) => {
                error!(file = %file.display(), error = %e, "Error opening certificate store");
                success = false;
                continue;
            }
        };

        match DownloadFlow::new(config, vault, store).run(post_hooks).await {
            Ok(outcome) if outcome.success => {}
            Ok(_) => success = false,
            Err(e) => {
                error!(file = %file.display(), error = %e, "Replay failed");
                success = false;
            }
        }
    }

    success
}
