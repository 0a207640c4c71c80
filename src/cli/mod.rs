//! # Command Line Interface
//!
//! `certsync <verb>`: `list`, `download`, `upload`, `delete` and `sync`.
//! Exit status is 0 only when the verb and every hook it triggered succeeded.

pub mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, error, info, warn};

use crate::config::{self, AppConfig};
use crate::domain::FileTypeSet;
use crate::errors::CertsyncError;
use crate::flows::{
    self, AutomationConfigManager, DownloadConfig, DownloadFlow, UploadConfig, UploadFlow,
};
use crate::hooks::PostHookAggregator;
use crate::observability::{init_logging, LoggingConfig};
use crate::stores::StoreLocation;
use crate::vault::{EnvVaultConnector, VaultBackend, VaultConnector};

use output::OutputFormat;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "certsync")]
#[command(about = "Synchronize TLS certificates between a secret vault and local stores")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Only print warnings and errors to the console
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding config.json and automation configs
    #[arg(long, global = true, env = "CERTSYNC_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Directory for log files
    #[arg(long, global = true, env = "CERTSYNC_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Vault service the vault name refers to
    #[arg(long, global = true, value_enum, default_value_t = VaultBackend::Keyvault)]
    pub backend: VaultBackend,

    /// Vault request timeout in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List certificates in the vault
    List {
        #[command(flatten)]
        vault: VaultArgs,

        /// Name of certificate. Specify multiple by delimiting with commas.
        #[arg(short, long)]
        name: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Download certificates from the vault
    Download(DownloadArgs),

    /// Upload a PEM certificate to the vault
    Upload {
        #[command(flatten)]
        vault: VaultArgs,

        /// Name of certificate
        #[arg(short, long)]
        name: String,

        /// Path to certificate in PEM format
        #[arg(short, long)]
        cert: PathBuf,

        /// Path to private key in PEM format (PKCS#8)
        #[arg(short, long)]
        key: PathBuf,

        /// Path to CA chain in PEM format
        #[arg(long)]
        chain: Option<PathBuf>,

        /// Upload even when an identical vault certificate exists
        #[arg(short, long)]
        force: bool,
    },

    /// Delete a certificate from the vault
    Delete {
        #[command(flatten)]
        vault: VaultArgs,

        /// Name of certificate
        #[arg(short, long)]
        name: String,
    },

    /// Re-run every saved automation config
    Sync {
        /// Download even when an identical certificate exists
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct VaultArgs {
    /// Vault name (Key Vault name or URL, or HashiCorp KV mount)
    #[arg(short = 'v', long = "vault", alias = "keyvault")]
    pub vault: String,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub vault: VaultArgs,

    /// Name of certificate. Specify multiple by delimiting with commas.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Base directory to store certificates
    #[arg(short, long, conflicts_with = "store", required_unless_present = "store")]
    pub path: Option<PathBuf>,

    /// Windows certificate store
    #[arg(short, long, value_enum)]
    pub store: Option<StoreLocation>,

    /// Files to write, comma separated
    #[arg(short = 't', long, default_value_t = FileTypeSet::DEFAULT)]
    pub file_types: FileTypeSet,

    /// Password for keystore.pfx
    #[arg(long, env = "CERTSYNC_KEYSTORE_PASSWORD", hide_env_values = true)]
    pub keystore_password: Option<String>,

    /// Download even when an identical local certificate exists
    #[arg(short, long)]
    pub force: bool,

    /// Mark Windows certificate keys as exportable
    #[arg(long)]
    pub mark_exportable: bool,

    /// Run for each certificate written
    #[arg(long)]
    pub deploy_hook: Option<String>,

    /// Run once after all certificates are processed, if any were written
    #[arg(long)]
    pub post_hook: Option<String>,

    /// Save this configuration for `sync`
    #[arg(short, long)]
    pub automate: bool,
}

impl DownloadArgs {
    pub fn into_config(self, backend: VaultBackend, quiet: bool) -> DownloadConfig {
        DownloadConfig {
            vault: self.vault.vault,
            backend,
            names: self.name,
            path: self.path,
            store: self.store,
            file_types: self.file_types,
            keystore_password: self.keystore_password,
            mark_exportable: self.mark_exportable,
            deploy_hook: self.deploy_hook,
            post_hook: self.post_hook,
            force: self.force,
            quiet,
            automate: self.automate,
        }
    }
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<ExitCode> {
    // Load .env before parsing so it can supply CERTSYNC_* arguments
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();

    let _guard = init_logging(&LoggingConfig {
        debug: cli.debug,
        quiet: cli.quiet,
        log_dir: Some(cli.log_dir.clone().unwrap_or_else(config::default_log_dir)),
    });

    info!(app = crate::APP_NAME, version = crate::VERSION, backend = %cli.backend, "Starting certsync");

    let config_dir = resolve_config_dir(cli.config_dir.clone());
    let config_path = AppConfig::config_path(&config_dir);
    let mut app_config = match AppConfig::load_from_path(&config_path) {
        Ok(app_config) => app_config,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Error loading config, using defaults");
            AppConfig::default()
        }
    };
    let applied = app_config.apply_environment();
    debug!(applied, path = %config_path.display(), "Applied config environment");

    let connector = EnvVaultConnector::new(Duration::from_secs(cli.timeout.max(1)));
    let mut post_hooks = PostHookAggregator::new();

    let context = CliContext { backend: cli.backend, quiet: cli.quiet, config_dir };
    let mut success = match execute(cli.command, &context, &connector, &mut post_hooks).await {
        Ok(success) => success,
        Err(e) => {
            error!(error = %e, "Command failed");
            false
        }
    };

    if !post_hooks.is_empty() && !post_hooks.run_all().await {
        success = false;
    }

    if success && app_config.capture_environment() {
        if let Err(e) = app_config.save_to_path(&config_path) {
            warn!(error = %format!("{:#}", e), "Error saving config");
        }
    }

    Ok(if success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Options every verb sees.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub backend: VaultBackend,
    pub quiet: bool,
    pub config_dir: PathBuf,
}

/// Run one verb. `Ok(false)` means the verb ran but something in it failed.
pub async fn execute(
    command: Commands,
    context: &CliContext,
    connector: &dyn VaultConnector,
    post_hooks: &mut PostHookAggregator,
) -> crate::errors::Result<bool> {
    match command {
        Commands::List { vault, name, output } => {
            let client = connector.connect(context.backend, &vault.vault).await?;
            let identities = flows::list_certificates(client, name.as_deref()).await?;
            output::print_identities(&identities, output)
                .map_err(|e| CertsyncError::config(format!("{:#}", e)))?;
            Ok(true)
        }
        Commands::Download(args) => {
            let config = args.into_config(context.backend, context.quiet);
            let store = flows::open_store(&config)?;
            let client = connector.connect(config.backend, &config.vault).await?;
            let flow = DownloadFlow::new(config, client, store)
                .with_automation(AutomationConfigManager::new(&context.config_dir));
            let outcome = flow.run(post_hooks).await?;
            Ok(outcome.success)
        }
        Commands::Upload { vault, name, cert, key, chain, force } => {
            let client = connector.connect(context.backend, &vault.vault).await?;
            let config = UploadConfig { name, certificate: cert, private_key: key, chain, force };
            UploadFlow::new(config, client).run().await?;
            Ok(true)
        }
        Commands::Delete { vault, name } => {
            let client = connector.connect(context.backend, &vault.vault).await?;
            flows::delete_certificate(client, &name).await?;
            Ok(true)
        }
        Commands::Sync { force } => {
            Ok(flows::replay_all(&context.config_dir, force, connector, post_hooks).await)
        }
    }
}

/// The configured directory, or the platform default. Falls back to the
/// working directory when the default cannot be created.
fn resolve_config_dir(configured: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = configured {
        return dir;
    }
    let dir = config::default_config_dir();
    match std::fs::create_dir_all(&dir) {
        Ok(()) => dir,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Error creating config directory, using working directory");
            PathBuf::from(".")
        }
    }
}
