use clap::Parser;

use certsync::cli::{execute, Cli, CliContext};
use certsync::hooks::PostHookAggregator;
use certsync::vault::{MemoryConnector, VaultBackend};

use super::support::{file_names, seeded_vault};

fn context(config_dir: &std::path::Path) -> CliContext {
    CliContext { backend: VaultBackend::Keyvault, quiet: true, config_dir: config_dir.to_path_buf() }
}

#[tokio::test]
async fn test_download_with_automate_then_sync() -> anyhow::Result<()> {
    let (vault, _) = seeded_vault(&["web"]).await?;
    let connector = MemoryConnector::new();
    connector.register(vault.clone());
    let out = tempfile::tempdir()?;
    let config_dir = tempfile::tempdir()?;
    let out_arg = out.path().display().to_string();

    let cli = Cli::try_parse_from([
        "certsync",
        "download",
        "--vault",
        "demo",
        "--path",
        out_arg.as_str(),
        "-t",
        "Cert,FullChain",
        "--automate",
    ])?;
    let mut post_hooks = PostHookAggregator::new();
    assert!(execute(cli.command, &context(config_dir.path()), &connector, &mut post_hooks).await?);
    assert_eq!(file_names(&out.path().join("web"))?, vec!["cert.pem", "fullchain.pem"]);
    assert_eq!(file_names(config_dir.path())?, vec!["download_web.json"]);

    std::fs::remove_dir_all(out.path().join("web"))?;

    let cli = Cli::try_parse_from(["certsync", "sync"])?;
    assert!(execute(cli.command, &context(config_dir.path()), &connector, &mut post_hooks).await?);
    assert_eq!(file_names(&out.path().join("web"))?, vec!["cert.pem", "fullchain.pem"]);
    Ok(())
}

#[tokio::test]
async fn test_download_to_missing_directory_fails_before_connecting() -> anyhow::Result<()> {
    let connector = MemoryConnector::new();
    let config_dir = tempfile::tempdir()?;
    let missing = config_dir.path().join("missing").display().to_string();

    let cli =
        Cli::try_parse_from(["certsync", "download", "-v", "nowhere", "-p", missing.as_str()])?;
    let mut post_hooks = PostHookAggregator::new();
    let err = execute(cli.command, &context(config_dir.path()), &connector, &mut post_hooks)
        .await
        .unwrap_err();

    assert!(matches!(err, certsync::CertsyncError::Config { .. }));
    Ok(())
}

#[tokio::test]
async fn test_delete_and_unknown_vault() -> anyhow::Result<()> {
    let (vault, _) = seeded_vault(&["web"]).await?;
    let connector = MemoryConnector::new();
    connector.register(vault.clone());
    let config_dir = tempfile::tempdir()?;

    let mut post_hooks = PostHookAggregator::new();

    let cli = Cli::try_parse_from(["certsync", "delete", "--keyvault", "DEMO", "-n", "web"])?;
    assert!(execute(cli.command, &context(config_dir.path()), &connector, &mut post_hooks).await?);
    assert!(vault.secret_names().is_empty());

    let cli = Cli::try_parse_from(["certsync", "delete", "-v", "other", "-n", "web"])?;
    let result = execute(cli.command, &context(config_dir.path()), &connector, &mut post_hooks).await;
    assert!(matches!(result, Err(certsync::CertsyncError::NotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn test_sync_replays_with_the_backend_used_at_download() -> anyhow::Result<()> {
    let (vault, _) = seeded_vault(&["web"]).await?;
    let connector = MemoryConnector::new();
    connector.register_for(VaultBackend::Hashicorp, vault);
    let out = tempfile::tempdir()?;
    let config_dir = tempfile::tempdir()?;
    let out_arg = out.path().display().to_string();
    let hashicorp = CliContext { backend: VaultBackend::Hashicorp, ..context(config_dir.path()) };

    let cli = Cli::try_parse_from([
        "certsync",
        "--backend",
        "hashicorp",
        "download",
        "-v",
        "demo",
        "-p",
        out_arg.as_str(),
        "--automate",
    ])?;
    assert_eq!(cli.backend, VaultBackend::Hashicorp);
    let mut post_hooks = PostHookAggregator::new();
    assert!(execute(cli.command, &hashicorp, &connector, &mut post_hooks).await?);

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(config_dir.path().join("download_web.json"))?)?;
    assert_eq!(saved["backend"], "hashicorp");

    std::fs::remove_dir_all(out.path().join("web"))?;

    // A plain `sync` runs with the default backend in its context.
    let cli = Cli::try_parse_from(["certsync", "sync"])?;
    assert!(execute(cli.command, &context(config_dir.path()), &connector, &mut post_hooks).await?);
    assert!(out.path().join("web").join("cert.pem").is_file());
    assert!(connector
        .connections()
        .iter()
        .all(|(backend, _)| *backend == VaultBackend::Hashicorp));
    Ok(())
}
