use std::fs;
use std::sync::Arc;

use certsync::convert::{certificate_pem, pkcs12::decode_pkcs12, Certificate, KeyStorageFlags};
use certsync::domain::{FileType, FileTypeSet, SyncStatus};
use certsync::flows::{open_store, AutomationConfigManager, DownloadConfig, DownloadFlow};
use certsync::hooks::PostHookAggregator;
use certsync::vault::{CertificateVault, InjectedFailure};
use certsync::CertsyncError;

use super::support::{file_config, file_names, seeded_vault, TestChain};

async fn run(
    config: DownloadConfig,
    vault: Arc<dyn CertificateVault>,
    post_hooks: &mut PostHookAggregator,
) -> certsync::Result<certsync::flows::DownloadOutcome> {
    let store = open_store(&config)?;
    DownloadFlow::new(config, vault, store).run(post_hooks).await
}

#[tokio::test]
async fn test_download_writes_every_default_artifact() -> anyhow::Result<()> {
    let (vault, chains) = seeded_vault(&["web"]).await?;
    let dir = tempfile::tempdir()?;

    let outcome =
        run(file_config(&dir, None, FileTypeSet::DEFAULT), vault, &mut PostHookAggregator::new())
            .await?;

    assert!(outcome.success);
    assert_eq!(outcome.count(SyncStatus::Downloaded), 1);
    assert_eq!(outcome.results[0].path(), Some(dir.path().join("web").as_path()));

    let cert_dir = dir.path().join("web");
    assert_eq!(
        file_names(&cert_dir)?,
        vec!["cert.pem", "chain.pem", "fullchain.pem", "fullchain.privkey.pem", "privkey.pem"]
    );

    let cert = fs::read_to_string(cert_dir.join("cert.pem"))?;
    assert_eq!(cert.matches("BEGIN CERTIFICATE").count(), 1);
    let fullchain = fs::read_to_string(cert_dir.join("fullchain.pem"))?;
    assert_eq!(fullchain.matches("BEGIN CERTIFICATE").count(), 3);
    assert!(fullchain.starts_with(cert.trim_end()));
    let key = fs::read_to_string(cert_dir.join("privkey.pem"))?;
    assert!(key.contains("BEGIN PRIVATE KEY"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(cert_dir.join("privkey.pem"))?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let expected = chains[0].thumbprint();
    assert_eq!(outcome.results[0].thumbprint(), Some(expected.as_str()));
    Ok(())
}

#[tokio::test]
async fn test_second_run_skips_identical_certificate() -> anyhow::Result<()> {
    let (vault, _) = seeded_vault(&["web"]).await?;
    let dir = tempfile::tempdir()?;
    let config = file_config(&dir, Some("web"), FileTypeSet::DEFAULT);

    run(config.clone(), vault.clone(), &mut PostHookAggregator::new()).await?;

    // chain.pem is not consulted by the comparison, so a marker there shows
    // whether anything was rewritten.
    let chain_path = dir.path().join("web").join("chain.pem");
    fs::write(&chain_path, "marker")?;

    let outcome = run(config.clone(), vault.clone(), &mut PostHookAggregator::new()).await?;
    assert!(outcome.success);
    assert_eq!(outcome.count(SyncStatus::AlreadyExists), 1);
    assert_eq!(outcome.results[0].path(), None);
    assert_eq!(fs::read_to_string(&chain_path)?, "marker");

    let forced = DownloadConfig { force: true, ..config };
    let outcome = run(forced, vault, &mut PostHookAggregator::new()).await?;
    assert_eq!(outcome.count(SyncStatus::Downloaded), 1);
    assert!(fs::read_to_string(&chain_path)?.contains("BEGIN CERTIFICATE"));
    Ok(())
}

#[tokio::test]
async fn test_changed_local_certificate_is_replaced() -> anyhow::Result<()> {
    let (vault, chains) = seeded_vault(&["web"]).await?;
    let dir = tempfile::tempdir()?;
    let config = file_config(&dir, Some("web"), FileTypeSet::DEFAULT);
    run(config.clone(), vault.clone(), &mut PostHookAggregator::new()).await?;

    let stale = TestChain::generate("stale")?;
    fs::write(dir.path().join("web").join("cert.pem"), &stale.leaf_pem)?;

    let outcome = run(config, vault, &mut PostHookAggregator::new()).await?;
    assert_eq!(outcome.count(SyncStatus::Downloaded), 1);
    let expected = certificate_pem(&Certificate::new(chains[0].leaf_der.clone()));
    assert_eq!(fs::read_to_string(dir.path().join("web").join("cert.pem"))?, expected);
    Ok(())
}

#[tokio::test]
async fn test_missing_key_artifact_forces_download() -> anyhow::Result<()> {
    let (vault, _) = seeded_vault(&["web"]).await?;
    let dir = tempfile::tempdir()?;
    let file_types: FileTypeSet = [FileType::Cert, FileType::PrivKey].into_iter().collect();
    let config = file_config(&dir, None, file_types);
    run(config.clone(), vault.clone(), &mut PostHookAggregator::new()).await?;

    fs::remove_file(dir.path().join("web").join("privkey.pem"))?;

    let outcome = run(config, vault, &mut PostHookAggregator::new()).await?;
    assert_eq!(outcome.count(SyncStatus::Downloaded), 1);
    assert!(dir.path().join("web").join("privkey.pem").is_file());
    Ok(())
}

#[tokio::test]
async fn test_name_filter_ignores_case() -> anyhow::Result<()> {
    let (vault, _) = seeded_vault(&["example", "other"]).await?;
    let dir = tempfile::tempdir()?;

    let outcome = run(
        file_config(&dir, Some("Example"), FileTypeSet::DEFAULT),
        vault,
        &mut PostHookAggregator::new(),
    )
    .await?;

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].certificate_name(), Some("example"));
    assert_eq!(file_names(dir.path())?, vec!["example"]);
    Ok(())
}

#[tokio::test]
async fn test_missing_names_abort_before_any_write() -> anyhow::Result<()> {
    let (vault, _) = seeded_vault(&["a", "b"]).await?;
    let dir = tempfile::tempdir()?;

    let err = run(
        file_config(&dir, Some("a, b,missing"), FileTypeSet::DEFAULT),
        vault.clone(),
        &mut PostHookAggregator::new(),
    )
    .await
    .unwrap_err();

    match err {
        CertsyncError::MissingCertificates { names } => assert_eq!(names, vec!["missing"]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(file_names(dir.path())?.is_empty());
    assert_eq!(vault.read_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_only_configured_file_types_are_written() -> anyhow::Result<()> {
    let (vault, _) = seeded_vault(&["web"]).await?;
    let dir = tempfile::tempdir()?;

    let file_types = "Cert".parse::<FileTypeSet>().map_err(anyhow::Error::msg)?;
    let outcome =
        run(file_config(&dir, None, file_types), vault, &mut PostHookAggregator::new()).await?;

    assert!(outcome.success);
    assert_eq!(file_names(&dir.path().join("web"))?, vec!["cert.pem"]);
    Ok(())
}

#[tokio::test]
async fn test_keystore_uses_configured_password() -> anyhow::Result<()> {
    let (vault, chains) = seeded_vault(&["web"]).await?;
    let dir = tempfile::tempdir()?;
    let config = DownloadConfig {
        keystore_password: Some("s3cret".to_string()),
        ..file_config(&dir, None, [FileType::Pkcs12].into_iter().collect())
    };

    run(config, vault, &mut PostHookAggregator::new()).await?;

    let keystore = fs::read(dir.path().join("web").join("keystore.pfx"))?;
    let chain = decode_pkcs12(&keystore, "s3cret", KeyStorageFlags::default())?;
    assert_eq!(chain.leaf().thumbprint(), chains[0].thumbprint());
    assert!(chain.leaf().has_private_key());
    Ok(())
}

#[tokio::test]
async fn test_one_failing_certificate_does_not_stop_the_rest() -> anyhow::Result<()> {
    let (vault, _) = seeded_vault(&["a", "b"]).await?;
    vault.inject_failure("a-secret", InjectedFailure::Remote);
    let dir = tempfile::tempdir()?;

    let outcome =
        run(file_config(&dir, None, FileTypeSet::DEFAULT), vault, &mut PostHookAggregator::new())
            .await?;

    assert!(!outcome.success);
    assert_eq!(outcome.count(SyncStatus::Error), 1);
    assert_eq!(outcome.count(SyncStatus::Downloaded), 1);
    assert_eq!(file_names(dir.path())?, vec!["b"]);
    Ok(())
}

#[tokio::test]
async fn test_credential_failure_aborts_the_run() -> anyhow::Result<()> {
    let (vault, _) = seeded_vault(&["a", "b"]).await?;
    vault.inject_failure("a-secret", InjectedFailure::Credential);
    let dir = tempfile::tempdir()?;

    let err = run(file_config(&dir, None, FileTypeSet::DEFAULT), vault, &mut PostHookAggregator::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CertsyncError::CredentialUnavailable { .. }));
    Ok(())
}

#[tokio::test]
async fn test_downloads_register_with_post_hook() -> anyhow::Result<()> {
    let (vault, _) = seeded_vault(&["a", "b"]).await?;
    let dir = tempfile::tempdir()?;
    let config = DownloadConfig {
        post_hook: Some("/bin/true".to_string()),
        ..file_config(&dir, None, FileTypeSet::DEFAULT)
    };

    let mut post_hooks = PostHookAggregator::new();
    run(config.clone(), vault.clone(), &mut post_hooks).await?;
    assert_eq!(post_hooks.commands().collect::<Vec<_>>(), vec!["/bin/true"]);

    // Nothing is written the second time, so nothing is registered.
    let mut post_hooks = PostHookAggregator::new();
    run(config, vault, &mut post_hooks).await?;
    assert!(post_hooks.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_automate_persists_one_config_per_certificate() -> anyhow::Result<()> {
    let (vault, _) = seeded_vault(&["Alpha", "beta"]).await?;
    let out = tempfile::tempdir()?;
    let config_dir = tempfile::tempdir()?;
    let config = DownloadConfig {
        automate: true,
        post_hook: Some("systemctl reload nginx".to_string()),
        ..file_config(&out, None, FileTypeSet::DEFAULT)
    };

    let manager = AutomationConfigManager::new(config_dir.path());
    let store = open_store(&config)?;
    let outcome = DownloadFlow::new(config, vault, store)
        .with_automation(manager.clone())
        .run(&mut PostHookAggregator::new())
        .await?;
    assert!(outcome.success);

    let files = manager.list_files()?;
    assert_eq!(
        files.iter().filter_map(|f| f.file_name()?.to_str()).collect::<Vec<_>>(),
        vec!["download_alpha.json", "download_beta.json"]
    );

    let persisted = manager.load(&files[0])?;
    assert_eq!(persisted.name, "Alpha");
    assert_eq!(persisted.vault, "demo");
    assert_eq!(persisted.path.as_deref(), Some(out.path()));
    assert_eq!(persisted.post_hook.as_deref(), Some("systemctl reload nginx"));
    Ok(())
}
