use std::collections::HashMap;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use certsync::convert::{
    decode_chain, Certificate, CertificateChain, KeyStorageFlags, PKCS12_CONTENT_TYPE,
};
use certsync::domain::{CertificateIdentity, SyncStatus, CERTIFICATE_ID_TAG, THUMBPRINT_TAG};
use certsync::flows::{DownloadConfig, DownloadFlow};
use certsync::hooks::PostHookAggregator;
use certsync::stores::{
    CertificateStore, MemorySystemStore, NativeCertificateStore, StoreLocation, StoreName,
    SystemStoreBackend, CRYPT_EXPORTABLE, CRYPT_MACHINE_KEYSET, CRYPT_USER_KEYSET,
};

use super::support::{seeded_vault, TestChain, TEST_VAULT};

fn identity_for(name: &str, chain: &TestChain) -> CertificateIdentity {
    CertificateIdentity::from_metadata(
        format!("memory://demo/secrets/{}-secret", name),
        format!("{}-secret", name),
        None,
        None,
        None,
        &HashMap::from([
            (CERTIFICATE_ID_TAG.to_string(), format!("/certificates/{}", name)),
            (THUMBPRINT_TAG.to_string(), chain.thumbprint().to_ascii_lowercase()),
        ]),
    )
}

fn keyed_chain(chain: &TestChain) -> anyhow::Result<CertificateChain> {
    Ok(decode_chain(
        &STANDARD.encode(chain.pkcs12()?),
        Some(PKCS12_CONTENT_TYPE),
        KeyStorageFlags { exportable: false, machine_scoped: true },
    )?)
}

#[test]
fn test_certificate_without_key_never_counts_as_present() -> anyhow::Result<()> {
    let generated = TestChain::generate("web")?;
    let identity = identity_for("web", &generated);
    let store = NativeCertificateStore::new(MemorySystemStore::new());
    assert!(!store.exists(&identity));

    let keyless = CertificateChain::new(
        Certificate::new(generated.leaf_der.clone()),
        Vec::new(),
        KeyStorageFlags::default(),
    );
    let result = store.save(&identity, &keyless)?;

    assert_eq!(result.status(), SyncStatus::Downloaded);
    assert_eq!(store.backend().len(StoreName::Personal), 1);
    assert!(!store.exists(&identity));
    Ok(())
}

#[test]
fn test_save_places_leaf_and_chain_members() -> anyhow::Result<()> {
    let generated = TestChain::generate("web")?;
    let identity = identity_for("web", &generated);
    let store = NativeCertificateStore::new(MemorySystemStore::new());

    let result = store.save(&identity, &keyed_chain(&generated)?)?;
    assert_eq!(result.path(), None);
    assert!(store.exists(&identity));

    let personal = store.backend().entries(StoreName::Personal)?;
    assert_eq!(personal.len(), 1);
    assert_eq!(personal[0].friendly_name.as_deref(), Some("web"));
    assert!(personal[0].has_private_key);
    assert_eq!(store.backend().len(StoreName::IntermediateCa), 1);
    assert_eq!(store.backend().len(StoreName::Root), 1);

    // Saving again replaces the leaf and leaves the chain members alone.
    store.save(&identity, &keyed_chain(&generated)?)?;
    assert_eq!(store.backend().len(StoreName::Personal), 1);
    assert_eq!(store.backend().len(StoreName::IntermediateCa), 1);
    assert_eq!(store.backend().len(StoreName::Root), 1);
    Ok(())
}

#[tokio::test]
async fn test_download_into_system_store_is_idempotent() -> anyhow::Result<()> {
    let (vault, _) = seeded_vault(&["web"]).await?;
    let config = DownloadConfig {
        vault: TEST_VAULT.to_string(),
        store: Some(StoreLocation::LocalMachine),
        ..DownloadConfig::default()
    };

    let store = NativeCertificateStore::new(MemorySystemStore::new());
    let flow = DownloadFlow::new(config, vault, Box::new(store));

    let first = flow.run(&mut PostHookAggregator::new()).await?;
    assert_eq!(first.count(SyncStatus::Downloaded), 1);

    let second = flow.run(&mut PostHookAggregator::new()).await?;
    assert!(second.success);
    assert_eq!(second.count(SyncStatus::AlreadyExists), 1);
    Ok(())
}

#[tokio::test]
async fn test_store_without_key_support_downloads_every_time() -> anyhow::Result<()> {
    let (vault, _) = seeded_vault(&["web"]).await?;
    let config = DownloadConfig {
        vault: TEST_VAULT.to_string(),
        store: Some(StoreLocation::CurrentUser),
        ..DownloadConfig::default()
    };

    let store = NativeCertificateStore::new(MemorySystemStore::dropping_private_keys());
    let flow = DownloadFlow::new(config, vault, Box::new(store));

    flow.run(&mut PostHookAggregator::new()).await?;
    let second = flow.run(&mut PostHookAggregator::new()).await?;
    assert_eq!(second.count(SyncStatus::Downloaded), 1);
    Ok(())
}

#[tokio::test]
async fn test_key_flags_follow_store_location_and_exportable_option() -> anyhow::Result<()> {
    let cases = [
        (StoreLocation::LocalMachine, true, CRYPT_MACHINE_KEYSET | CRYPT_EXPORTABLE),
        (StoreLocation::LocalMachine, false, CRYPT_MACHINE_KEYSET),
        (StoreLocation::CurrentUser, true, CRYPT_USER_KEYSET | CRYPT_EXPORTABLE),
        (StoreLocation::CurrentUser, false, CRYPT_USER_KEYSET),
    ];

    for (location, mark_exportable, expected) in cases {
        let (vault, chains) = seeded_vault(&["web"]).await?;
        let config = DownloadConfig {
            vault: TEST_VAULT.to_string(),
            store: Some(location),
            mark_exportable,
            ..DownloadConfig::default()
        };
        let store = Arc::new(MemorySystemStore::new());
        let native = NativeCertificateStore::new(store.clone());
        let flow = DownloadFlow::new(config, vault, Box::new(native));

        flow.run(&mut PostHookAggregator::new()).await?;

        assert_eq!(
            store.key_import_flags(&chains[0].thumbprint()),
            Some(expected),
            "{location} exportable={mark_exportable}"
        );
    }
    Ok(())
}
