//! OS certificate store.
//!
//! The leaf and its key go into the personal store; chain members go into the
//! trusted root store (self-issued) or the intermediate CA store. The store
//! itself only knows thumbprints, so the platform part is a small
//! [`SystemStoreBackend`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::CertificateStore;
use crate::convert::{Certificate, CertificateChain, KeyStorageFlags};
use crate::domain::{CertificateIdentity, SyncResult};
use crate::errors::Result;

/// Which user's stores a backend opens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum StoreLocation {
    #[default]
    #[value(alias = "CurrentUser")]
    CurrentUser,
    #[value(alias = "LocalMachine")]
    LocalMachine,
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::CurrentUser => f.write_str("CurrentUser"),
            StoreLocation::LocalMachine => f.write_str("LocalMachine"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreName {
    Personal,
    Root,
    IntermediateCa,
}

impl StoreName {
    /// System store name as the OS knows it.
    pub fn system_name(&self) -> &'static str {
        match self {
            StoreName::Personal => "My",
            StoreName::Root => "Root",
            StoreName::IntermediateCa => "CA",
        }
    }
}

/// `CRYPT_EXPORTABLE`: the imported key may be exported again.
pub const CRYPT_EXPORTABLE: u32 = 0x0000_0001;
/// `CRYPT_MACHINE_KEYSET`: the key goes into the machine-wide keyset.
pub const CRYPT_MACHINE_KEYSET: u32 = 0x0000_0020;
/// `CRYPT_USER_KEYSET`: the key goes into the importing user's keyset.
pub const CRYPT_USER_KEYSET: u32 = 0x0000_1000;

/// `PFXImportCertStore` flags for a keyed import.
pub fn pfx_import_flags(flags: KeyStorageFlags) -> u32 {
    let keyset = if flags.machine_scoped { CRYPT_MACHINE_KEYSET } else { CRYPT_USER_KEYSET };
    if flags.exportable {
        keyset | CRYPT_EXPORTABLE
    } else {
        keyset
    }
}

#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub thumbprint: String,
    pub friendly_name: Option<String>,
    pub has_private_key: bool,
}

pub trait SystemStoreBackend: Send + Sync {
    fn entries(&self, store: StoreName) -> Result<Vec<StoredEntry>>;

    fn add(
        &self,
        store: StoreName,
        certificate: &Certificate,
        friendly_name: Option<&str>,
        flags: KeyStorageFlags,
    ) -> Result<()>;

    /// Remove every entry with the thumbprint, returning how many went.
    fn remove(&self, store: StoreName, thumbprint: &str) -> Result<usize>;
}

impl<B: SystemStoreBackend + ?Sized> SystemStoreBackend for Arc<B> {
    fn entries(&self, store: StoreName) -> Result<Vec<StoredEntry>> {
        (**self).entries(store)
    }

    fn add(
        &self,
        store: StoreName,
        certificate: &Certificate,
        friendly_name: Option<&str>,
        flags: KeyStorageFlags,
    ) -> Result<()> {
        (**self).add(store, certificate, friendly_name, flags)
    }

    fn remove(&self, store: StoreName, thumbprint: &str) -> Result<usize> {
        (**self).remove(store, thumbprint)
    }
}

pub struct NativeCertificateStore<B> {
    backend: B,
}

impl<B: SystemStoreBackend> NativeCertificateStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn find(&self, store: StoreName, thumbprint: &str) -> Result<Option<StoredEntry>> {
        Ok(self
            .backend
            .entries(store)?
            .into_iter()
            .find(|entry| entry.thumbprint.eq_ignore_ascii_case(thumbprint)))
    }

    fn save_chain_member(&self, certificate: &Certificate, flags: KeyStorageFlags) -> Result<()> {
        let info = certificate.info()?;
        let store = if info.self_issued { StoreName::Root } else { StoreName::IntermediateCa };
        let thumbprint = certificate.thumbprint();

        if self.find(store, &thumbprint)?.is_some() {
            debug!(store = ?store, thumbprint = %thumbprint, subject = %info.subject, "Chain certificate already present");
            return Ok(());
        }

        info!(store = ?store, thumbprint = %thumbprint, subject = %info.subject, "Adding chain certificate");
        self.backend.add(store, &Certificate::new(certificate.der().to_vec()), None, flags)
    }
}

impl<B: SystemStoreBackend> CertificateStore for NativeCertificateStore<B> {
    fn exists(&self, identity: &CertificateIdentity) -> bool {
        let Some(thumbprint) = identity.thumbprint.as_deref() else {
            return false;
        };

        match self.find(StoreName::Personal, thumbprint) {
            Ok(Some(entry)) => entry.has_private_key,
            Ok(None) => false,
            Err(e) => {
                warn!(certificate = %identity.display_name(), error = %e, "Error reading certificate store");
                false
            }
        }
    }

    fn save(&self, identity: &CertificateIdentity, chain: &CertificateChain) -> Result<SyncResult> {
        let leaf = chain.leaf();
        let thumbprint = leaf.thumbprint();
        let name = identity.display_name();
        let flags = chain.flags();

        let removed = self.backend.remove(StoreName::Personal, &thumbprint)?;
        if removed > 0 {
            debug!(certificate = %name, thumbprint = %thumbprint, removed, "Removed existing certificate");
        }

        info!(certificate = %name, thumbprint = %thumbprint, "Adding certificate to personal store");
        self.backend.add(StoreName::Personal, leaf, Some(name), flags)?;

        if leaf.has_private_key() {
            let stored_key = self
                .find(StoreName::Personal, &thumbprint)?
                .map(|entry| entry.has_private_key)
                .unwrap_or(false);
            if !stored_key {
                warn!(certificate = %name, thumbprint = %thumbprint, "Private key was not persisted with the certificate");
            }
        }

        for certificate in chain.intermediates() {
            self.save_chain_member(certificate, flags)?;
        }

        Ok(SyncResult::downloaded(identity))
    }
}

/// Backend holding entries in memory.
#[derive(Default)]
pub struct MemorySystemStore {
    stores: Mutex<HashMap<StoreName, Vec<StoredEntry>>>,
    key_imports: Mutex<HashMap<String, u32>>,
    drop_private_keys: bool,
}

impl MemorySystemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept certificates but discard their keys, like a store that
    /// cannot persist the key material.
    pub fn dropping_private_keys() -> Self {
        Self { drop_private_keys: true, ..Self::default() }
    }

    fn stores(&self) -> MutexGuard<'_, HashMap<StoreName, Vec<StoredEntry>>> {
        self.stores.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self, store: StoreName) -> usize {
        self.stores().get(&store).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self, store: StoreName) -> bool {
        self.len(store) == 0
    }

    /// `PFXImportCertStore` flags the last keyed import of `thumbprint` would
    /// have used.
    pub fn key_import_flags(&self, thumbprint: &str) -> Option<u32> {
        self.key_imports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&thumbprint.to_ascii_uppercase())
            .copied()
    }

    /// Seed an entry directly.
    pub fn insert(&self, store: StoreName, entry: StoredEntry) {
        self.stores().entry(store).or_default().push(entry);
    }
}

impl SystemStoreBackend for MemorySystemStore {
    fn entries(&self, store: StoreName) -> Result<Vec<StoredEntry>> {
        Ok(self.stores().get(&store).cloned().unwrap_or_default())
    }

    fn add(
        &self,
        store: StoreName,
        certificate: &Certificate,
        friendly_name: Option<&str>,
        flags: KeyStorageFlags,
    ) -> Result<()> {
        if certificate.has_private_key() {
            self.key_imports
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .insert(certificate.thumbprint(), pfx_import_flags(flags));
        }
        let entry = StoredEntry {
            thumbprint: certificate.thumbprint(),
            friendly_name: friendly_name.map(str::to_string),
            has_private_key: certificate.has_private_key() && !self.drop_private_keys,
        };
        let mut stores = self.stores();
        let entries = stores.entry(store).or_default();
        entries.retain(|existing| !existing.thumbprint.eq_ignore_ascii_case(&entry.thumbprint));
        entries.push(entry);
        Ok(())
    }

    fn remove(&self, store: StoreName, thumbprint: &str) -> Result<usize> {
        let mut stores = self.stores();
        let Some(entries) = stores.get_mut(&store) else {
            return Ok(0);
        };
        let before = entries.len();
        entries.retain(|entry| !entry.thumbprint.eq_ignore_ascii_case(thumbprint));
        Ok(before - entries.len())
    }
}
