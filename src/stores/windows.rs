//! Windows system certificate stores.
//!
//! Enumeration, removal and key-less adds go through `schannel`. Keyed
//! imports call `PFXImportCertStore` directly because the keyset and
//! exportability flags are not reachable through `schannel`.

use std::ffi::c_void;
use std::io;
use std::ptr;

use schannel::cert_context::{CertContext, HashAlgorithm};
use schannel::cert_store::{CertAdd, CertStore};
use tracing::debug;
use windows_sys::Win32::Security::Cryptography::{
    CertAddCertificateContextToStore, CertCloseStore, CertEnumCertificatesInStore,
    CertFreeCertificateContext, CertOpenStore, CertSetCertificateContextProperty,
    PFXImportCertStore, CERT_CONTEXT, CERT_FRIENDLY_NAME_PROP_ID, CERT_STORE_ADD_REPLACE_EXISTING,
    CERT_STORE_PROV_SYSTEM_W, CERT_SYSTEM_STORE_CURRENT_USER, CERT_SYSTEM_STORE_LOCAL_MACHINE,
    CRYPT_INTEGER_BLOB, HCERTSTORE,
};

use super::native::{pfx_import_flags, StoreLocation, StoreName, StoredEntry, SystemStoreBackend};
use crate::convert::{self, Certificate, CertificateChain, KeyStorageFlags};
use crate::errors::{CertsyncError, Result};

pub struct WindowsSystemStore {
    location: StoreLocation,
}

impl WindowsSystemStore {
    pub fn new(location: StoreLocation) -> Self {
        Self { location }
    }

    fn open(&self, store: StoreName) -> Result<CertStore> {
        let opened = match self.location {
            StoreLocation::CurrentUser => CertStore::open_current_user(store.system_name()),
            StoreLocation::LocalMachine => CertStore::open_local_machine(store.system_name()),
        };
        opened.map_err(|e| store_error(format!("Failed to open {} {} store", self.location, store.system_name()), e))
    }

    fn open_raw(&self, store: StoreName) -> Result<StoreHandle> {
        let location = match self.location {
            StoreLocation::CurrentUser => CERT_SYSTEM_STORE_CURRENT_USER,
            StoreLocation::LocalMachine => CERT_SYSTEM_STORE_LOCAL_MACHINE,
        };
        let name = wide(store.system_name());
        // SAFETY: `name` is NUL-terminated and outlives the call.
        let handle = unsafe {
            CertOpenStore(CERT_STORE_PROV_SYSTEM_W, 0, 0, location, name.as_ptr() as *const c_void)
        };
        StoreHandle::new(handle).ok_or_else(|| {
            store_error(
                format!("Failed to open {} {} store", self.location, store.system_name()),
                io::Error::last_os_error(),
            )
        })
    }

    /// Import a certificate and its key so the key lands in the user or
    /// machine keyset with the requested exportability.
    fn import_keyed(
        &self,
        store: StoreName,
        certificate: &Certificate,
        friendly_name: Option<&str>,
        flags: KeyStorageFlags,
    ) -> Result<()> {
        let single = CertificateChain::new(certificate.clone(), Vec::new(), flags);
        let mut pfx = convert::encode_chain(&single, "")?;
        let blob = CRYPT_INTEGER_BLOB { cbData: pfx.len() as u32, pbData: pfx.as_mut_ptr() };
        let password = wide("");
        let import_flags = pfx_import_flags(flags);
        debug!(import_flags, location = %self.location, "Importing certificate with private key");

        // SAFETY: `blob` points into `pfx` and `password` is NUL-terminated;
        // both outlive the call.
        let imported = StoreHandle::new(unsafe {
            PFXImportCertStore(&blob, password.as_ptr(), import_flags)
        })
        .ok_or_else(|| store_error("Failed to import certificate key", io::Error::last_os_error()))?;
        let target = self.open_raw(store)?;

        // SAFETY: `imported` is a live store; the context is freed below.
        let context = unsafe { CertEnumCertificatesInStore(imported.0, ptr::null()) };
        if context.is_null() {
            return Err(CertsyncError::local_store("Imported container held no certificate"));
        }

        let mut added: *mut CERT_CONTEXT = ptr::null_mut();
        // SAFETY: both handles and `context` are live.
        let ok = unsafe {
            CertAddCertificateContextToStore(target.0, context, CERT_STORE_ADD_REPLACE_EXISTING, &mut added)
        };
        let add_error = io::Error::last_os_error();
        // SAFETY: `context` came from CertEnumCertificatesInStore.
        unsafe { CertFreeCertificateContext(context) };
        if ok == 0 {
            return Err(store_error("Failed to add certificate", add_error));
        }

        let named = match friendly_name {
            Some(name) => set_friendly_name(added, name),
            None => Ok(()),
        };
        // SAFETY: `added` is the store's copy returned above.
        unsafe { CertFreeCertificateContext(added) };
        named
    }
}

/// Certificate store handle closed on drop.
struct StoreHandle(HCERTSTORE);

impl StoreHandle {
    fn new(handle: HCERTSTORE) -> Option<Self> {
        if handle.is_null() {
            None
        } else {
            Some(Self(handle))
        }
    }
}

impl Drop for StoreHandle {
    fn drop(&mut self) {
        // SAFETY: the handle is open and owned by this guard.
        unsafe { CertCloseStore(self.0, 0) };
    }
}

fn set_friendly_name(context: *const CERT_CONTEXT, name: &str) -> Result<()> {
    let mut value = wide(name);
    let blob = CRYPT_INTEGER_BLOB {
        cbData: (value.len() * std::mem::size_of::<u16>()) as u32,
        pbData: value.as_mut_ptr() as *mut u8,
    };
    // SAFETY: `context` is live and `blob` points into `value` for the call.
    let ok = unsafe {
        CertSetCertificateContextProperty(
            context,
            CERT_FRIENDLY_NAME_PROP_ID,
            0,
            &blob as *const CRYPT_INTEGER_BLOB as *const c_void,
        )
    };
    if ok == 0 {
        return Err(store_error("Failed to set friendly name", io::Error::last_os_error()));
    }
    Ok(())
}

fn wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

impl SystemStoreBackend for WindowsSystemStore {
    fn entries(&self, store: StoreName) -> Result<Vec<StoredEntry>> {
        let opened = self.open(store)?;
        let mut entries = Vec::new();
        for certificate in opened.certs() {
            let thumbprint = match certificate.fingerprint(HashAlgorithm::sha1()) {
                Ok(bytes) => hex::encode_upper(bytes),
                Err(_) => convert::thumbprint(certificate.to_der()),
            };
            entries.push(StoredEntry {
                thumbprint,
                friendly_name: certificate.friendly_name().ok(),
                has_private_key: certificate.private_key().silent(true).acquire().is_ok(),
            });
        }
        Ok(entries)
    }

    fn add(
        &self,
        store: StoreName,
        certificate: &Certificate,
        friendly_name: Option<&str>,
        flags: KeyStorageFlags,
    ) -> Result<()> {
        if certificate.has_private_key() {
            return self.import_keyed(store, certificate, friendly_name, flags);
        }

        let mut target = self.open(store)?;
        let context = CertContext::new(certificate.der())
            .map_err(|e| store_error("Failed to load certificate", e))?;
        let context = target
            .add_cert(&context, CertAdd::UseExisting)
            .map_err(|e| store_error("Failed to add certificate", e))?;

        if let Some(name) = friendly_name {
            context
                .set_friendly_name(name)
                .map_err(|e| store_error("Failed to set friendly name", e))?;
        }
        Ok(())
    }

    fn remove(&self, store: StoreName, thumbprint: &str) -> Result<usize> {
        let opened = self.open(store)?;
        let mut removed = 0;
        for certificate in opened.certs() {
            let matches = certificate
                .fingerprint(HashAlgorithm::sha1())
                .map(|bytes| hex::encode_upper(bytes).eq_ignore_ascii_case(thumbprint))
                .unwrap_or(false);
            if matches {
                certificate.delete().map_err(|e| store_error("Failed to remove certificate", e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn store_error(message: impl Into<String>, source: io::Error) -> CertsyncError {
    CertsyncError::local_store_with_source(message, Box::new(source))
}
