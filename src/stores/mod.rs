//! # Local Certificate Stores
//!
//! A store answers two questions for the sync engine: is an equivalent
//! certificate already here, and how do I persist this chain. There are two
//! implementations:
//!
//! - [`FileCertificateStore`]: PEM/PKCS#12 files under `<base>/<certificate_name>/`
//! - [`NativeCertificateStore`]: an OS certificate store behind a
//!   [`SystemStoreBackend`] (Windows via `schannel`, or in-memory)

pub mod file;
pub mod native;
#[cfg(windows)]
pub mod windows;

use crate::convert::CertificateChain;
use crate::domain::{CertificateIdentity, SyncResult};
use crate::errors::Result;

pub use file::FileCertificateStore;
pub use native::{
    pfx_import_flags, MemorySystemStore, NativeCertificateStore, StoreLocation, StoreName,
    StoredEntry, SystemStoreBackend, CRYPT_EXPORTABLE, CRYPT_MACHINE_KEYSET, CRYPT_USER_KEYSET,
};
#[cfg(windows)]
pub use windows::WindowsSystemStore;

pub trait CertificateStore: Send + Sync {
    /// True when the store already holds material with the identity's
    /// thumbprint. Read failures count as "not present".
    fn exists(&self, identity: &CertificateIdentity) -> bool;

    /// Persist the chain and return a `Downloaded` result.
    fn save(&self, identity: &CertificateIdentity, chain: &CertificateChain)
        -> Result<SyncResult>;
}
