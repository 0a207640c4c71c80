//! File-tree certificate store.
//!
//! Layout per certificate, each file only when its kind is configured:
//!
//! ```text
//! <base>/<certificate_name>/cert.pem
//!                           chain.pem
//!                           fullchain.pem
//!                           privkey.pem            (0600, key required)
//!                           fullchain.privkey.pem  (0600, key required)
//!                           keystore.pfx           (0600, key required)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::CertificateStore;
use crate::convert::{self, pem::certificates_pem, CertificateChain};
use crate::domain::{CertificateIdentity, FileType, FileTypeSet, SyncResult};
use crate::errors::{CertsyncError, Result};
use crate::utils::write_file;
use crate::vault::SecretString;

pub struct FileCertificateStore {
    base: PathBuf,
    file_types: FileTypeSet,
    keystore_password: SecretString,
}

impl FileCertificateStore {
    pub fn new(base: impl Into<PathBuf>, file_types: FileTypeSet) -> Self {
        Self { base: base.into(), file_types, keystore_password: SecretString::new("") }
    }

    /// Password protecting `keystore.pfx` (empty by default).
    pub fn with_keystore_password(mut self, password: SecretString) -> Self {
        self.keystore_password = password;
        self
    }

    pub fn certificate_dir(&self, identity: &CertificateIdentity) -> PathBuf {
        self.base.join(identity.display_name())
    }

    pub fn file_types(&self) -> FileTypeSet {
        self.file_types
    }

    /// Thumbprint of the leaf in the first configured file that starts with it.
    fn local_thumbprint(&self, dir: &Path) -> Option<String> {
        let kind = [FileType::Cert, FileType::FullChain, FileType::FullChainPrivKey]
            .into_iter()
            .find(|kind| self.file_types.contains(*kind))?;
        let path = dir.join(kind.file_name());

        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No local certificate");
                return None;
            }
        };

        match pem::parse_many(&contents) {
            Ok(blocks) => match blocks.iter().find(|block| block.tag() == "CERTIFICATE") {
                Some(block) => Some(convert::thumbprint(block.contents())),
                None => {
                    warn!(path = %path.display(), "Local certificate file holds no certificate, replacing");
                    None
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Error reading local certificate, replacing");
                None
            }
        }
    }

    fn write_kind(&self, dir: &Path, kind: FileType, chain: &CertificateChain) -> Result<()> {
        let leaf = chain.leaf();
        let contents: Vec<u8> = match kind {
            FileType::Cert => convert::certificate_pem(leaf).into_bytes(),
            FileType::Chain => certificates_pem(chain.intermediates()).into_bytes(),
            FileType::FullChain => certificates_pem(chain.certificates()).into_bytes(),
            FileType::PrivKey => convert::private_key_pem(leaf)?.into_bytes(),
            FileType::FullChainPrivKey => {
                let mut pem = certificates_pem(chain.certificates());
                pem.push_str(&convert::private_key_pem(leaf)?);
                pem.into_bytes()
            }
            FileType::Pkcs12 => {
                convert::encode_chain(chain, self.keystore_password.expose_secret())?
            }
        };

        let path = dir.join(kind.file_name());
        write_file(&path, &contents, kind.carries_private_key())
    }
}

impl CertificateStore for FileCertificateStore {
    fn exists(&self, identity: &CertificateIdentity) -> bool {
        let dir = self.certificate_dir(identity);

        let Some(expected) = identity.thumbprint.as_deref() else {
            return false;
        };
        let Some(local) = self.local_thumbprint(&dir) else {
            return false;
        };
        if !local.eq_ignore_ascii_case(expected) {
            debug!(
                certificate = %identity.display_name(),
                local = %local,
                remote = %expected,
                "Local certificate differs from vault"
            );
            return false;
        }

        if self.file_types.wants_private_key() {
            let has_key_artifact = self
                .file_types
                .iter()
                .filter(|kind| kind.carries_private_key())
                .any(|kind| dir.join(kind.file_name()).is_file());
            if !has_key_artifact {
                debug!(certificate = %identity.display_name(), "Local private key artifacts missing");
                return false;
            }
        }

        true
    }

    fn save(&self, identity: &CertificateIdentity, chain: &CertificateChain) -> Result<SyncResult> {
        let dir = self.certificate_dir(identity);
        fs::create_dir_all(&dir).map_err(|e| {
            CertsyncError::local_store_with_source(
                format!("Failed to create directory {}", dir.display()),
                Box::new(e),
            )
        })?;

        info!(certificate = %identity.display_name(), path = %dir.display(), "Saving certificate");

        let has_key = chain.leaf().has_private_key();
        for kind in self.file_types.iter() {
            if kind.carries_private_key() && !has_key {
                debug!(kind = %kind, "Skipping key-bearing artifact, certificate has no private key");
                continue;
            }
            self.write_kind(&dir, kind, chain)?;
        }

        let mut result = SyncResult::downloaded(identity);
        result.set_path(dir);
        Ok(result)
    }
}
