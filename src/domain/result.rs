use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::identity::CertificateIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncStatus {
    Downloaded,
    AlreadyExists,
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncStatus::Downloaded => "downloaded",
            SyncStatus::AlreadyExists => "already exists",
            SyncStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Outcome of processing one certificate.
///
/// Everything but `path` is fixed at construction; the store fills in the
/// path once, after it has written the artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    certificate_name: Option<String>,
    thumbprint: Option<String>,
    path: Option<PathBuf>,
    status: SyncStatus,
}

impl SyncResult {
    pub fn new(status: SyncStatus, identity: &CertificateIdentity) -> Self {
        Self {
            certificate_name: identity.certificate_name.clone(),
            thumbprint: identity.thumbprint.clone(),
            path: None,
            status,
        }
    }

    pub fn downloaded(identity: &CertificateIdentity) -> Self {
        Self::new(SyncStatus::Downloaded, identity)
    }

    pub fn already_exists(identity: &CertificateIdentity) -> Self {
        Self::new(SyncStatus::AlreadyExists, identity)
    }

    pub fn error(identity: &CertificateIdentity) -> Self {
        Self::new(SyncStatus::Error, identity)
    }

    /// Record where the artifacts landed. Later calls are ignored.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        if self.path.is_none() {
            self.path = Some(path.into());
        }
    }

    pub fn certificate_name(&self) -> Option<&str> {
        self.certificate_name.as_deref()
    }

    pub fn thumbprint(&self) -> Option<&str> {
        self.thumbprint.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn is_error(&self) -> bool {
        self.status == SyncStatus::Error
    }
}
