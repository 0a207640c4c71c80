//! Certificate identity
//!
//! A vault secret only becomes a certificate identity through its tags: the
//! `CertificateId` tag names the certificate and the `Thumbprint` tag pins the
//! material. Everything the sync engine matches on is derived here.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CERTIFICATE_ID_TAG: &str = "CertificateId";
pub const CERTIFICATE_STATE_TAG: &str = "CertificateState";
pub const SERIAL_NUMBER_TAG: &str = "SerialNumber";
pub const THUMBPRINT_TAG: &str = "Thumbprint";

/// Stable identity of a certificate held in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateIdentity {
    /// Opaque vault locator of the secret version
    pub id: String,
    pub secret_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbprint: Option<String>,
}

impl CertificateIdentity {
    /// Build an identity from a secret's locator, validity window and tags.
    pub fn from_metadata(
        id: impl Into<String>,
        secret_name: impl Into<String>,
        version: Option<String>,
        not_before: Option<DateTime<Utc>>,
        expires_on: Option<DateTime<Utc>>,
        tags: &HashMap<String, String>,
    ) -> Self {
        let certificate_id = tags.get(CERTIFICATE_ID_TAG).cloned();
        let certificate_name = certificate_id.as_deref().and_then(name_from_certificate_id);

        Self {
            id: id.into(),
            secret_name: secret_name.into(),
            version,
            not_before,
            expires_on,
            certificate_id,
            certificate_name,
            certificate_state: tags.get(CERTIFICATE_STATE_TAG).cloned(),
            serial_number: tags.get(SERIAL_NUMBER_TAG).cloned(),
            thumbprint: tags.get(THUMBPRINT_TAG).cloned(),
        }
    }

    /// Case-insensitive comparison against the certificate name.
    pub fn matches_name(&self, name: &str) -> bool {
        self.certificate_name.as_deref().is_some_and(|own| names_equal(own, name))
    }

    /// True when the identity's thumbprint equals `thumbprint`, ignoring hex case.
    pub fn has_thumbprint(&self, thumbprint: &str) -> bool {
        self.thumbprint.as_deref().is_some_and(|own| own.eq_ignore_ascii_case(thumbprint))
    }

    /// Name used for directories, friendly names and automation files.
    pub fn display_name(&self) -> &str {
        self.certificate_name.as_deref().unwrap_or(&self.secret_name)
    }
}

/// Certificate names compare with Unicode lowercase folding, so `Zertifikat-Ä`
/// and `zertifikat-ä` are the same certificate.
pub fn names_equal(a: &str, b: &str) -> bool {
    a.chars().flat_map(char::to_lowercase).eq(b.chars().flat_map(char::to_lowercase))
}

/// Last path segment of `/certificates/<name>`; `None` without a separator.
fn name_from_certificate_id(certificate_id: &str) -> Option<String> {
    if !certificate_id.contains('/') {
        return None;
    }
    certificate_id.rsplit('/').next().filter(|name| !name.is_empty()).map(str::to_string)
}

impl fmt::Display for CertificateIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let none = "-";
        writeln!(f, "Secret Name: {}", self.secret_name)?;
        writeln!(f, "\tCertificate Id: {}", self.certificate_id.as_deref().unwrap_or(none))?;
        writeln!(f, "\tCertificate Name: {}", self.certificate_name.as_deref().unwrap_or(none))?;
        writeln!(f, "\tSerial Number: {}", self.serial_number.as_deref().unwrap_or(none))?;
        writeln!(f, "\tThumbprint: {}", self.thumbprint.as_deref().unwrap_or(none))?;
        match self.expires_on {
            Some(expiry) => writeln!(f, "\tExpiry Date: {}", expiry.to_rfc3339())?,
            None => writeln!(f, "\tExpiry Date: {}", none)?,
        }
        write!(f, "\tState: {}", self.certificate_state.as_deref().unwrap_or(none))
    }
}
