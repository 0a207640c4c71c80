use std::path::PathBuf;

use thiserror::Error;

/// Failures while converting certificate material between representations.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The vault entry does not hold a PKCS#12 container.
    #[error("Unsupported content type '{content_type}', expected application/x-pkcs12")]
    UnsupportedFormat { content_type: String },

    /// The secret value is not valid base64.
    #[error("Secret value is not valid base64: {source}")]
    InvalidBase64 {
        #[source]
        source: base64::DecodeError,
    },

    /// The PKCS#12 container could not be opened or is empty.
    #[error("Invalid PKCS#12 container: {reason}")]
    InvalidPkcs12 { reason: String },

    /// A DER certificate could not be parsed.
    #[error("Invalid X.509 certificate: {reason}")]
    InvalidCertificate { reason: String },

    /// The leaf certificate carries no private key.
    #[error("Certificate has no private key")]
    NoPrivateKey,

    /// A PEM file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A PEM file held no usable block of the expected kind.
    #[error("{path} is not a valid PEM file: {reason}")]
    InvalidPem { path: PathBuf, reason: String },

    /// The private key is not the one belonging to the certificate.
    #[error("Certificate and private key do not match")]
    CertificateKeyMismatch,
}

impl FormatError {
    pub fn unsupported_format(content_type: impl Into<String>) -> Self {
        Self::UnsupportedFormat { content_type: content_type.into() }
    }

    pub fn invalid_pkcs12(reason: impl Into<String>) -> Self {
        Self::InvalidPkcs12 { reason: reason.into() }
    }

    pub fn invalid_certificate(reason: impl Into<String>) -> Self {
        Self::InvalidCertificate { reason: reason.into() }
    }

    pub fn invalid_pem(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPem { path: path.into(), reason: reason.into() }
    }
}
