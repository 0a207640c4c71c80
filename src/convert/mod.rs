//! # Format Conversion
//!
//! Converts between the vault's base64 PKCS#12 representation and the PEM
//! artifacts written to disk, and loads PEM material for upload.
//!
//! A [`CertificateChain`] is always leaf-first: index 0 is the end-entity
//! certificate (the only one that may carry a private key), followed by the
//! intermediates and roots found in the same container.

pub mod chain;
pub mod pem;
pub mod pkcs12;

use chrono::{DateTime, Utc};
use ring::digest;
use x509_parser::prelude::*;
use zeroize::Zeroizing;

use crate::errors::FormatError;

pub use self::pem::{certificate_pem, load_pem_chain, private_key_pem};
pub use self::pkcs12::{decode_chain, encode_chain, encode_chain_base64, PKCS12_CONTENT_TYPE};

/// How an imported private key should be held by an OS key store.
///
/// Only the native store backends look at these; the file-tree store always
/// has the raw PKCS#8 bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyStorageFlags {
    pub exportable: bool,
    pub machine_scoped: bool,
}

/// A DER certificate, optionally with its PKCS#8 private key.
#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
    private_key: Option<Zeroizing<Vec<u8>>>,
}

impl Certificate {
    pub fn new(der: Vec<u8>) -> Self {
        Self { der, private_key: None }
    }

    pub fn with_private_key(der: Vec<u8>, pkcs8: Vec<u8>) -> Self {
        Self { der, private_key: Some(Zeroizing::new(pkcs8)) }
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn private_key(&self) -> Option<&[u8]> {
        self.private_key.as_ref().map(|key| key.as_slice())
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    pub fn thumbprint(&self) -> String {
        thumbprint(&self.der)
    }

    pub fn info(&self) -> Result<CertificateInfo, FormatError> {
        certificate_info(&self.der)
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("thumbprint", &self.thumbprint())
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Leaf-first certificate chain.
#[derive(Debug, Clone)]
pub struct CertificateChain {
    certificates: Vec<Certificate>,
    flags: KeyStorageFlags,
}

impl CertificateChain {
    pub fn new(leaf: Certificate, others: Vec<Certificate>, flags: KeyStorageFlags) -> Self {
        let mut certificates = Vec::with_capacity(others.len() + 1);
        certificates.push(leaf);
        certificates.extend(others);
        Self { certificates, flags }
    }

    pub fn leaf(&self) -> &Certificate {
        &self.certificates[0]
    }

    /// Everything after the leaf.
    pub fn intermediates(&self) -> &[Certificate] {
        &self.certificates[1..]
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    pub fn flags(&self) -> KeyStorageFlags {
        self.flags
    }
}

/// Metadata read from a DER certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    /// Uppercase hex of the serial's big-endian bytes
    pub serial_number: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Subject and issuer names are byte-identical
    pub self_issued: bool,
}

/// Uppercase hex SHA-1 of a DER certificate.
pub fn thumbprint(der: &[u8]) -> String {
    hex::encode_upper(digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, der))
}

pub(crate) fn parse_x509(der: &[u8]) -> Result<X509Certificate<'_>, FormatError> {
    let (_, certificate) = X509Certificate::from_der(der)
        .map_err(|err| FormatError::invalid_certificate(err.to_string()))?;
    Ok(certificate)
}

pub fn certificate_info(der: &[u8]) -> Result<CertificateInfo, FormatError> {
    let certificate = parse_x509(der)?;
    let validity = certificate.validity();

    Ok(CertificateInfo {
        subject: certificate.subject().to_string(),
        issuer: certificate.issuer().to_string(),
        serial_number: hex::encode_upper(certificate.raw_serial()),
        not_before: asn1_time_to_chrono(&validity.not_before)?,
        not_after: asn1_time_to_chrono(&validity.not_after)?,
        self_issued: certificate.subject().as_raw() == certificate.issuer().as_raw(),
    })
}

fn asn1_time_to_chrono(time: &ASN1Time) -> Result<DateTime<Utc>, FormatError> {
    DateTime::from_timestamp(time.timestamp(), 0)
        .ok_or_else(|| FormatError::invalid_certificate("validity timestamp out of range"))
}
