//! PEM encoding of chain members and PEM loading for upload.

use std::{fs, path::Path};

use pem::{EncodeConfig, LineEnding, Pem};
use rustls::pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer};

use super::chain::key_matches_certificate;
use super::{Certificate, CertificateChain, KeyStorageFlags};
use crate::errors::FormatError;

fn encode(tag: &str, contents: &[u8]) -> String {
    let config = EncodeConfig::new().set_line_ending(LineEnding::LF);
    pem::encode_config(&Pem::new(tag, contents.to_vec()), config)
}

/// `CERTIFICATE` block for one chain member.
pub fn certificate_pem(certificate: &Certificate) -> String {
    encode("CERTIFICATE", certificate.der())
}

/// PKCS#8 `PRIVATE KEY` block for the certificate's key.
pub fn private_key_pem(certificate: &Certificate) -> Result<String, FormatError> {
    let key = certificate.private_key().ok_or(FormatError::NoPrivateKey)?;
    Ok(encode("PRIVATE KEY", key))
}

/// Concatenated `CERTIFICATE` blocks.
pub fn certificates_pem<'a>(certificates: impl IntoIterator<Item = &'a Certificate>) -> String {
    certificates.into_iter().map(certificate_pem).collect()
}

/// Load a leaf certificate, its key and an optional chain file from PEM.
///
/// Extra certificates after the first one in `cert_path` are treated as chain
/// members. The key must be PKCS#8 and must belong to the leaf.
pub fn load_pem_chain(
    cert_path: &Path,
    key_path: &Path,
    chain_path: Option<&Path>,
) -> Result<CertificateChain, FormatError> {
    let mut certificates = read_certificates(cert_path)?;
    if certificates.is_empty() {
        return Err(FormatError::invalid_pem(cert_path, "no certificates found"));
    }
    let leaf_der = certificates.remove(0);

    if let Some(chain_path) = chain_path {
        certificates.extend(read_certificates(chain_path)?);
    }

    let key_bytes = fs::read(key_path)
        .map_err(|source| FormatError::Read { path: key_path.to_path_buf(), source })?;
    let private_key = PrivateKeyDer::from_pem_slice(&key_bytes)
        .map_err(|err| FormatError::invalid_pem(key_path, err.to_string()))?;
    let pkcs8 = match private_key {
        PrivateKeyDer::Pkcs8(key) => key.secret_pkcs8_der().to_vec(),
        _ => return Err(FormatError::invalid_pem(key_path, "private key must be PKCS#8")),
    };

    if key_matches_certificate(&leaf_der, &pkcs8) == Some(false) {
        return Err(FormatError::CertificateKeyMismatch);
    }

    Ok(CertificateChain::new(
        Certificate::with_private_key(leaf_der, pkcs8),
        certificates.into_iter().map(Certificate::new).collect(),
        KeyStorageFlags::default(),
    ))
}

fn read_certificates(path: &Path) -> Result<Vec<Vec<u8>>, FormatError> {
    let bytes =
        fs::read(path).map_err(|source| FormatError::Read { path: path.to_path_buf(), source })?;

    CertificateDer::pem_slice_iter(&bytes)
        .map(|result| {
            result
                .map(|der| der.as_ref().to_vec())
                .map_err(|err| FormatError::invalid_pem(path, err.to_string()))
        })
        .collect()
}
