//! PKCS#12 containers as stored in the vault.
//!
//! Both the legacy SHA-1 PBE schemes and PBES2 (PBKDF2 with AES) are read;
//! containers are written with PBES2/AES-256 and an HMAC-SHA256 MAC.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use p12_keystore::{
    Certificate as StoredCertificate, EncryptionAlgorithm, KeyStore, KeyStoreEntry, MacAlgorithm,
    PrivateKeyChain,
};
use ring::digest;

use super::chain::order_chain;
use super::{CertificateChain, KeyStorageFlags};
use crate::errors::FormatError;

/// Media type the vault uses for certificate secrets.
pub const PKCS12_CONTENT_TYPE: &str = "application/x-pkcs12";

/// Vault-held containers are protected with the empty password.
const VAULT_PASSWORD: &str = "";

const KEY_ALIAS: &str = "certificate";

/// Decode a vault secret value into a leaf-first chain.
pub fn decode_chain(
    secret_value: &str,
    content_type: Option<&str>,
    flags: KeyStorageFlags,
) -> Result<CertificateChain, FormatError> {
    let content_type = content_type.unwrap_or_default();
    if !content_type.eq_ignore_ascii_case(PKCS12_CONTENT_TYPE) {
        return Err(FormatError::unsupported_format(content_type));
    }

    let der = STANDARD
        .decode(secret_value.trim())
        .map_err(|source| FormatError::InvalidBase64 { source })?;

    decode_pkcs12(&der, VAULT_PASSWORD, flags)
}

/// Open a DER PKCS#12 container with `password`.
///
/// A wrong password fails MAC verification and is reported as
/// [`FormatError::InvalidPkcs12`].
pub fn decode_pkcs12(
    der: &[u8],
    password: &str,
    flags: KeyStorageFlags,
) -> Result<CertificateChain, FormatError> {
    let keystore = KeyStore::from_pkcs12(der, password)
        .map_err(|err| FormatError::invalid_pkcs12(err.to_string()))?;

    let mut certificates: Vec<Vec<u8>> = Vec::new();
    let mut private_key = None;
    let mut push = |der: &[u8]| {
        if !certificates.iter().any(|existing| existing.as_slice() == der) {
            certificates.push(der.to_vec());
        }
    };

    for (_, entry) in keystore.entries() {
        match entry {
            KeyStoreEntry::PrivateKeyChain(chain) => {
                if private_key.is_none() {
                    private_key = Some(chain.key().to_vec());
                }
                chain.chain().iter().for_each(|certificate| push(certificate.as_der()));
            }
            KeyStoreEntry::Certificate(certificate) => push(certificate.as_der()),
            _ => {}
        }
    }

    order_chain(certificates, private_key, flags)
}

/// Build one PKCS#12 container with the leaf, its key and every chain member.
pub fn encode_chain(chain: &CertificateChain, password: &str) -> Result<Vec<u8>, FormatError> {
    let leaf = chain.leaf();
    let key = leaf.private_key().ok_or(FormatError::NoPrivateKey)?;

    let members = chain
        .certificates()
        .iter()
        .map(|certificate| {
            StoredCertificate::from_der(certificate.der())
                .map_err(|err| FormatError::invalid_certificate(err.to_string()))
        })
        .collect::<Result<Vec<_>, FormatError>>()?;

    // localKeyId pairs the key bag with the leaf's certificate bag.
    let local_key_id = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, leaf.der());

    let mut keystore = KeyStore::new();
    keystore.add_entry(
        KEY_ALIAS,
        KeyStoreEntry::PrivateKeyChain(PrivateKeyChain::new(key, local_key_id.as_ref(), members)),
    );

    keystore
        .writer(password)
        .encryption_algorithm(EncryptionAlgorithm::PbeWithHmacSha256AndAes256)
        .mac_algorithm(MacAlgorithm::HmacSha256)
        .write()
        .map_err(|err| FormatError::invalid_pkcs12(err.to_string()))
}

/// Base64 form stored as the vault secret value.
pub fn encode_chain_base64(chain: &CertificateChain) -> Result<String, FormatError> {
    Ok(STANDARD.encode(encode_chain(chain, VAULT_PASSWORD)?))
}
