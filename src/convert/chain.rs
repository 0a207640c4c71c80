//! Chain ordering and key matching.
//!
//! PKCS#12 containers carry their certificates in no guaranteed order. The
//! leaf is the certificate that issues no other certificate in the container;
//! the remainder is walked issuer-by-issuer so `chain.pem` reads upwards.

use ring::{
    rand::SystemRandom,
    signature::{
        EcdsaKeyPair, Ed25519KeyPair, KeyPair, RsaKeyPair, ECDSA_P256_SHA256_ASN1_SIGNING,
        ECDSA_P384_SHA384_ASN1_SIGNING,
    },
};

use super::{parse_x509, Certificate, CertificateChain, KeyStorageFlags};
use crate::errors::FormatError;

const OID_ED25519: &str = "1.3.101.112";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";

struct Names {
    subject: Vec<u8>,
    issuer: Vec<u8>,
}

/// Assemble a leaf-first chain from unordered DER certificates and the
/// container's private key, if any.
pub fn order_chain(
    certificates: Vec<Vec<u8>>,
    private_key: Option<Vec<u8>>,
    flags: KeyStorageFlags,
) -> Result<CertificateChain, FormatError> {
    if certificates.is_empty() {
        return Err(FormatError::invalid_pkcs12("container holds no certificates"));
    }

    let names = certificates
        .iter()
        .map(|der| {
            let parsed = parse_x509(der)?;
            Ok(Names {
                subject: parsed.subject().as_raw().to_vec(),
                issuer: parsed.issuer().as_raw().to_vec(),
            })
        })
        .collect::<Result<Vec<_>, FormatError>>()?;

    let candidates: Vec<usize> = (0..certificates.len())
        .filter(|&i| {
            !names.iter().enumerate().any(|(j, other)| j != i && other.issuer == names[i].subject)
        })
        .collect();

    let leaf_index = private_key
        .as_deref()
        .and_then(|key| {
            candidates
                .iter()
                .copied()
                .find(|&i| key_matches_certificate(&certificates[i], key) == Some(true))
        })
        .or_else(|| candidates.first().copied())
        .unwrap_or(0);

    let order = issuance_order(&names, leaf_index);

    let mut slots: Vec<Option<Vec<u8>>> = certificates.into_iter().map(Some).collect();
    let mut ordered = order.into_iter().filter_map(|i| slots[i].take());

    let leaf_der = ordered
        .next()
        .ok_or_else(|| FormatError::invalid_pkcs12("container holds no certificates"))?;
    let leaf = match private_key {
        Some(key) => Certificate::with_private_key(leaf_der, key),
        None => Certificate::new(leaf_der),
    };
    let others = ordered.map(Certificate::new).collect();

    Ok(CertificateChain::new(leaf, others, flags))
}

/// Leaf first, then each issuer in turn, then anything unrelated.
fn issuance_order(names: &[Names], leaf_index: usize) -> Vec<usize> {
    let mut order = vec![leaf_index];
    let mut current = leaf_index;

    loop {
        if names[current].subject == names[current].issuer {
            break;
        }
        let next = (0..names.len())
            .find(|i| !order.contains(i) && names[*i].subject == names[current].issuer);
        match next {
            Some(i) => {
                order.push(i);
                current = i;
            }
            None => break,
        }
    }

    order.extend((0..names.len()).filter(|i| !order.contains(i)).collect::<Vec<_>>());
    order
}

/// Whether the PKCS#8 key belongs to the certificate's public key.
///
/// `None` when the key algorithm is one we cannot check.
pub fn key_matches_certificate(certificate_der: &[u8], pkcs8: &[u8]) -> Option<bool> {
    let certificate = parse_x509(certificate_der).ok()?;
    let spki = certificate.public_key();
    let public_key: &[u8] = &spki.subject_public_key.data;

    match spki.algorithm.algorithm.to_id_string().as_str() {
        OID_ED25519 => Some(
            Ed25519KeyPair::from_pkcs8_maybe_unchecked(pkcs8)
                .map(|pair| pair.public_key().as_ref() == public_key)
                .unwrap_or(false),
        ),
        OID_EC_PUBLIC_KEY => {
            let rng = SystemRandom::new();
            for algorithm in [&ECDSA_P256_SHA256_ASN1_SIGNING, &ECDSA_P384_SHA384_ASN1_SIGNING] {
                if let Ok(pair) = EcdsaKeyPair::from_pkcs8(algorithm, pkcs8, &rng) {
                    return Some(pair.public_key().as_ref() == public_key);
                }
            }
            Some(false)
        }
        OID_RSA_ENCRYPTION => Some(
            RsaKeyPair::from_pkcs8(pkcs8)
                .map(|pair| pair.public().as_ref() == public_key)
                .unwrap_or(false),
        ),
        _ => None,
    }
}
