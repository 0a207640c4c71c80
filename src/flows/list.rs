//! List certificates held in the vault.

use std::sync::Arc;

use crate::domain::CertificateIdentity;
use crate::errors::Result;
use crate::vault::{CertificateCatalog, CertificateVault};

/// Identities matching `names` (all named certificates when `None`).
/// Unknown names fail with `MissingCertificates`.
pub async fn list_certificates(
    vault: Arc<dyn CertificateVault>,
    names: Option<&str>,
) -> Result<Vec<CertificateIdentity>> {
    let catalog = CertificateCatalog::load(vault.as_ref()).await?;
    let mut identities = catalog.find_by_names(names)?;
    identities.sort_by_key(|identity| identity.display_name().to_lowercase());
    tracing::debug!(vault = %vault.name(), count = identities.len(), "Listed certificates");
    Ok(identities)
}
