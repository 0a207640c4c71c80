//! Delete a certificate's backing secret from the vault.

use std::sync::Arc;

use tracing::info;

use crate::domain::CertificateIdentity;
use crate::errors::{CertsyncError, Result};
use crate::vault::{CertificateCatalog, CertificateVault};

/// Resolve `name` and delete the secret behind it. Returns the deleted identity.
pub async fn delete_certificate(
    vault: Arc<dyn CertificateVault>,
    name: &str,
) -> Result<CertificateIdentity> {
    let catalog = CertificateCatalog::load(vault.as_ref()).await?;
    let identity = catalog
        .find_by_name(name)
        .cloned()
        .ok_or_else(|| CertsyncError::not_found("Certificate", name))?;

    vault.delete_secret(&identity.secret_name).await?;
    info!(certificate = %name, secret = %identity.secret_name, "Deleted certificate");
    Ok(identity)
}
