//! Certificate identities resolved from vault metadata.

use tracing::{debug, error};

use super::client::{CertificateVault, SecretProperties};
use crate::domain::{names_equal, CertificateIdentity};
use crate::errors::{CertsyncError, Result};

/// Identity list built once per invocation.
#[derive(Debug, Clone, Default)]
pub struct CertificateCatalog {
    identities: Vec<CertificateIdentity>,
}

impl CertificateCatalog {
    /// List the vault's secrets and derive an identity from each.
    pub async fn load(vault: &dyn CertificateVault) -> Result<Self> {
        let properties = vault.list_secret_properties().await?;
        debug!(vault = %vault.name(), secrets = properties.len(), "Listed vault secrets");
        Ok(Self::from_properties(&properties))
    }

    pub fn from_properties(properties: &[SecretProperties]) -> Self {
        let identities = properties.iter().map(identity_from_properties).collect();
        Self { identities }
    }

    pub fn from_identities(identities: Vec<CertificateIdentity>) -> Self {
        Self { identities }
    }

    /// Every identity, including secrets that carry no certificate name.
    pub fn list_identities(&self) -> &[CertificateIdentity] {
        &self.identities
    }

    /// Resolve a comma-separated name filter.
    ///
    /// An absent or blank filter selects every identity that has a
    /// certificate name. Otherwise each requested name must match at least one
    /// identity (case-insensitively); if any do not, the call fails with every
    /// missing name and nothing is returned.
    pub fn find_by_names(&self, filter: Option<&str>) -> Result<Vec<CertificateIdentity>> {
        let names = parse_name_filter(filter);

        if names.is_empty() {
            return Ok(self
                .identities
                .iter()
                .filter(|identity| identity.certificate_name.is_some())
                .cloned()
                .collect());
        }

        let missing: Vec<String> = names
            .iter()
            .filter(|name| !self.identities.iter().any(|identity| identity.matches_name(name)))
            .map(|name| name.to_string())
            .collect();

        if !missing.is_empty() {
            error!(names = ?missing, "Vault does not contain certificates with these names");
            return Err(CertsyncError::MissingCertificates { names: missing });
        }

        Ok(self
            .identities
            .iter()
            .filter(|identity| names.iter().any(|name| identity.matches_name(name)))
            .cloned()
            .collect())
    }

    pub fn find_by_name(&self, name: &str) -> Option<&CertificateIdentity> {
        self.identities.iter().find(|identity| identity.matches_name(name.trim()))
    }
}

fn identity_from_properties(properties: &SecretProperties) -> CertificateIdentity {
    CertificateIdentity::from_metadata(
        properties.id.clone(),
        properties.name.clone(),
        properties.version.clone(),
        properties.not_before,
        properties.expires_on,
        &properties.tags,
    )
}

/// Trimmed, non-empty entries of a comma-separated list, first occurrence
/// kept when names repeat (ignoring case).
pub fn parse_name_filter(filter: Option<&str>) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for name in filter.unwrap_or_default().split(',').map(str::trim) {
        if !name.is_empty() && !names.iter().any(|seen| names_equal(seen, name)) {
            names.push(name);
        }
    }
    names
}
