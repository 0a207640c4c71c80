use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use tempfile::TempDir;

use certsync::convert::{certificate_info, thumbprint, PKCS12_CONTENT_TYPE};
use certsync::domain::{
    FileTypeSet, CERTIFICATE_ID_TAG, CERTIFICATE_STATE_TAG, SERIAL_NUMBER_TAG, THUMBPRINT_TAG,
};
use certsync::flows::DownloadConfig;
use certsync::vault::{CertificateVault, MemoryVault, SecretString, SecretWrite};

pub const TEST_VAULT: &str = "demo";

/// Root CA → intermediate CA → leaf, all ECDSA P-256.
pub struct TestChain {
    pub root_der: Vec<u8>,
    pub intermediate_der: Vec<u8>,
    pub leaf_der: Vec<u8>,
    pub leaf_key_der: Vec<u8>,
    pub root_pem: String,
    pub intermediate_pem: String,
    pub leaf_pem: String,
    pub leaf_key_pem: String,
}

impl TestChain {
    pub fn generate(name: &str) -> anyhow::Result<Self> {
        let root_key = KeyPair::generate().context("generate root key")?;
        let mut root_params = CertificateParams::new(Vec::<String>::new()).context("root params")?;
        root_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        root_params.distinguished_name.push(DnType::CommonName, format!("{} Test Root", name));
        root_params.not_before = rcgen::date_time_ymd(2024, 1, 1);
        root_params.not_after = rcgen::date_time_ymd(2034, 1, 1);
        let root = root_params.self_signed(&root_key).context("self-sign root")?;

        let intermediate_key = KeyPair::generate().context("generate intermediate key")?;
        let mut intermediate_params =
            CertificateParams::new(Vec::<String>::new()).context("intermediate params")?;
        intermediate_params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));
        intermediate_params
            .distinguished_name
            .push(DnType::CommonName, format!("{} Test Intermediate", name));
        intermediate_params.not_before = rcgen::date_time_ymd(2024, 1, 1);
        intermediate_params.not_after = rcgen::date_time_ymd(2033, 1, 1);
        let intermediate = intermediate_params
            .signed_by(&intermediate_key, &root, &root_key)
            .context("sign intermediate")?;

        let leaf_key = KeyPair::generate().context("generate leaf key")?;
        let mut leaf_params =
            CertificateParams::new(vec![format!("{}.certsync.test", name.to_ascii_lowercase())])
                .context("leaf params")?;
        leaf_params.distinguished_name.push(DnType::CommonName, format!("{}.certsync.test", name));
        leaf_params.not_before = rcgen::date_time_ymd(2024, 6, 1);
        leaf_params.not_after = rcgen::date_time_ymd(2032, 6, 1);
        let leaf = leaf_params
            .signed_by(&leaf_key, &intermediate, &intermediate_key)
            .context("sign leaf")?;

        Ok(Self {
            root_der: root.der().to_vec(),
            intermediate_der: intermediate.der().to_vec(),
            leaf_der: leaf.der().to_vec(),
            leaf_key_der: leaf_key.serialize_der(),
            root_pem: root.pem(),
            intermediate_pem: intermediate.pem(),
            leaf_pem: leaf.pem(),
            leaf_key_pem: leaf_key.serialize_pem(),
        })
    }

    pub fn thumbprint(&self) -> String {
        thumbprint(&self.leaf_der)
    }

    /// PKCS#12 container with the CAs ahead of the leaf, empty password.
    pub fn pkcs12(&self) -> anyhow::Result<Vec<u8>> {
        let cas: [&[u8]; 2] = [&self.root_der, &self.intermediate_der];
        let pfx = p12::PFX::new_with_cas(&self.leaf_der, &self.leaf_key_der, &cas, "", "leaf")
            .context("build PKCS#12")?;
        Ok(pfx.to_der())
    }

    /// Write cert/key/chain PEM files for the upload flow.
    pub fn write_pem_files(&self, dir: &Path) -> anyhow::Result<PemFiles> {
        let files = PemFiles {
            certificate: dir.join("cert.pem"),
            private_key: dir.join("privkey.pem"),
            chain: dir.join("chain.pem"),
        };
        fs::write(&files.certificate, &self.leaf_pem).context("write cert")?;
        fs::write(&files.private_key, &self.leaf_key_pem).context("write key")?;
        fs::write(&files.chain, format!("{}{}", self.intermediate_pem, self.root_pem))
            .context("write chain")?;
        Ok(files)
    }
}

pub struct PemFiles {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
    pub chain: PathBuf,
}

/// Store `chain` in `vault` the way Key Vault exposes a certificate's
/// backing secret.
pub async fn seed_certificate(
    vault: &MemoryVault,
    name: &str,
    chain: &TestChain,
) -> anyhow::Result<String> {
    let info = certificate_info(&chain.leaf_der).context("parse leaf")?;
    let secret_name = format!("{}-secret", name);
    let tags = HashMap::from([
        (CERTIFICATE_ID_TAG.to_string(), format!("/certificates/{}", name)),
        (CERTIFICATE_STATE_TAG.to_string(), "Ready".to_string()),
        (SERIAL_NUMBER_TAG.to_string(), info.serial_number.clone()),
        (THUMBPRINT_TAG.to_string(), chain.thumbprint()),
    ]);

    vault
        .set_secret(SecretWrite {
            name: secret_name.clone(),
            value: SecretString::new(STANDARD.encode(chain.pkcs12()?)),
            content_type: Some(PKCS12_CONTENT_TYPE.to_string()),
            not_before: Some(info.not_before),
            expires_on: Some(info.not_after),
            tags,
        })
        .await
        .context("seed secret")?;
    Ok(secret_name)
}

/// A memory vault holding one generated chain per name.
pub async fn seeded_vault(names: &[&str]) -> anyhow::Result<(Arc<MemoryVault>, Vec<TestChain>)> {
    let vault = Arc::new(MemoryVault::new(TEST_VAULT));
    let mut chains = Vec::with_capacity(names.len());
    for name in names {
        let chain = TestChain::generate(name)?;
        seed_certificate(&vault, name, &chain).await?;
        chains.push(chain);
    }
    Ok((vault, chains))
}

/// Download configuration targeting `dir` on the file-tree store.
pub fn file_config(dir: &TempDir, names: Option<&str>, file_types: FileTypeSet) -> DownloadConfig {
    DownloadConfig {
        vault: TEST_VAULT.to_string(),
        names: names.map(str::to_string),
        path: Some(dir.path().to_path_buf()),
        file_types,
        ..DownloadConfig::default()
    }
}

/// Sorted file names directly inside `dir`.
pub fn file_names(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut names = fs::read_dir(dir)
        .with_context(|| format!("read {}", dir.display()))?
        .map(|entry| Ok(entry?.file_name().to_string_lossy().into_owned()))
        .collect::<anyhow::Result<Vec<_>>>()?;
    names.sort();
    Ok(names)
}

/// `/bin/sh` command line running a script in `dir` whose output goes to
/// `<dir>/<name>.out` through `$OUT`.
#[cfg(unix)]
pub fn hook_command(dir: &Path, name: &str, body: &str) -> anyhow::Result<String> {
    let path = dir.join(format!("{}.sh", name));
    let output = dir.join(format!("{}.out", name));
    let script = format!("OUT='{}'\n{}\n", output.display(), body);
    fs::write(&path, script).context("write hook script")?;
    Ok(format!("/bin/sh {}", path.display()))
}
