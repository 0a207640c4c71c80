//! Output artifact kinds for the file-tree store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One artifact the file-tree store can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Cert,
    PrivKey,
    Chain,
    FullChain,
    FullChainPrivKey,
    Pkcs12,
}

impl FileType {
    pub const ALL: [FileType; 6] = [
        FileType::Cert,
        FileType::PrivKey,
        FileType::Chain,
        FileType::FullChain,
        FileType::FullChainPrivKey,
        FileType::Pkcs12,
    ];

    const fn bit(self) -> u8 {
        match self {
            FileType::Cert => 1,
            FileType::PrivKey => 2,
            FileType::Chain => 4,
            FileType::FullChain => 8,
            FileType::FullChainPrivKey => 16,
            FileType::Pkcs12 => 32,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Cert => "Cert",
            FileType::PrivKey => "PrivKey",
            FileType::Chain => "Chain",
            FileType::FullChain => "FullChain",
            FileType::FullChainPrivKey => "FullChainPrivKey",
            FileType::Pkcs12 => "Pkcs12",
        }
    }

    /// File name inside the certificate directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            FileType::Cert => "cert.pem",
            FileType::PrivKey => "privkey.pem",
            FileType::Chain => "chain.pem",
            FileType::FullChain => "fullchain.pem",
            FileType::FullChainPrivKey => "fullchain.privkey.pem",
            FileType::Pkcs12 => "keystore.pfx",
        }
    }

    /// Kinds that embed the private key and are only written when one exists.
    pub fn carries_private_key(&self) -> bool {
        matches!(self, FileType::PrivKey | FileType::FullChainPrivKey | FileType::Pkcs12)
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Unknown file type '{}'. Expected one of: {}",
                    s.trim(),
                    FileType::ALL.iter().map(FileType::as_str).collect::<Vec<_>>().join(", ")
                )
            })
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of [`FileType`]s, stored as bit flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileTypeSet(u8);

impl FileTypeSet {
    pub const EMPTY: FileTypeSet = FileTypeSet(0);

    /// Every PEM artifact; the PKCS#12 keystore is opt-in.
    pub const DEFAULT: FileTypeSet = FileTypeSet(
        FileType::Cert.bit()
            | FileType::PrivKey.bit()
            | FileType::Chain.bit()
            | FileType::FullChain.bit()
            | FileType::FullChainPrivKey.bit(),
    );

    pub fn contains(&self, kind: FileType) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn insert(&mut self, kind: FileType) {
        self.0 |= kind.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = FileType> + '_ {
        FileType::ALL.into_iter().filter(move |kind| self.contains(*kind))
    }

    /// Whether any configured kind embeds the private key.
    pub fn wants_private_key(&self) -> bool {
        self.iter().any(|kind| kind.carries_private_key())
    }
}

impl Default for FileTypeSet {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromIterator<FileType> for FileTypeSet {
    fn from_iter<I: IntoIterator<Item = FileType>>(iter: I) -> Self {
        let mut set = FileTypeSet::EMPTY;
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// Parses the comma-separated CLI form, e.g. `Cert,FullChain`.
impl FromStr for FileTypeSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let set = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(FileType::from_str)
            .collect::<Result<FileTypeSet, _>>()?;
        if set.is_empty() {
            return Err("At least one file type is required".to_string());
        }
        Ok(set)
    }
}

impl fmt::Display for FileTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|kind| kind.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

impl fmt::Debug for FileTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for FileTypeSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.iter().map(|kind| kind.as_str()))
    }
}

impl<'de> Deserialize<'de> for FileTypeSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let names = Vec::<String>::deserialize(deserializer)?;
        names
            .iter()
            .map(|name| FileType::from_str(name))
            .collect::<Result<FileTypeSet, _>>()
            .map_err(serde::de::Error::custom)
    }
}
