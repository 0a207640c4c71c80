//! # Error Types
//!
//! Top-level error taxonomy for vault access, format conversion, local stores
//! and hooks.

use std::path::PathBuf;

use super::format::FormatError;

/// Custom result type for certsync operations
pub type Result<T> = std::result::Result<T, CertsyncError>;

/// Main error type for certsync
#[derive(thiserror::Error, Debug)]
pub enum CertsyncError {
    /// No vault credential could be acquired
    #[error("Credential unavailable: {message}")]
    CredentialUnavailable { message: String },

    /// The vault rejected a request or could not be reached
    #[error("Vault request failed: {message}")]
    RemoteRequestFailed { message: String, status: Option<u16> },

    /// Certificate material could not be converted
    #[error(transparent)]
    Format(#[from] FormatError),

    /// A local certificate store operation failed
    #[error("Local store error: {message}")]
    LocalStore {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A hook command could not be started
    #[error("Failed to start hook '{command}': {source}")]
    HookStartFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A hook command exited with a nonzero status
    #[error("Hook '{command}' exited with code {code}")]
    HookNonZeroExit { command: String, code: i32 },

    /// Requested certificate names were not found in the vault
    #[error("Certificates not found: {}", names.join(", "))]
    MissingCertificates { names: Vec<String> },

    /// A single named resource does not exist
    #[error("{resource_type} '{name}' not found")]
    NotFound { resource_type: String, name: String },

    /// Invalid invocation or configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O errors with additional context
    #[error("I/O error: {context}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}: {source}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },
}

impl CertsyncError {
    /// Create a credential error
    pub fn credential_unavailable<S: Into<String>>(message: S) -> Self {
        Self::CredentialUnavailable { message: message.into() }
    }

    /// Create a transport error without an HTTP status
    pub fn remote<S: Into<String>>(message: S) -> Self {
        Self::RemoteRequestFailed { message: message.into(), status: None }
    }

    /// Create a transport error carrying the HTTP status
    pub fn remote_status<S: Into<String>>(status: u16, message: S) -> Self {
        Self::RemoteRequestFailed { message: message.into(), status: Some(status) }
    }

    /// Create a local store error
    pub fn local_store<S: Into<String>>(message: S) -> Self {
        Self::LocalStore { message: message.into(), source: None }
    }

    /// Create a local store error with a source
    pub fn local_store_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::LocalStore { message: message.into(), source: Some(source) }
    }

    /// Create a not-found error
    pub fn not_found<R: Into<String>, N: Into<String>>(resource_type: R, name: N) -> Self {
        Self::NotFound { resource_type: resource_type.into(), name: name.into() }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an I/O error with context
    pub fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Io { source, context: context.into() }
    }

    /// Create an I/O error naming the path involved
    pub fn io_path(action: &str, path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io { source, context: format!("{} {}", action, path.display()) }
    }

    /// Create a serialization error with context
    pub fn serialization<S: Into<String>>(context: S, source: serde_json::Error) -> Self {
        Self::Serialization { source, context: context.into() }
    }

    /// Errors that abort the whole batch rather than a single certificate
    pub fn is_fatal(&self) -> bool {
        matches!(self, CertsyncError::CredentialUnavailable { .. })
    }

    /// Path-typed helper for store errors naming a file
    pub fn write_failed(path: PathBuf, source: std::io::Error) -> Self {
        Self::LocalStore {
            message: format!("Failed to write {}", path.display()),
            source: Some(Box::new(source)),
        }
    }
}

impl From<std::io::Error> for CertsyncError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for CertsyncError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}
