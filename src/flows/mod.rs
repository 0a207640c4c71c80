//! # Flows
//!
//! One module per CLI verb. Flows take their vault and store as trait
//! objects so the CLI and the tests wire them the same way.

pub mod automation;
pub mod delete;
pub mod download;
pub mod list;
pub mod sync;
pub mod upload;

pub use automation::{AutomationConfigManager, DownloadConfig, PersistedDownloadConfig};
pub use delete::delete_certificate;
pub use download::{open_store, DownloadFlow, DownloadOutcome};
pub use list::list_certificates;
pub use sync::replay_all;
pub use upload::{UploadConfig, UploadFlow, UploadOutcome};
