//! Domain layer
//!
//! Value types shared by the vault, store and flow layers. Nothing here
//! performs I/O.
//!
//! - `identity`: certificate identity derived from vault secret metadata
//! - `file_type`: output artifact kinds for the file-tree store
//! - `result`: per-certificate sync outcome

pub mod file_type;
pub mod identity;
pub mod result;

pub use file_type::{FileType, FileTypeSet};
pub use identity::{
    names_equal, CertificateIdentity, CERTIFICATE_ID_TAG, CERTIFICATE_STATE_TAG, SERIAL_NUMBER_TAG,
    THUMBPRINT_TAG,
};
pub use result::{SyncResult, SyncStatus};
