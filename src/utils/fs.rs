//! File writing helpers.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::errors::{CertsyncError, Result};

/// Write `contents` to `path`, replacing it. With `private`, the file is
/// owner read/write only on Unix, including when it already existed.
pub fn write_file(path: &Path, contents: &[u8], private: bool) -> Result<()> {
    let write = || -> std::io::Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);

        #[cfg(unix)]
        if private {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path)?;

        #[cfg(unix)]
        if private {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        file.write_all(contents)?;
        file.flush()
    };

    write().map_err(|e| CertsyncError::write_failed(path.to_path_buf(), e))?;
    tracing::debug!(path = %path.display(), private, "Wrote file");
    Ok(())
}
