//! File persistence for the pending-update set.

use crate::common::error::{Error, Result};
use crate::common::updates::UpdateSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::debug;

/// Load the update set saved by a previous run.
///
/// A missing file is a first run and yields an empty set. Anything else
/// that cannot be read or decoded is an error, never an empty set.
pub fn load_updates(path: &Path) -> Result<UpdateSet> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("no update state at {}, starting empty", path.display());
            return Ok(UpdateSet::new());
        }
        Err(e) => return Err(Error::persistence(path, e)),
    };
    let updates: UpdateSet = serde_json::from_slice(&bytes)
        .map_err(|e| Error::persistence(path, format!("undecodable: {}", e)))?;
    debug!("loaded {} pending updates from {}", updates.len(), path.display());
    Ok(updates)
}

/// Overwrite the state file with the full set (truncate and rewrite).
pub fn save_updates(path: &Path, updates: &UpdateSet, file_perms: u32) -> Result<()> {
    let content =
        serde_json::to_vec_pretty(updates).map_err(|e| Error::persistence(path, e))?;

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(file_perms);
    }
    #[cfg(not(unix))]
    let _ = file_perms;

    let mut file = options
        .open(path)
        .map_err(|e| Error::persistence(path, e))?;
    // The open mode only applies to a newly created file.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(file_perms))
            .map_err(|e| Error::persistence(path, e))?;
    }
    file.write_all(&content)
        .and_then(|_| file.write_all(b"\n"))
        .and_then(|_| file.flush())
        .map_err(|e| Error::persistence(path, e))?;
    debug!("saved {} pending updates to {}", updates.len(), path.display());
    Ok(())
}
