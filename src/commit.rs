//! Backups and atomic replacement of the target file.
//!
//! The target path is never opened for writing. New content goes to a temp
//! file in the same directory which is then renamed over the target, so the
//! file is observably either the old or the new version.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{PatchError, PatchResult};

/// Separator between the original file name and the backup timestamp.
pub const BACKUP_MARKER: &str = ".bak.";

/// What [`commit`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commit {
    /// New content equals the original; nothing was written.
    Unchanged,
    /// The file was replaced. `backup` is `None` when no original existed.
    Written { backup: Option<PathBuf> },
}

/// `<name>.bak.<timestamp>` next to `path`.
pub fn backup_path(path: &Path, timestamp: i64) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!("{}{}", BACKUP_MARKER, timestamp));
    path.with_file_name(name)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Existing backups of `path` with their timestamps, oldest first.
pub fn list_backups(path: &Path) -> io::Result<Vec<(i64, PathBuf)>> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok(Vec::new());
    };
    let prefix = format!("{}{}", name, BACKUP_MARKER);

    let mut backups = Vec::new();
    for entry in fs::read_dir(parent_dir(path))? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(stamp) = file_name.to_str().and_then(|n| n.strip_prefix(prefix.as_str())) else {
            continue;
        };
        if let Ok(timestamp) = stamp.parse::<i64>() {
            backups.push((timestamp, entry.path()));
        }
    }
    backups.sort();
    Ok(backups)
}

/// Copy `path` to a fresh backup and return the backup's path.
///
/// The timestamp is the current Unix time, raised past the newest existing
/// backup so names only ever increase and an existing backup is never replaced.
pub fn backup(path: &Path) -> io::Result<PathBuf> {
    let now = chrono::Utc::now().timestamp();
    let newest = list_backups(path)?.last().map(|(ts, _)| *ts);
    let mut timestamp = match newest {
        Some(ts) if ts >= now => ts + 1,
        _ => now,
    };
    while backup_path(path, timestamp).exists() {
        timestamp += 1;
    }

    let target = backup_path(path, timestamp);
    // fs::copy carries the permission bits over.
    fs::copy(path, &target)?;
    Ok(target)
}

/// Write `bytes` to a temp file next to `path`, then rename it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8], permissions: Option<fs::Permissions>) -> io::Result<()> {
    let dir = parent_dir(path);
    let mut builder = tempfile::Builder::new();
    builder.prefix(".compose-patch.").suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if permissions.is_none() {
            // Same mode as a plain file creation: 0o666 filtered by the umask.
            builder.permissions(fs::Permissions::from_mode(0o666));
        }
    }
    let mut tmp = builder.tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    if let Some(permissions) = permissions {
        tmp.as_file().set_permissions(permissions)?;
    }
    tmp.persist(path).map_err(|e| e.error)?;

    #[cfg(unix)]
    {
        fs::File::open(dir)?.sync_all()?;
    }
    Ok(())
}

/// Persist `rendered` at `path` if it differs from `original`.
///
/// `original` is the file's previous bytes, or `None` if it did not exist.
/// Identical content writes nothing and takes no backup.
pub fn commit(path: &Path, original: Option<&[u8]>, rendered: &[u8]) -> PatchResult<Commit> {
    if original == Some(rendered) {
        debug!(path = %path.display(), "content unchanged, skipping write");
        return Ok(Commit::Unchanged);
    }

    let write_failure = |source: io::Error| PatchError::WriteFailure {
        path: path.to_path_buf(),
        source,
    };

    let (backup, permissions) = match original {
        Some(_) => {
            let permissions = fs::metadata(path).map_err(write_failure)?.permissions();
            let backup = backup(path).map_err(write_failure)?;
            info!(backup = %backup.display(), "backup written");
            (Some(backup), Some(permissions))
        }
        None => (None, None),
    };

    write_atomic(path, rendered, permissions).map_err(write_failure)?;
    info!(path = %path.display(), bytes = rendered.len(), "document committed");
    Ok(Commit::Written { backup })
}
