//! Static snapshot file I/O.
//!
//! Reads parse the whole file. Writes serialize the whole file pretty-printed
//! to a temp file and rename it over the target, after copying the previous
//! version into the backup directory. An interrupted write therefore leaves
//! either the old file or the new one, and the old one is always recoverable
//! from the backup.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument};

use contentsync_shared::{ContentSyncError, Result, Snapshot};

/// Outcome of a snapshot write.
#[derive(Debug, Clone)]
pub struct SnapshotWrite {
    /// File that was replaced.
    pub path: PathBuf,
    /// Backup of the previous version, if there was one.
    pub backup: Option<PathBuf>,
    /// Bytes written.
    pub bytes: usize,
}

/// Parse a snapshot file. A missing file is a config error.
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    if !path.is_file() {
        return Err(ContentSyncError::config(format!(
            "snapshot file not found at '{}'",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| ContentSyncError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        ContentSyncError::Snapshot(format!("invalid snapshot {}: {e}", path.display()))
    })
}

/// Copy `path` into `backup_dir` under a timestamped name.
///
/// Returns `None` when there is nothing to back up.
pub fn backup_file(path: &Path, backup_dir: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }

    std::fs::create_dir_all(backup_dir).map_err(|e| ContentSyncError::io(backup_dir, e))?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "snapshot".into());
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "json".into());
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let target = backup_dir.join(format!("{stem}.{stamp}.{ext}"));

    std::fs::copy(path, &target).map_err(|e| ContentSyncError::io(&target, e))?;
    debug!(from = %path.display(), to = %target.display(), "backup written");

    Ok(Some(target))
}

/// Serialize `data` pretty-printed and atomically replace `path` with it.
///
/// Returns the number of bytes written.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<usize> {
    let json = serde_json::to_string_pretty(data).map_err(|e| {
        ContentSyncError::validation(format!("JSON serialization failed: {e}"))
    })?;
    write_atomic(path, json.as_bytes())?;
    Ok(json.len())
}

/// Write bytes to a sibling temp file, then rename over `path`.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent).map_err(|e| ContentSyncError::io(parent, e))?;
    }

    let filename = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "snapshot.json".into());
    let temp = path.with_file_name(format!(".{filename}.tmp"));

    std::fs::write(&temp, content).map_err(|e| ContentSyncError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| ContentSyncError::io(path, e))?;
    Ok(())
}

/// Back up the current snapshot, then replace it with `snapshot`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn write_snapshot(path: &Path, backup_dir: &Path, snapshot: &Snapshot) -> Result<SnapshotWrite> {
    let backup = backup_file(path, backup_dir)?;
    let bytes = write_json_atomic(path, snapshot)?;

    info!(
        bytes,
        backup = backup.as_ref().map(|b| b.display().to_string()),
        "snapshot written"
    );

    Ok(SnapshotWrite {
        path: path.to_path_buf(),
        backup,
        bytes,
    })
}
