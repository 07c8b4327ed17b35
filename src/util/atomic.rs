// ============================================================================
// src/util/atomic.rs – Durable atomic replacement of system files
// ============================================================================

use crate::error::{PatchError, PatchResult};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

fn parent_dir(path: &Path) -> PatchResult<PathBuf> {
    path.parent().map(Path::to_path_buf).ok_or_else(|| {
        PatchError::io(
            "resolve parent of",
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory"),
        )
    })
}

/// Fsync a directory so the rename itself is persisted.
fn fsync_dir(dir: &Path) -> PatchResult<()> {
    let f = File::open(dir).map_err(|e| PatchError::io("open directory", dir, e))?;
    f.sync_all()
        .map_err(|e| PatchError::io("fsync directory", dir, e))
}

/// Refuse to write through a symlink at the destination.
fn reject_symlink_target(path: &Path) -> PatchResult<()> {
    if let Ok(meta) = fs::symlink_metadata(path) {
        if meta.file_type().is_symlink() {
            return Err(PatchError::io(
                "refusing to replace symlink",
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "destination is a symlink"),
            ));
        }
    }
    Ok(())
}

/// Write `bytes` to a temp file beside `path`, fsync, rename into place, then
/// fsync the directory. `mode` is applied exactly (umask ignored).
pub fn atomic_write_bytes(path: &Path, bytes: &[u8], mode: u32) -> PatchResult<()> {
    reject_symlink_target(path)?;
    let dir = parent_dir(path)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            PatchError::io(
                "resolve file name of",
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;

    let mut tmp = dir.join(format!("{file_name}.tmp-{}", nanoid::nanoid!(8)));
    for _ in 0..8 {
        if !tmp.exists() {
            break;
        }
        tmp.set_file_name(format!("{file_name}.tmp-{}", nanoid::nanoid!(8)));
    }

    let mut f = OpenOptions::new()
        .create_new(true)
        .write(true)
        .mode(mode)
        .open(&tmp)
        .map_err(|e| PatchError::io("create temp file", &tmp, e))?;

    let written = f
        .write_all(bytes)
        .and_then(|_| f.sync_all())
        .map_err(|e| PatchError::io("write temp file", &tmp, e));
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }

    fs::set_permissions(&tmp, fs::Permissions::from_mode(mode))
        .map_err(|e| PatchError::io("set permissions on", &tmp, e))?;

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(PatchError::io("rename into place", path, e));
    }

    fsync_dir(&dir)
}

/// Permission bits of an existing file, falling back to 0644.
pub fn existing_mode(path: &Path) -> u32 {
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o7777)
        .unwrap_or(0o644)
}
