// ============================================================================
// src/util/tree.rs – Directory tree copy for module installation
// ============================================================================

use crate::error::{PatchError, PatchResult};
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Recursively copy `src` onto `dst`, overwriting files that already exist.
/// Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> PatchResult<usize> {
    if !src.is_dir() {
        return Err(PatchError::io(
            "copy module tree from",
            src,
            io::Error::new(io::ErrorKind::NotFound, "source is not a directory"),
        ));
    }

    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            PatchError::io("walk", path, io::Error::other(e.to_string()))
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| PatchError::io("relativise", entry.path(), io::Error::other(e)))?;
        let target = dst.join(rel);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| PatchError::io("create", &target, e))?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())
                .map_err(|e| PatchError::io("read link", entry.path(), e))?;
            if fs::symlink_metadata(&target).is_ok() {
                fs::remove_file(&target).map_err(|e| PatchError::io("replace", &target, e))?;
            }
            std::os::unix::fs::symlink(&link, &target)
                .map_err(|e| PatchError::io("symlink", &target, e))?;
            copied += 1;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| PatchError::io("copy to", &target, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}
