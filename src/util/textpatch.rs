// ============================================================================
// src/util/textpatch.rs – Line-oriented in-place edits with `.bak` backups
// ============================================================================

use crate::error::{PatchError, PatchResult};
use crate::util::atomic::{atomic_write_bytes, existing_mode};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An edit applied line by line: delete, then substitute, then append.
#[derive(Debug, Clone, Default)]
pub struct LinePatch {
    deletes: Vec<String>,
    replacements: Vec<(String, String)>,
    appends: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub changed: bool,
    /// Copy of the pre-edit bytes; only written when the file changed.
    pub backup: Option<PathBuf>,
}

impl LinePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every line containing `needle`.
    pub fn delete_matching(mut self, needle: impl Into<String>) -> Self {
        self.deletes.push(needle.into());
        self
    }

    /// Replace the first occurrence of `placeholder` on each line.
    pub fn replace_first_per_line(
        mut self,
        placeholder: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.replacements.push((placeholder.into(), value.into()));
        self
    }

    /// Append `line` unless an identical line is already present.
    pub fn append_line(mut self, line: impl Into<String>) -> Self {
        self.appends.push(line.into());
        self
    }

    /// Works on raw byte lines: bytes outside the matched lines are carried
    /// over untouched, whatever their encoding.
    pub fn render(&self, original: &[u8]) -> Vec<u8> {
        let mut lines: Vec<Vec<u8>> = split_lines(original)
            .filter(|line| {
                !self
                    .deletes
                    .iter()
                    .any(|needle| find(line, needle.as_bytes()).is_some())
            })
            .map(|line| {
                let mut line = line.to_vec();
                for (placeholder, value) in &self.replacements {
                    if let Some(at) = find(&line, placeholder.as_bytes()) {
                        let tail = line.split_off(at + placeholder.len());
                        line.truncate(at);
                        line.extend_from_slice(value.as_bytes());
                        line.extend_from_slice(&tail);
                    }
                }
                line
            })
            .collect();

        let mut appended = false;
        for extra in &self.appends {
            if !lines.iter().any(|l| l == extra.as_bytes()) {
                lines.push(extra.as_bytes().to_vec());
                appended = true;
            }
        }

        if lines.is_empty() {
            return Vec::new();
        }
        let mut out = lines.join(&b'\n');
        if original.ends_with(b"\n") || appended {
            out.push(b'\n');
        }
        out
    }

    /// Rewrite `path` atomically, leaving `<path>.bak` with the pre-edit bytes.
    pub fn apply(&self, path: &Path) -> PatchResult<PatchOutcome> {
        let original = fs::read(path).map_err(|e| PatchError::io("read", path, e))?;
        let patched = self.render(&original);

        if patched == original {
            debug!(path = %path.display(), "line patch is a no-op");
            return Ok(PatchOutcome {
                changed: false,
                backup: None,
            });
        }

        let mode = existing_mode(path);
        let backup = backup_path(path);
        atomic_write_bytes(&backup, &original, mode)?;
        atomic_write_bytes(path, &patched, mode)?;
        debug!(path = %path.display(), backup = %backup.display(), "line patch applied");

        Ok(PatchOutcome {
            changed: true,
            backup: Some(backup),
        })
    }
}

fn split_lines(text: &[u8]) -> impl Iterator<Item = &[u8]> {
    let body = text.strip_suffix(b"\n").unwrap_or(text);
    body.split(|b| *b == b'\n').filter(move |_| !text.is_empty())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}
