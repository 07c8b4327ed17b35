// ============================================================================
// src/util/audit.rs – Minimal append-only audit trail
// ============================================================================

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tracing::debug;

/// Append a timestamped event to the audit log (0600 permissions).
/// Failure to write is logged and swallowed; it never blocks patching.
pub fn audit_log(log_path: &Path, event: &str, detail: &str) {
    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    match OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o600)
        .open(log_path)
    {
        Ok(mut file) => {
            let ts = Local::now().format("%Y-%m-%d %H:%M:%S");
            let _ = writeln!(file, "[{ts}] {event}: {detail}");
        }
        Err(err) => debug!(path = %log_path.display(), %err, "audit log unwritable"),
    }
}
