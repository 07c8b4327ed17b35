// ============================================================================
// src/dracut/legacy.rs – Revert the old in-place 90crypt patch
// ============================================================================
//
// The boot artifacts (initramfs image, grub.cfg) only change in the final
// regeneration step, so an interruption earlier leaves the machine booting
// exactly as before. Configuration edits run before the `.orig` restores so
// that a rerun after a crash still classifies as legacy-patched and resumes.

use crate::error::{PatchError, PatchResult};
use crate::grub;
use crate::host::Host;
use crate::util::atomic::atomic_write_bytes;
use crate::util::textpatch::LinePatch;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEBUG_CMDLINE: &str = "GRUB_CMDLINE_LINUX+=\" rd.debug\"";

#[derive(Debug, Clone, Default, Serialize)]
pub struct LegacyRemoval {
    pub grub_defaults_changed: bool,
    pub crypttab_changed: bool,
    pub restored: Vec<PathBuf>,
    /// Scripts whose `.orig` was already gone or could not be moved back.
    pub skipped: Vec<PathBuf>,
}

fn legacy_uuid_arg(mapping: &str) -> String {
    format!("rd.luks.uuid={mapping}")
}

/// Header-backed fallback entry so the mapping still opens with a passphrase.
pub fn fallback_crypttab_entry(mapping: &str) -> String {
    format!("{mapping} UUID={mapping}-locked none discard,header=/osluksheader")
}

/// Undo the legacy patch and regenerate initramfs plus grub.cfg.
/// Completing means a rebuild has happened and classification moves on.
pub fn remove(host: &Host<'_>) -> PatchResult<LegacyRemoval> {
    info!("removing legacy 90crypt patch and recreating initramfs");
    let layout = host.layout;
    let mapping = layout.mapping_name();
    let mut report = LegacyRemoval::default();

    let grub_defaults = layout.grub_defaults();
    let grub_patch = LinePatch::new()
        .delete_matching(legacy_uuid_arg(mapping))
        .append_line(DEBUG_CMDLINE);
    match grub_patch.apply(&grub_defaults) {
        Ok(outcome) => report.grub_defaults_changed = outcome.changed,
        Err(err) if err.is_not_found() => {
            warn!(path = %grub_defaults.display(), "grub defaults missing; skipping cmdline cleanup")
        }
        Err(err) => return Err(err),
    }

    let crypttab = layout.crypttab();
    ensure_exists(&crypttab, 0o600)?;
    report.crypttab_changed = LinePatch::new()
        .append_line(fallback_crypttab_entry(mapping))
        .apply(&crypttab)?
        .changed;

    for (script, orig) in layout.legacy_script_pairs() {
        if restore_original(&orig, &script) {
            report.restored.push(script);
        } else {
            report.skipped.push(script);
        }
    }
    host.audit(
        "LEGACY_REVERTED",
        &format!(
            "restored={} skipped={}",
            report.restored.len(),
            report.skipped.len()
        ),
    );

    host.mutate(&host.tools.dracut, ["-f", "-v"])?;
    grub::regenerate_config(host)?;
    host.audit("LEGACY_REBUILT", "dracut -f -v; grub2-mkconfig");

    Ok(report)
}

/// Move `orig` back over `script`. Failures are logged, not fatal, so a
/// partially reverted system can still be walked forward.
fn restore_original(orig: &Path, script: &Path) -> bool {
    if !orig.exists() {
        info!(path = %orig.display(), "backup already gone; nothing to restore");
        return false;
    }
    match fs::rename(orig, script) {
        Ok(()) => {
            info!(path = %script.display(), "restored stock script");
            true
        }
        Err(err) => {
            warn!(path = %orig.display(), %err, "could not restore stock script");
            false
        }
    }
}

fn ensure_exists(path: &Path, mode: u32) -> PatchResult<()> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => atomic_write_bytes(path, b"", mode),
        Err(e) => Err(PatchError::io("stat", path, e)),
    }
}
