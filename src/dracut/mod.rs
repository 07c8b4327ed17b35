// ============================================================================
// src/dracut/mod.rs – Initramfs module tree: classification and rebuild
// ============================================================================

pub mod legacy;
pub mod unlock;

use crate::error::{PatchError, PatchResult};
use crate::host::Host;
use crate::layout::SystemLayout;
use serde::Serialize;
use std::fs;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootModuleState {
    /// All three 90crypt scripts carry a `.orig` backup from the old patch.
    LegacyPatched,
    Unpatched,
    /// The unlock module directory is installed and no legacy marker remains.
    ModulePresent,
    /// No dracut module tree at all.
    Missing,
}

impl BootModuleState {
    pub fn label(self) -> &'static str {
        match self {
            BootModuleState::LegacyPatched => "legacy-patched",
            BootModuleState::Unpatched => "unpatched",
            BootModuleState::ModulePresent => "module-present",
            BootModuleState::Missing => "missing",
        }
    }
}

/// How many of the three legacy `.orig` markers exist.
pub fn legacy_markers_present(layout: &SystemLayout) -> usize {
    layout
        .legacy_script_pairs()
        .iter()
        .filter(|(_, orig)| orig.exists())
        .count()
}

/// Pure existence checks; never fails.
pub fn classify(layout: &SystemLayout) -> BootModuleState {
    if !layout.modules_dir().is_dir() {
        return BootModuleState::Missing;
    }
    match legacy_markers_present(layout) {
        3 => BootModuleState::LegacyPatched,
        0 if layout.unlock_module_dir().is_dir() => BootModuleState::ModulePresent,
        _ => BootModuleState::Unpatched,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotResolution {
    /// 90lvm already existed, so the duplicate 91lvm was deleted.
    RemovedLegacy,
    /// 91lvm was moved into the free 90lvm slot.
    RenamedLegacy,
}

/// A 91lvm module alongside 90lvm breaks the initramfs build. Exactly one of
/// delete or rename runs whenever 91lvm exists.
pub fn resolve_lvm_slot_conflict(layout: &SystemLayout) -> PatchResult<Option<SlotResolution>> {
    let legacy = layout.lvm_legacy_slot();
    if !legacy.is_dir() {
        return Ok(None);
    }

    let preferred = layout.lvm_preferred_slot();
    if preferred.exists() {
        fs::remove_dir_all(&legacy).map_err(|e| PatchError::io("remove", &legacy, e))?;
        info!(path = %legacy.display(), "removed duplicate lvm module");
        Ok(Some(SlotResolution::RemovedLegacy))
    } else {
        fs::rename(&legacy, &preferred).map_err(|e| PatchError::io("rename", &legacy, e))?;
        info!(from = %legacy.display(), to = %preferred.display(), "moved lvm module slot");
        Ok(Some(SlotResolution::RenamedLegacy))
    }
}

/// Delete an installed unlock module that has no open mapping to bind to.
pub fn remove_installed_module(layout: &SystemLayout) -> PatchResult<bool> {
    let dir = layout.unlock_module_dir();
    if !dir.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(&dir).map_err(|e| PatchError::io("remove", &dir, e))?;
    info!(path = %dir.display(), "removed installed unlock module");
    Ok(true)
}

/// Kernel release the rebuilt image is pinned to.
pub fn running_kernel(layout: &SystemLayout) -> PatchResult<String> {
    let path = layout.kernel_release();
    let kver = fs::read_to_string(&path)
        .map_err(|e| PatchError::io("read kernel release", &path, e))?
        .trim()
        .to_string();
    if kver.is_empty() {
        return Err(PatchError::Config(format!("{} is empty", path.display())));
    }
    Ok(kver)
}

/// One `dracut -f -v --kver <running kernel>`; returns the kernel version.
pub fn rebuild_initramfs(host: &Host<'_>) -> PatchResult<String> {
    let kver = running_kernel(host.layout)?;
    info!(kver = %kver, "rebuilding initramfs");
    host.mutate(&host.tools.dracut, ["-f", "-v", "--kver", kver.as_str()])
        .inspect_err(|err| warn!(%err, "initramfs rebuild failed"))?;
    host.audit("INITRD_REBUILT", &format!("kver={kver}"));
    Ok(kver)
}
