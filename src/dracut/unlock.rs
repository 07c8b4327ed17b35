// ============================================================================
// src/dracut/unlock.rs – Install the auto-unlock dracut module
// ============================================================================

use crate::config::UnlockModule;
use crate::error::{PatchError, PatchResult};
use crate::extract::Pattern;
use crate::host::Host;
use crate::layout::SystemLayout;
use crate::util::textpatch::LinePatch;
use crate::util::tree::copy_tree;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct ModuleInstall {
    pub module_dir: PathBuf,
    pub files_copied: usize,
    /// Block device backing the active root mapping.
    pub root_device: String,
    pub partition: String,
    /// A previously installed copy was swapped out.
    pub replaced: bool,
    pub crypttab_changed: bool,
}

/// Only meaningful while the root mapping is open.
pub fn mapping_active(host: &Host<'_>) -> bool {
    host.layout.mapping_node().exists()
}

/// Bind the module's udev rule to the partition that backs the live root
/// mapping, then swap it into modules.d. Both device queries run before
/// modules.d is touched, and the new copy is assembled in a staging sibling,
/// so any failure leaves the installed module exactly as it was.
pub fn install(host: &Host<'_>, module: &UnlockModule) -> PatchResult<ModuleInstall> {
    let layout = host.layout;
    let root_device = root_device(host)?;
    let partition = partition_of(host, &root_device)?;

    let staging = layout.unlock_module_staging_dir();
    let files_copied = stage(&staging, module, &partition, layout)
        .inspect_err(|_| discard(&staging))?;
    info!(
        src = %module.source_dir.display(),
        staging = %staging.display(),
        files = files_copied,
        partition = %partition,
        "staged unlock module"
    );

    let module_dir = layout.unlock_module_dir();
    let replaced = swap_into_place(&staging, &module_dir, layout)?;
    info!(dst = %module_dir.display(), replaced, "installed unlock module");

    // The locked fallback entry would race the module's own unlock.
    let crypttab = layout.crypttab();
    let locked_entry = format!("{}-locked", layout.mapping_name());
    let crypttab_changed = match LinePatch::new().delete_matching(&locked_entry).apply(&crypttab) {
        Ok(outcome) => outcome.changed,
        Err(err) if err.is_not_found() => {
            debug!(path = %crypttab.display(), "no crypttab; nothing to disable");
            false
        }
        Err(err) => return Err(err),
    };

    host.audit(
        "MODULE_INSTALLED",
        &format!("device={root_device} partition={partition}"),
    );

    Ok(ModuleInstall {
        module_dir,
        files_copied,
        root_device,
        partition,
        replaced,
        crypttab_changed,
    })
}

fn stage(
    staging: &Path,
    module: &UnlockModule,
    partition: &str,
    layout: &SystemLayout,
) -> PatchResult<usize> {
    discard(staging);
    let files_copied = copy_tree(&module.source_dir, staging)?;
    let rule = staging.join(layout.udev_rule().file_name().unwrap_or_default());
    let bound = LinePatch::new()
        .replace_first_per_line(&module.partition_placeholder, partition)
        .apply(&rule)?;
    if !bound.changed {
        return Err(PatchError::Config(format!(
            "{} has no {} placeholder",
            rule.display(),
            module.partition_placeholder
        )));
    }
    Ok(files_copied)
}

/// Park the live module, move the staged copy in, then drop the parked one.
/// If the move fails the parked module is put back.
fn swap_into_place(staging: &Path, module_dir: &Path, layout: &SystemLayout) -> PatchResult<bool> {
    let retired = layout.unlock_module_retired_dir();
    discard(&retired);
    let replaced = module_dir.exists();
    if replaced {
        fs::rename(module_dir, &retired).map_err(|e| PatchError::io("retire", module_dir, e))?;
    }
    if let Err(e) = fs::rename(staging, module_dir) {
        if replaced {
            if let Err(undo) = fs::rename(&retired, module_dir) {
                warn!(path = %retired.display(), %undo, "could not restore previous module");
            }
        }
        discard(staging);
        return Err(PatchError::io("install", module_dir, e));
    }
    discard(&retired);
    Ok(replaced)
}

fn discard(dir: &Path) {
    if dir.exists() {
        if let Err(err) = fs::remove_dir_all(dir) {
            warn!(path = %dir.display(), %err, "could not remove leftover module copy");
        }
    }
}

fn root_device(host: &Host<'_>) -> PatchResult<String> {
    let mapping = host.layout.mapping_name();
    let args = ["status", mapping];
    let out = host.query(&host.tools.cryptsetup, args)?;
    let command = format!("{} status {mapping}", host.tools.cryptsetup.display());
    let found = Pattern::marker("device:")?.extract(&out.stdout, &command)?;
    if found.is_ambiguous() {
        warn!(matches = found.match_count, device = %found.value, "several devices reported; using the first");
    }
    Ok(found.value)
}

fn partition_of(host: &Host<'_>, device: &str) -> PatchResult<String> {
    let name_arg = format!("--name={device}");
    let out = host.query_checked(
        &host.tools.udevadm,
        ["info", "--attribute-walk", name_arg.as_str()],
    )?;
    let command = format!(
        "{} info --attribute-walk {name_arg}",
        host.tools.udevadm.display()
    );
    let found = Pattern::quoted_attribute("partition")?.extract(&out.stdout, &command)?;
    if found.is_ambiguous() {
        warn!(matches = found.match_count, partition = %found.value, "several partitions reported; using the first");
    }
    Ok(found.value)
}
