// ============================================================================
// src/layout.rs – Well-known filesystem locations, anchored at a root prefix
// ============================================================================

use crate::config::Config;
use std::path::{Path, PathBuf};

const DRACUT_MODULES_DIR: &str = "lib/dracut/modules.d";
const CRYPT_MODULE: &str = "90crypt";
const LVM_PREFERRED_SLOT: &str = "90lvm";
const LVM_LEGACY_SLOT: &str = "91lvm";
const GRUB_DEFAULTS: &str = "etc/default/grub";
const CRYPTTAB: &str = "etc/crypttab";
const KERNEL_RELEASE: &str = "proc/sys/kernel/osrelease";
const PRIMARY_GRUB_CFG: &str = "boot/grub2/grub.cfg";
const AUDIT_LOG: &str = "var/log/bootpatch.log";

/// The three 90crypt scripts the legacy patch rewrote (each left a `.orig`).
pub const LEGACY_PATCHED_SCRIPTS: [&str; 3] =
    ["cryptroot-ask.sh", "module-setup.sh", "parse-crypt.sh"];

/// (grub.cfg, grubenv) pairs for the BIOS and UEFI installs.
const BOOT_LOADER_CANDIDATES: [(&str, &str); 2] = [
    ("boot/grub2/grub.cfg", "boot/grub2/grubenv"),
    ("boot/efi/EFI/redhat/grub.cfg", "boot/efi/EFI/redhat/grubenv"),
];

#[derive(Debug, Clone)]
pub struct SystemLayout {
    root: PathBuf,
    mapping_name: String,
    module_name: String,
    udev_rule: String,
}

impl SystemLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        mapping_name: impl Into<String>,
        module_name: impl Into<String>,
        udev_rule: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            mapping_name: mapping_name.into(),
            module_name: module_name.into(),
            udev_rule: udev_rule.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            &cfg.system.root,
            &cfg.system.mapping_name,
            &cfg.unlock_module.name,
            &cfg.unlock_module.udev_rule,
        )
    }

    /// External tools always act on the running system, so commands that
    /// run them only make sense when the layout is anchored at `/`.
    pub fn is_live_root(&self) -> bool {
        self.root == Path::new("/")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mapping_name(&self) -> &str {
        &self.mapping_name
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.root.join(DRACUT_MODULES_DIR)
    }

    pub fn crypt_module_dir(&self) -> PathBuf {
        self.modules_dir().join(CRYPT_MODULE)
    }

    /// (patched script, its `.orig` backup) for each legacy-patched file.
    pub fn legacy_script_pairs(&self) -> Vec<(PathBuf, PathBuf)> {
        let dir = self.crypt_module_dir();
        LEGACY_PATCHED_SCRIPTS
            .iter()
            .map(|name| (dir.join(name), dir.join(format!("{name}.orig"))))
            .collect()
    }

    pub fn lvm_preferred_slot(&self) -> PathBuf {
        self.modules_dir().join(LVM_PREFERRED_SLOT)
    }

    pub fn lvm_legacy_slot(&self) -> PathBuf {
        self.modules_dir().join(LVM_LEGACY_SLOT)
    }

    pub fn unlock_module_dir(&self) -> PathBuf {
        self.modules_dir().join(&self.module_name)
    }

    pub fn udev_rule(&self) -> PathBuf {
        self.unlock_module_dir().join(&self.udev_rule)
    }

    /// Sibling the next module copy is assembled in. Dot-prefixed, so
    /// dracut never picks it up as a module.
    pub fn unlock_module_staging_dir(&self) -> PathBuf {
        self.modules_dir().join(format!(".{}.staging", self.module_name))
    }

    /// Where the live module is parked while the staged copy moves in.
    pub fn unlock_module_retired_dir(&self) -> PathBuf {
        self.modules_dir().join(format!(".{}.retired", self.module_name))
    }

    pub fn grub_defaults(&self) -> PathBuf {
        self.root.join(GRUB_DEFAULTS)
    }

    pub fn crypttab(&self) -> PathBuf {
        self.root.join(CRYPTTAB)
    }

    pub fn mapping_node(&self) -> PathBuf {
        self.root.join("dev/mapper").join(&self.mapping_name)
    }

    pub fn kernel_release(&self) -> PathBuf {
        self.root.join(KERNEL_RELEASE)
    }

    pub fn primary_grub_cfg(&self) -> PathBuf {
        self.root.join(PRIMARY_GRUB_CFG)
    }

    pub fn boot_loader_candidates(&self) -> Vec<(PathBuf, PathBuf)> {
        BOOT_LOADER_CANDIDATES
            .iter()
            .map(|(cfg, env)| (self.root.join(cfg), self.root.join(env)))
            .collect()
    }

    pub fn audit_log(&self) -> PathBuf {
        self.root.join(AUDIT_LOG)
    }
}
