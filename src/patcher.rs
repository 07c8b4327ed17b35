// ============================================================================
// src/patcher.rs – Single-pass boot-pipeline patch orchestration
// ============================================================================
//
// Not safe to run concurrently: two passes racing on modules.d or the boot
// files can corrupt state. Callers serialise invocations.

use crate::config::UnlockModule;
use crate::distro::DistroRelease;
use crate::dracut::legacy::{self, LegacyRemoval};
use crate::dracut::unlock::{self, ModuleInstall};
use crate::dracut::{self, BootModuleState, SlotResolution};
use crate::error::PatchResult;
use crate::host::Host;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct PatchReport {
    pub applicable: bool,
    pub initial_state: BootModuleState,
    pub lvm_slot: Option<SlotResolution>,
    pub legacy: Option<LegacyRemoval>,
    pub stale_module_removed: bool,
    pub install: Option<ModuleInstall>,
    /// Kernel version the final initramfs rebuild was pinned to.
    pub rebuilt_kernel: Option<String>,
}

impl PatchReport {
    fn skipped(initial_state: BootModuleState, applicable: bool) -> Self {
        Self {
            applicable,
            initial_state,
            lvm_slot: None,
            legacy: None,
            stale_module_removed: false,
            install: None,
            rebuilt_kernel: None,
        }
    }

    pub fn mutated(&self) -> bool {
        self.lvm_slot.is_some()
            || self.legacy.is_some()
            || self.stale_module_removed
            || self.install.is_some()
    }
}

pub struct Patcher<'a> {
    host: Host<'a>,
    module: &'a UnlockModule,
    release: &'a DistroRelease,
}

impl<'a> Patcher<'a> {
    pub fn new(host: Host<'a>, module: &'a UnlockModule, release: &'a DistroRelease) -> Self {
        Self {
            host,
            module,
            release,
        }
    }

    pub fn classify(&self) -> BootModuleState {
        dracut::classify(self.host.layout)
    }

    /// Walk the module tree to the current state and rebuild the initramfs
    /// once, after every mutation has landed.
    pub fn run(&self) -> PatchResult<PatchReport> {
        let layout = self.host.layout;
        let state = self.classify();
        info!(state = state.label(), release = %self.release.version, "classified boot pipeline");

        if !self.release.supports_module_patching() {
            info!(release = %self.release.version, "module patching not applicable to this release");
            return Ok(PatchReport::skipped(state, false));
        }
        if state == BootModuleState::Missing {
            warn!(path = %layout.modules_dir().display(), "no dracut module tree; nothing to patch");
            return Ok(PatchReport::skipped(state, true));
        }

        let markers = dracut::legacy_markers_present(layout);
        if state != BootModuleState::LegacyPatched && markers > 0 {
            warn!(markers, "partial legacy patch markers present; leaving them in place");
        }

        let mut report = PatchReport::skipped(state, true);
        let mut rebuild = false;

        report.lvm_slot = dracut::resolve_lvm_slot_conflict(layout)?;
        if let Some(resolution) = report.lvm_slot {
            self.host.audit("LVM_SLOT", &format!("{resolution:?}"));
            rebuild = true;
        }

        if state == BootModuleState::LegacyPatched {
            report.legacy = Some(legacy::remove(&self.host)?);
            rebuild = true;
        }

        if unlock::mapping_active(&self.host) {
            let install = unlock::install(&self.host, self.module)?;
            report.stale_module_removed = install.replaced;
            report.install = Some(install);
            rebuild = true;
        } else {
            info!(mapping = layout.mapping_name(), "no active encryption mapping; module not installed");
            if dracut::remove_installed_module(layout)? {
                self.host.audit(
                    "MODULE_REMOVED",
                    &layout.unlock_module_dir().display().to_string(),
                );
                report.stale_module_removed = true;
                rebuild = true;
            }
        }

        if rebuild {
            report.rebuilt_kernel = Some(dracut::rebuild_initramfs(&self.host)?);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::fake::FakeGateway;
    use crate::config::Timeouts;
    use crate::distro::ToolPaths;
    use crate::dracut::testutil::{layout, seed_legacy_patch, touch};
    use crate::layout::SystemLayout;
    use std::fs;
    use tempfile::TempDir;

    const STATUS: &str = "/dev/mapper/osencrypt is active.\n  device:  /dev/sda2\n";
    const WALK: &str = "    ATTR{partition}==\"2\"\n";
    const KVER: &str = "3.10.0-1160.el7.x86_64";

    struct Fixture {
        root: TempDir,
        layout: SystemLayout,
        tools: ToolPaths,
        timeouts: Timeouts,
        module: UnlockModule,
        release: DistroRelease,
    }

    fn fixture() -> Fixture {
        let root = TempDir::new().unwrap();
        let layout = layout(root.path());
        fs::create_dir_all(layout.crypt_module_dir()).unwrap();
        touch(&layout.kernel_release(), &format!("{KVER}\n"));
        let source = root.path().join("usr/share/bootpatch/91ade");
        touch(
            &source.join("50-udev-ade.rules"),
            "ATTR{partition}==\"ENCRYPTED_DISK_PARTITION\"\n",
        );
        let release = DistroRelease::parse_version("7.9").unwrap();
        Fixture {
            root,
            tools: ToolPaths::for_release(&release),
            layout,
            timeouts: Timeouts::default(),
            module: UnlockModule {
                source_dir: source,
                ..UnlockModule::default()
            },
            release,
        }
    }

    fn activate_mapping(layout: &SystemLayout) {
        touch(&layout.mapping_node(), "");
    }

    fn scripted(fx: &Fixture) -> FakeGateway {
        FakeGateway::new()
            .respond(&fx.tools.cryptsetup, 0, STATUS)
            .respond(&fx.tools.udevadm, 0, WALK)
    }

    fn dracut_calls(gateway: &FakeGateway, fx: &Fixture) -> usize {
        gateway.calls_to(&fx.tools.dracut).len()
    }

    #[test]
    fn clean_system_without_mapping_is_a_no_op() {
        let fx = fixture();
        let gateway = FakeGateway::new();
        let host = Host::new(&gateway, &fx.tools, &fx.layout, &fx.timeouts);

        let report = Patcher::new(host, &fx.module, &fx.release).run().unwrap();

        assert_eq!(report.initial_state, BootModuleState::Unpatched);
        assert!(!report.mutated());
        assert!(report.rebuilt_kernel.is_none());
        assert!(gateway.calls().is_empty());
        assert!(!fx.layout.audit_log().exists());
    }

    #[test]
    fn active_mapping_installs_once_and_rebuilds_once() {
        let fx = fixture();
        activate_mapping(&fx.layout);
        let gateway = scripted(&fx);
        let host = Host::new(&gateway, &fx.tools, &fx.layout, &fx.timeouts);

        let report = Patcher::new(host, &fx.module, &fx.release).run().unwrap();

        let install = report.install.expect("module installed");
        assert_eq!(install.partition, "2");
        assert!(report.legacy.is_none());
        assert_eq!(report.rebuilt_kernel.as_deref(), Some(KVER));
        assert_eq!(gateway.calls_to(&fx.tools.cryptsetup).len(), 1);
        assert_eq!(dracut_calls(&gateway, &fx), 1);
        assert_eq!(
            gateway.calls().last().unwrap().args,
            vec!["-f", "-v", "--kver", KVER]
        );
        assert_eq!(Patcher::new(host, &fx.module, &fx.release).classify(), BootModuleState::ModulePresent);
    }

    #[test]
    fn legacy_system_is_reverted_then_module_installed() {
        let fx = fixture();
        seed_legacy_patch(&fx.layout);
        touch(&fx.layout.grub_defaults(), "GRUB_CMDLINE_LINUX+=\" rd.luks.uuid=osencrypt\"\n");
        touch(&fx.layout.crypttab(), "");
        activate_mapping(&fx.layout);
        let gateway = scripted(&fx);
        let host = Host::new(&gateway, &fx.tools, &fx.layout, &fx.timeouts);

        let report = Patcher::new(host, &fx.module, &fx.release).run().unwrap();

        assert_eq!(report.initial_state, BootModuleState::LegacyPatched);
        assert_eq!(report.legacy.as_ref().unwrap().restored.len(), 3);
        assert!(report.install.is_some());
        // Legacy removal rebuilds unpinned; the orchestrator adds exactly one pinned rebuild.
        assert_eq!(dracut_calls(&gateway, &fx), 2);
        let last = gateway.calls().last().cloned().unwrap();
        assert_eq!(last.program, fx.tools.dracut);
        assert!(last.args.contains(&"--kver".to_string()));
        // The fallback entry added by the revert is dropped by the install.
        assert!(!fs::read_to_string(fx.layout.crypttab())
            .unwrap()
            .contains("osencrypt-locked"));
        assert_eq!(Patcher::new(host, &fx.module, &fx.release).classify(), BootModuleState::ModulePresent);
    }

    #[test]
    fn stale_module_without_mapping_is_removed_and_rebuilt() {
        let fx = fixture();
        touch(&fx.layout.udev_rule(), "old\n");
        let gateway = FakeGateway::new();
        let host = Host::new(&gateway, &fx.tools, &fx.layout, &fx.timeouts);

        let report = Patcher::new(host, &fx.module, &fx.release).run().unwrap();

        assert_eq!(report.initial_state, BootModuleState::ModulePresent);
        assert!(report.stale_module_removed);
        assert!(report.install.is_none());
        assert!(!fx.layout.unlock_module_dir().exists());
        assert_eq!(dracut_calls(&gateway, &fx), 1);
    }

    #[test]
    fn lvm_conflict_alone_triggers_single_rebuild() {
        let fx = fixture();
        touch(&fx.layout.lvm_legacy_slot().join("module-setup.sh"), "91");
        let gateway = FakeGateway::new();
        let host = Host::new(&gateway, &fx.tools, &fx.layout, &fx.timeouts);

        let report = Patcher::new(host, &fx.module, &fx.release).run().unwrap();

        assert_eq!(report.lvm_slot, Some(SlotResolution::RenamedLegacy));
        assert_eq!(dracut_calls(&gateway, &fx), 1);
        let audit = fs::read_to_string(fx.layout.audit_log()).unwrap();
        assert!(audit.contains("LVM_SLOT"));
        assert!(audit.contains("INITRD_REBUILT"));
    }

    #[test]
    fn extraction_failure_stops_before_rebuild() {
        let fx = fixture();
        activate_mapping(&fx.layout);
        let gateway = FakeGateway::new().respond(&fx.tools.cryptsetup, 0, "inactive\n");
        let host = Host::new(&gateway, &fx.tools, &fx.layout, &fx.timeouts);

        assert!(Patcher::new(host, &fx.module, &fx.release).run().is_err());
        assert_eq!(dracut_calls(&gateway, &fx), 0);
    }

    #[test]
    fn extraction_failure_leaves_bound_module_in_place() {
        let fx = fixture();
        let bound = "ATTR{partition}==\"2\"\n";
        touch(&fx.layout.udev_rule(), bound);
        activate_mapping(&fx.layout);
        let gateway = FakeGateway::new().respond(&fx.tools.cryptsetup, 0, "inactive\n");
        let host = Host::new(&gateway, &fx.tools, &fx.layout, &fx.timeouts);
        let patcher = Patcher::new(host, &fx.module, &fx.release);

        assert!(patcher.run().is_err());
        assert_eq!(patcher.classify(), BootModuleState::ModulePresent);
        assert_eq!(fs::read_to_string(fx.layout.udev_rule()).unwrap(), bound);
        assert_eq!(dracut_calls(&gateway, &fx), 0);
    }

    #[test]
    fn other_releases_are_left_alone() {
        let mut fx = fixture();
        fx.release = DistroRelease::parse_version("8.4").unwrap();
        activate_mapping(&fx.layout);
        let gateway = scripted(&fx);
        let host = Host::new(&gateway, &fx.tools, &fx.layout, &fx.timeouts);

        let report = Patcher::new(host, &fx.module, &fx.release).run().unwrap();
        assert!(!report.applicable);
        assert!(gateway.calls().is_empty());
        assert!(fx.root.path().join("lib/dracut/modules.d").is_dir());
    }
}
