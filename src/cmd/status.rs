// ============================================================================
// src/cmd/status.rs – Read-only report of the boot pipeline state
// ============================================================================

use crate::cmd::Session;
use crate::distro::DistroRelease;
use crate::dracut::{self, BootModuleState};
use crate::grub::{self, BootLoaderEnvironment};
use crate::layout::SystemLayout;
use crate::ui::{flag_label, UX};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: BootModuleState,
    pub legacy_markers: usize,
    pub mapping: String,
    pub mapping_active: bool,
    pub module_dir: PathBuf,
    pub boot_loaders: Vec<BootLoaderEnvironment>,
    pub release: DistroRelease,
    pub patching_applicable: bool,
    pub online_encryption: bool,
}

/// Never fails: every field is an existence check or a pure derivation.
pub fn collect(layout: &SystemLayout, release: &DistroRelease) -> StatusReport {
    StatusReport {
        state: dracut::classify(layout),
        legacy_markers: dracut::legacy_markers_present(layout),
        mapping: layout.mapping_name().to_string(),
        mapping_active: layout.mapping_node().exists(),
        module_dir: layout.unlock_module_dir(),
        boot_loaders: grub::discover(layout),
        release: release.clone(),
        patching_applicable: release.supports_module_patching(),
        online_encryption: release.supports_online_encryption(),
    }
}

pub fn run(ui: &UX, session: &Session, json: bool) -> Result<()> {
    let report = collect(&session.layout, &session.release);

    if json {
        let rendered = serde_json::to_string_pretty(&report).context("serialize status")?;
        println!("{rendered}");
        return Ok(());
    }

    ui.phase("Boot pipeline status");
    ui.data_panel(
        "Summary",
        &[
            ("State", report.state.label().to_string()),
            ("Legacy markers", format!("{}/3", report.legacy_markers)),
            (
                "Mapping",
                format!("{} (active: {})", report.mapping, flag_label(report.mapping_active)),
            ),
            ("Module dir", report.module_dir.display().to_string()),
            (
                "Release",
                format!("{} {}", report.release.id, report.release.version),
            ),
            ("Patching applies", flag_label(report.patching_applicable)),
            ("Online encryption", flag_label(report.online_encryption)),
        ],
    );

    if report.boot_loaders.is_empty() {
        ui.warn("No usable boot-loader environment (grub.cfg + grubenv) found.");
    }
    for env in &report.boot_loaders {
        ui.note(&format!("{} | {}", env.config.display(), env.env.display()));
    }
    if report.legacy_markers > 0 && report.state != BootModuleState::LegacyPatched {
        ui.warn("Partial legacy patch detected; inspect lib/dracut/modules.d/90crypt by hand.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dracut::testutil::{layout, touch};
    use tempfile::TempDir;

    #[test]
    fn status_reflects_filesystem() {
        let root = TempDir::new().unwrap();
        let layout = layout(root.path());
        touch(&layout.udev_rule(), "rule\n");
        touch(&layout.mapping_node(), "");
        let (config, env) = layout.boot_loader_candidates().remove(1);
        touch(&config, "");
        touch(&env, "");

        let report = collect(&layout, &DistroRelease::parse_version("7.9").unwrap());

        assert_eq!(report.state, BootModuleState::ModulePresent);
        assert!(report.mapping_active);
        assert_eq!(report.boot_loaders.len(), 1);
        assert!(report.patching_applicable);
        assert!(!report.online_encryption);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "module-present");
    }
}
