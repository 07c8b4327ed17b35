// ============================================================================
// src/cmd/patch.rs – Interactive wrapper around one orchestration pass
// ============================================================================

use crate::cmd::Session;
use crate::patcher::{PatchReport, Patcher};
use crate::ui::{flag_label, UX};
use anyhow::{Context, Result};
use dialoguer::Confirm;
use tracing::info;

pub fn run(ui: &UX, session: &Session, assume_yes: bool) -> Result<()> {
    session.ensure_live_root("patch")?;
    ui.phase("Boot pipeline patch");

    let host = session.host();
    let patcher = Patcher::new(host, &session.cfg.unlock_module, &session.release);
    let state = patcher.classify();
    ui.data_panel(
        "Before",
        &[
            ("State", state.label().to_string()),
            ("Module tree", session.layout.modules_dir().display().to_string()),
            (
                "Release",
                format!("{} {}", session.release.id, session.release.version),
            ),
        ],
    );

    if !assume_yes {
        let proceed = Confirm::new()
            .with_prompt("Patch dracut modules and rebuild the initramfs now?")
            .default(false)
            .interact()
            .context("read confirmation")?;
        if !proceed {
            ui.note("Aborted; nothing was changed.");
            return Ok(());
        }
    }

    let report = patcher.run().context("boot pipeline patch failed")?;
    info!(mutated = report.mutated(), "patch pass finished");
    print_report(ui, &report);
    Ok(())
}

fn print_report(ui: &UX, report: &PatchReport) {
    if !report.applicable {
        ui.note(
            "Module patching does not apply to this release; no change made.",
        );
        return;
    }

    let mut rows = vec![
        (
            "LVM slot",
            report
                .lvm_slot
                .map(|r| format!("{r:?}"))
                .unwrap_or_else(|| "ok".to_string()),
        ),
        ("Legacy patch removed", flag_label(report.legacy.is_some())),
        ("Previous module retired", flag_label(report.stale_module_removed)),
    ];
    if let Some(install) = &report.install {
        rows.push(("Root device", install.root_device.clone()));
        rows.push(("Partition", install.partition.clone()));
    } else {
        rows.push(("Module installed", flag_label(false)));
    }
    rows.push((
        "Initramfs rebuilt",
        report
            .rebuilt_kernel
            .clone()
            .unwrap_or_else(|| "not needed".to_string()),
    ));
    ui.data_panel("After", &rows);

    if report.mutated() {
        ui.success("Boot pipeline is current.");
    } else {
        ui.success("Nothing to do; boot pipeline already current.");
    }
}
