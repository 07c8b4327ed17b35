// ============================================================================
// src/cmd/kernel_args.rs – Push kernel arguments into every GRUB install
// ============================================================================

use crate::cmd::Session;
use crate::grub;
use crate::ui::UX;
use anyhow::{bail, Context, Result};

pub fn run(ui: &UX, session: &Session, args: &[String]) -> Result<()> {
    session.ensure_live_root("kernel-args")?;
    let args = if args.is_empty() {
        session.cfg.kernel_args.default.as_slice()
    } else {
        args
    };
    if args.is_empty() {
        bail!("no kernel arguments given and kernel_args.default is empty");
    }

    ui.phase("Kernel arguments");
    let environments = grub::discover(&session.layout);
    if environments.is_empty() {
        ui.warn("No boot-loader environment with both grub.cfg and grubenv present.");
        return Ok(());
    }
    for env in &environments {
        ui.info(&format!("target: {}", env.config.display()));
    }

    let calls = grub::add_kernel_args(&session.host(), args)
        .context("add kernel arguments")?;
    ui.success(&format!(
        "Applied {} argument(s) across {} environment(s) ({} grubby calls).",
        args.len(),
        environments.len(),
        calls
    ));
    Ok(())
}
