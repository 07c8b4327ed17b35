// ============================================================================
// src/grub.rs – Boot-loader environments and kernel argument propagation
// ============================================================================

use crate::error::PatchResult;
use crate::host::Host;
use crate::layout::SystemLayout;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// One GRUB install: its grub.cfg and the grubenv it persists variables in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootLoaderEnvironment {
    pub config: PathBuf,
    pub env: PathBuf,
}

/// BIOS and UEFI installs whose config and env files both exist.
pub fn discover(layout: &SystemLayout) -> Vec<BootLoaderEnvironment> {
    layout
        .boot_loader_candidates()
        .into_iter()
        .filter(|(config, env)| config.is_file() && env.is_file())
        .map(|(config, env)| BootLoaderEnvironment { config, env })
        .collect()
}

/// Add every argument to every kernel entry of every discovered install,
/// one grubby call per (environment, argument). The first failing call is
/// returned as-is; nothing is retried. Returns the number of calls made.
pub fn add_kernel_args<S: AsRef<str>>(host: &Host<'_>, args: &[S]) -> PatchResult<usize> {
    let environments = discover(host.layout);
    if environments.is_empty() {
        info!("no boot-loader environment found; kernel arguments left untouched");
    }

    let mut calls = 0;
    for environment in &environments {
        for arg in args {
            let arg = arg.as_ref();
            let config = environment.config.display().to_string();
            let env = format!("--env={}", environment.env.display());
            host.mutate(
                &host.tools.grubby,
                [
                    "--args",
                    arg,
                    "--update-kernel",
                    "ALL",
                    "-c",
                    config.as_str(),
                    env.as_str(),
                ],
            )?;
            calls += 1;
            info!(arg, config = %environment.config.display(), "kernel argument added");
        }
    }
    if calls > 0 {
        host.audit(
            "KERNEL_ARGS",
            &format!("calls={calls} environments={}", environments.len()),
        );
    }
    Ok(calls)
}

/// Regenerate the primary grub.cfg with grub2-mkconfig.
pub fn regenerate_config(host: &Host<'_>) -> PatchResult<()> {
    let target = host.layout.primary_grub_cfg().display().to_string();
    host.mutate(&host.tools.grub2_mkconfig, ["-o", target.as_str()])?;
    info!(path = %target, "regenerated grub configuration");
    Ok(())
}
