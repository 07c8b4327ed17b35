// ============================================================================
// src/cmd/prereqs.rs – Ensure the encryption utilities are installed
// ============================================================================

use crate::cmd::{Invocation, Session};
use crate::distro::{base_packages, extra_packages};
use crate::error::PatchResult;
use crate::host::Host;
use crate::ui::UX;
use anyhow::{anyhow, Result};
use tracing::{info, warn};

/// Install `packages` with yum when `rpm -q` reports any of them missing.
/// Returns whether an install ran.
pub fn ensure_packages(host: &Host<'_>, packages: &[&str]) -> PatchResult<bool> {
    let query = host.query(&host.tools.rpm, std::iter::once("-q").chain(packages.iter().copied()))?;
    if query.success() {
        info!(?packages, "packages already installed");
        return Ok(false);
    }

    let install = Invocation::new(
        &host.tools.yum,
        ["install", "-y"].into_iter().chain(packages.iter().copied()),
        host.timeouts.package_install(),
    );
    info!(command = %install, "installing packages");
    host.gateway.run_checked(&install)?;
    host.audit("PACKAGES_INSTALLED", &packages.join(" "));
    Ok(true)
}

pub fn run(ui: &UX, session: &Session, extras: bool) -> Result<()> {
    session.ensure_live_root("prereqs")?;
    ui.phase("Package prerequisites");
    let host = session.host();

    let base = base_packages(&session.release);
    match ensure_packages(&host, &base) {
        Ok(true) => ui.success(&format!("Installed {}.", base.join(", "))),
        Ok(false) => ui.note(&format!("{} already present.", base.join(", "))),
        Err(err) if err.is_timeout() => {
            return Err(anyhow!(
                "{err}. Make sure yum is configured correctly and there are no network problems."
            ))
        }
        Err(err) => return Err(err.into()),
    }

    if extras {
        let packages = extra_packages(&session.release);
        match ensure_packages(&host, &packages) {
            Ok(true) => ui.success(&format!("Installed {}.", packages.join(", "))),
            Ok(false) => ui.note("Extra utilities already present."),
            Err(err) => {
                warn!(%err, "extra package install failed");
                ui.warn(&format!("Extra utilities not installed: {err}"));
            }
        }
    }
    Ok(())
}
