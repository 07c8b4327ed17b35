// ============================================================================
// src/cmd/mod.rs – command subsystem root
// ============================================================================
pub mod base; // external tool gateway (Invocation, OutputData, SystemGateway)
pub mod kernel_args; // bootpatch kernel-args
pub mod patch; // bootpatch patch
pub mod prereqs; // bootpatch prereqs
pub mod status; // bootpatch status

#[cfg(test)]
pub mod fake;

pub use base::{Gateway, Invocation, OutputData, SystemGateway};

use crate::config::Config;
use crate::distro::{DistroRelease, ToolPaths};
use crate::host::Host;
use crate::layout::SystemLayout;
use anyhow::{bail, Context, Result};

/// Everything a subcommand needs, built once from config and the detected release.
pub struct Session {
    pub cfg: Config,
    pub release: DistroRelease,
    pub tools: ToolPaths,
    pub layout: SystemLayout,
    pub gateway: Box<dyn Gateway>,
}

impl Session {
    pub fn open(cfg: Config) -> Result<Self> {
        let release = DistroRelease::detect(&cfg.system.root)
            .with_context(|| format!("detect release under {}", cfg.system.root.display()))?;
        let tools = ToolPaths::for_release(&release);
        let layout = SystemLayout::from_config(&cfg);
        let gateway: Box<dyn Gateway> = Box::new(SystemGateway::new(&tools));
        Ok(Self {
            cfg,
            release,
            tools,
            layout,
            gateway,
        })
    }

    /// `--root` only redirects file paths; cryptsetup, dracut and grubby
    /// still act on the running system, so tool-running commands refuse it.
    pub fn ensure_live_root(&self, action: &str) -> Result<()> {
        ensure_live_root(&self.layout, action)
    }

    pub fn host(&self) -> Host<'_> {
        Host::new(
            self.gateway.as_ref(),
            &self.tools,
            &self.layout,
            &self.cfg.timeouts,
        )
    }
}

fn ensure_live_root(layout: &SystemLayout, action: &str) -> Result<()> {
    if !layout.is_live_root() {
        bail!(
            "{action} runs system tools against the live system; it cannot target root {}",
            layout.root().display()
        );
    }
    Ok(())
}
