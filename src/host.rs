// ============================================================================
// src/host.rs – Injected dependencies shared by every patching component
// ============================================================================

use crate::cmd::{Gateway, Invocation, OutputData};
use crate::config::Timeouts;
use crate::distro::ToolPaths;
use crate::error::PatchResult;
use crate::layout::SystemLayout;
use crate::util::audit::audit_log;
use std::path::Path;

#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub gateway: &'a dyn Gateway,
    pub tools: &'a ToolPaths,
    pub layout: &'a SystemLayout,
    pub timeouts: &'a Timeouts,
}

impl<'a> Host<'a> {
    pub fn new(
        gateway: &'a dyn Gateway,
        tools: &'a ToolPaths,
        layout: &'a SystemLayout,
        timeouts: &'a Timeouts,
    ) -> Self {
        Self {
            gateway,
            tools,
            layout,
            timeouts,
        }
    }

    /// Read-only query; a non-zero exit is returned to the caller as data.
    pub fn query<I, S>(&self, program: &Path, args: I) -> PatchResult<OutputData>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.gateway
            .run(&Invocation::new(program, args, self.timeouts.query()))
    }

    /// Read-only query that must succeed.
    pub fn query_checked<I, S>(&self, program: &Path, args: I) -> PatchResult<OutputData>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.gateway
            .run_checked(&Invocation::new(program, args, self.timeouts.query()))
    }

    /// System-mutating command that must succeed.
    pub fn mutate<I, S>(&self, program: &Path, args: I) -> PatchResult<OutputData>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.gateway
            .run_checked(&Invocation::new(program, args, self.timeouts.command()))
    }

    pub fn audit(&self, event: &str, detail: &str) {
        audit_log(&self.layout.audit_log(), event, detail);
    }
}
