// ============================================================================
// src/cmd/fake.rs – Recording gateway for tests
// ============================================================================

use crate::cmd::base::{Gateway, Invocation, OutputData};
use crate::error::{PatchError, PatchResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
enum Scripted {
    Output(OutputData),
    Timeout,
}

/// Returns scripted output per program (status 0 and empty output when
/// nothing was scripted) and records every invocation in order.
#[derive(Debug, Default)]
pub struct FakeGateway {
    responses: HashMap<PathBuf, Scripted>,
    calls: RefCell<Vec<Invocation>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, program: impl AsRef<Path>, status: i32, stdout: &str) -> Self {
        self.responses.insert(
            program.as_ref().to_path_buf(),
            Scripted::Output(OutputData {
                status,
                stdout: stdout.to_string(),
                stderr: String::new(),
            }),
        );
        self
    }

    pub fn time_out(mut self, program: impl AsRef<Path>) -> Self {
        self.responses
            .insert(program.as_ref().to_path_buf(), Scripted::Timeout);
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    pub fn calls_to(&self, program: impl AsRef<Path>) -> Vec<Invocation> {
        self.calls
            .borrow()
            .iter()
            .filter(|inv| inv.program == program.as_ref())
            .cloned()
            .collect()
    }
}

impl Gateway for FakeGateway {
    fn run(&self, invocation: &Invocation) -> PatchResult<OutputData> {
        self.calls.borrow_mut().push(invocation.clone());
        match self.responses.get(&invocation.program) {
            Some(Scripted::Output(out)) => Ok(out.clone()),
            Some(Scripted::Timeout) => Err(PatchError::TimedOut {
                command: invocation.to_string(),
                after: invocation.timeout,
            }),
            None => Ok(OutputData::default()),
        }
    }
}
