// ============================================================================
// src/error.rs – Typed failures for the boot-pipeline patcher
// ============================================================================

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type PatchResult<T> = Result<T, PatchError>;

#[derive(Debug, Error)]
pub enum PatchError {
    /// The expected fragment never showed up in the tool's output.
    #[error("could not find {what} in output of `{command}`")]
    Extraction { what: String, command: String },

    #[error("`{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {after:?}")]
    TimedOut { command: String, after: Duration },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("program {program} is not in the tool allowlist")]
    NotAllowlisted { program: PathBuf },

    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl PatchError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        PatchError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PatchError::TimedOut { .. })
    }

    /// True when the failure is a filesystem target that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PatchError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}
