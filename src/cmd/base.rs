// ============================================================================
// src/cmd/base.rs – Allowlisted external command gateway (no shell, bounded time)
// ============================================================================

use crate::distro::ToolPaths;
use crate::error::{PatchError, PatchResult};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

/// One program execution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new<P, I, S>(program: P, args: I, timeout: Duration) -> Self
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.as_ref().to_path_buf(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutputData {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl OutputData {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Contract every external tool call goes through.
///
/// A non-zero exit comes back as data; a timeout or a spawn failure comes
/// back as an error so the two failure modes never blur together.
pub trait Gateway {
    fn run(&self, invocation: &Invocation) -> PatchResult<OutputData>;

    /// Like [`Gateway::run`] but a non-zero exit becomes `CommandFailed`.
    fn run_checked(&self, invocation: &Invocation) -> PatchResult<OutputData> {
        let out = self.run(invocation)?;
        if out.success() {
            Ok(out)
        } else {
            Err(PatchError::CommandFailed {
                command: invocation.to_string(),
                status: out.status,
                stderr: out.stderr.trim().to_string(),
            })
        }
    }
}

/// Spawns real processes, restricted to the binaries named in the tool table.
#[derive(Debug, Clone)]
pub struct SystemGateway {
    allowed: Vec<PathBuf>,
}

impl SystemGateway {
    pub fn new(tools: &ToolPaths) -> Self {
        Self {
            allowed: tools.all().into_iter().map(Path::to_path_buf).collect(),
        }
    }

    fn ensure_allowed(&self, program: &Path) -> PatchResult<()> {
        if self.allowed.iter().any(|p| p == program) {
            Ok(())
        } else {
            Err(PatchError::NotAllowlisted {
                program: program.to_path_buf(),
            })
        }
    }
}

impl Gateway for SystemGateway {
    fn run(&self, invocation: &Invocation) -> PatchResult<OutputData> {
        self.ensure_allowed(&invocation.program)?;
        debug!(command = %invocation, "spawning");

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| PatchError::Spawn {
                command: invocation.to_string(),
                source,
            })?;

        // Drain both pipes concurrently; dracut -v easily fills a pipe buffer.
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = wait_with_timeout(&mut child, invocation)?;

        Ok(OutputData {
            status,
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
        })
    }
}

fn wait_with_timeout(child: &mut Child, invocation: &Invocation) -> PatchResult<i32> {
    let start = Instant::now();
    loop {
        let polled = child.try_wait().map_err(|source| PatchError::Spawn {
            command: invocation.to_string(),
            source,
        })?;
        if let Some(status) = polled {
            return Ok(status.code().unwrap_or(-1));
        }
        if start.elapsed() > invocation.timeout {
            terminate(child);
            return Err(PatchError::TimedOut {
                command: invocation.to_string(),
                after: invocation.timeout,
            });
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// SIGTERM first, then kill after a short grace period.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal::SIGTERM};
        use nix::unistd::Pid;
        let _ = kill(Pid::from_raw(child.id() as i32), SIGTERM);
    }
    thread::sleep(Duration::from_millis(200));
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distro::DistroRelease;

    #[test]
    fn rejects_programs_outside_tool_table() {
        let tools = ToolPaths::for_release(&DistroRelease::parse_version("7.9").unwrap());
        let gateway = SystemGateway::new(&tools);
        let inv = Invocation::new("/bin/sh", ["-c", "true"], Duration::from_secs(1));
        match gateway.run(&inv) {
            Err(PatchError::NotAllowlisted { program }) => {
                assert_eq!(program, PathBuf::from("/bin/sh"))
            }
            other => panic!("expected allowlist rejection, got {other:?}"),
        }
    }

    #[test]
    fn tool_table_programs_are_allowlisted() {
        let tools = ToolPaths::for_release(&DistroRelease::parse_version("7.9").unwrap());
        let gateway = SystemGateway::new(&tools);
        for program in tools.all() {
            assert!(
                gateway.ensure_allowed(program).is_ok(),
                "expected {} to be allowlisted",
                program.display()
            );
        }
    }

    fn gateway_for(programs: &[&str]) -> SystemGateway {
        SystemGateway {
            allowed: programs.iter().map(PathBuf::from).collect(),
        }
    }

    #[test]
    fn overrunning_command_is_a_timeout_and_is_reaped() {
        let gateway = gateway_for(&["/bin/sleep"]);
        let inv = Invocation::new("/bin/sleep", ["5"], Duration::from_millis(100));

        let start = Instant::now();
        let err = gateway.run(&inv).unwrap_err();

        assert!(err.is_timeout(), "expected a timeout, got {err:?}");
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn non_zero_exit_is_data_not_an_error() {
        let gateway = gateway_for(&["/bin/false"]);
        let inv = Invocation::new("/bin/false", Vec::<String>::new(), Duration::from_secs(5));

        let out = gateway.run(&inv).unwrap();
        assert_ne!(out.status, 0);
        assert!(!out.success());

        match gateway.run_checked(&inv) {
            Err(PatchError::CommandFailed { status, .. }) => assert_ne!(status, 0),
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[test]
    fn output_is_captured_from_both_pipes() {
        let gateway = gateway_for(&["/bin/echo"]);
        let inv = Invocation::new("/bin/echo", ["device:", "/dev/sda2"], Duration::from_secs(5));

        let out = gateway.run(&inv).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "device: /dev/sda2\n");
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let gateway = gateway_for(&["/nonexistent/cryptsetup"]);
        let inv = Invocation::new("/nonexistent/cryptsetup", ["status"], Duration::from_secs(1));
        assert!(matches!(gateway.run(&inv), Err(PatchError::Spawn { .. })));
    }

    #[test]
    fn invocation_display_joins_arguments() {
        let inv = Invocation::new(
            "/usr/sbin/cryptsetup",
            ["status", "osencrypt"],
            Duration::from_secs(5),
        );
        assert_eq!(inv.to_string(), "/usr/sbin/cryptsetup status osencrypt");
    }
}
