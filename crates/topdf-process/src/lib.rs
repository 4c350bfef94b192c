//! Bounded execution of external conversion tools.
//!
//! Commands run through `sh -c` in their own process group. A timeout
//! terminates the whole group, not just the shell, because office suites and
//! browser renderers fork helpers that would otherwise keep running.

pub mod group;

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use topdf_core::error::ToolError;
use topdf_utils::shell;

use crate::group::ProcessGroup;

/// Captured output kept in error reports, per stream.
const MAX_CAPTURE: usize = 8 * 1024;

/// How long to wait for pipe readers once the process group is gone.
const READER_GRACE: Duration = Duration::from_secs(1);

/// Result of a command that exited with status zero.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Runs external commands with a timeout and process-group cleanup.
#[derive(Debug, Clone)]
pub struct ToolInvoker {
    kill_grace: Duration,
    check_availability: bool,
}

impl Default for ToolInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolInvoker {
    pub fn new() -> Self {
        Self {
            kill_grace: Duration::from_millis(500),
            check_availability: true,
        }
    }

    /// Time between SIGTERM and SIGKILL on timeout.
    pub fn kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Skip the PATH lookup of the command's program.
    pub fn check_availability(mut self, enabled: bool) -> Self {
        self.check_availability = enabled;
        self
    }

    /// Run `command` and block until it exits or `timeout` elapses.
    pub fn run(&self, command: &str, timeout: Duration) -> Result<ToolOutput, ToolError> {
        if self.check_availability {
            ensure_available(command)?;
        }

        log::debug!("running (timeout {:?}): {}", timeout, command);
        let started = Instant::now();

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut group = ProcessGroup::spawn(&mut cmd).map_err(|source| ToolError::Spawn {
            command: command.to_string(),
            source,
        })?;

        let stdout = group.take_stdout().map(drain);
        let stderr = group.take_stderr().map(drain);

        // a timeout too large to add to the clock means no deadline at all
        let waited = match started.checked_add(timeout) {
            Some(deadline) => group.wait_until(deadline),
            None => group.wait().map(Some),
        };
        let status = match waited {
            Ok(Some(status)) => status,
            Ok(None) => {
                log::warn!(
                    "timeout after {:?}, terminating process group {}: {}",
                    timeout,
                    group.pgid(),
                    command
                );
                group.terminate(self.kill_grace);
                return Err(ToolError::Timeout {
                    command: command.to_string(),
                    timeout,
                });
            }
            Err(source) => {
                return Err(ToolError::Spawn {
                    command: command.to_string(),
                    source,
                })
            }
        };

        group.kill_stragglers();
        let stdout = collect(stdout);
        let stderr = collect(stderr);
        let elapsed = started.elapsed();

        if !status.success() {
            log::debug!("exit {:?} after {:?}: {}", status.code(), elapsed, command);
            return Err(ToolError::NonZeroExit {
                code: exit_code(status),
                stdout: tail(&stdout),
                stderr: tail(&stderr),
            });
        }

        log::debug!("finished in {:?}: {}", elapsed, command);
        Ok(ToolOutput {
            stdout,
            stderr,
            elapsed,
        })
    }
}

/// Fail with [`ToolError::Unavailable`] if the command's program is missing.
pub fn ensure_available(command: &str) -> Result<(), ToolError> {
    let Some(program) = shell::program_name(command) else {
        return Err(ToolError::Unavailable {
            program: String::new(),
        });
    };
    if shell::is_shell_builtin(program) || shell::find_program(program).is_some() {
        Ok(())
    } else {
        Err(ToolError::Unavailable {
            program: program.to_string(),
        })
    }
}

/// Read a pipe to the end on a helper thread so a chatty tool never blocks
/// on a full pipe buffer.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

fn collect(rx: Option<mpsc::Receiver<Vec<u8>>>) -> String {
    rx.and_then(|rx| rx.recv_timeout(READER_GRACE).ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

/// Keep the last `MAX_CAPTURE` bytes, cut on a char boundary.
fn tail(s: &str) -> String {
    if s.len() <= MAX_CAPTURE {
        return s.trim_end().to_string();
    }
    let mut start = s.len() - MAX_CAPTURE;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", s[start..].trim_end())
}

fn exit_code(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.code().or_else(|| status.signal().map(|sig| 128 + sig))
}
