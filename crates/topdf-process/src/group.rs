//! Scoped handle over a child process and its process group.
//!
//! The child is started as the leader of a fresh process group, so every
//! helper it forks shares the group id. Dropping the handle kills whatever is
//! still alive in that group and reaps the leader.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct ProcessGroup {
    child: Child,
    pgid: libc::pid_t,
    status: Option<ExitStatus>,
    // set once SIGKILL went to the group after the leader was reaped
    swept: bool,
}

impl ProcessGroup {
    /// Spawn `command` as the leader of a new process group.
    pub fn spawn(command: &mut Command) -> io::Result<Self> {
        let child = command.process_group(0).spawn()?;
        let pgid = child.id() as libc::pid_t;
        Ok(Self {
            child,
            pgid,
            status: None,
            swept: false,
        })
    }

    pub fn pgid(&self) -> libc::pid_t {
        self.pgid
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Wait for the leader to exit, polling until `deadline`.
    /// Returns `Ok(None)` if the deadline passed first.
    pub fn wait_until(&mut self, deadline: Instant) -> io::Result<Option<ExitStatus>> {
        loop {
            if let Some(status) = self.child.try_wait()? {
                self.status = Some(status);
                return Ok(Some(status));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Block until the leader exits.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.status = Some(status);
        Ok(status)
    }

    /// Send `signal` to every process in the group. Returns false when no
    /// process in the group is left.
    pub fn signal(&self, signal: libc::c_int) -> bool {
        // SAFETY: kill(2) with a negative pid addresses the process group; it
        // touches no memory owned by this process.
        let rc = unsafe { libc::kill(-self.pgid, signal) };
        rc == 0
    }

    /// SIGTERM the group, give it `grace` to exit, then SIGKILL it and reap
    /// the leader.
    pub fn terminate(&mut self, grace: Duration) {
        if !self.signal(libc::SIGTERM) && self.status.is_some() {
            self.swept = true;
            return;
        }
        let exited = match Instant::now().checked_add(grace) {
            Some(deadline) => self.wait_until(deadline),
            None => self.wait().map(Some),
        };
        if let Ok(Some(_)) = exited {
            // Leader is gone; helpers that trapped SIGTERM are not.
            self.kill_stragglers();
            return;
        }
        log::warn!("process group {} ignored SIGTERM, sending SIGKILL", self.pgid);
        self.signal(libc::SIGKILL);
        self.reap();
        self.swept = self.status.is_some();
    }

    /// Kill any helpers that outlived the leader.
    pub fn kill_stragglers(&mut self) {
        if self.signal(libc::SIGKILL) {
            log::debug!("killed leftover processes in group {}", self.pgid);
        }
        self.swept = self.status.is_some();
    }

    /// Whether dropping the handle still has to signal the group. Once the
    /// leader is reaped and the group swept, the pgid may be reused.
    fn needs_kill(&self) -> bool {
        !self.swept
    }

    fn reap(&mut self) {
        if self.status.is_none() {
            match self.child.wait() {
                Ok(status) => self.status = Some(status),
                Err(e) => log::warn!("failed to reap process {}: {}", self.pgid, e),
            }
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if self.needs_kill() {
            self.signal(libc::SIGKILL);
        }
        self.reap();
    }
}
