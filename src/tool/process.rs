//! External tool process spawning and control.
//!
//! Wraps a `tokio` child with piped stdout/stderr so the supervisor can
//! stream diagnostics and stop the process on demand.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::tool::ToolArgs;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The tool executable was not found.
    #[error("Tool binary not found: {program}")]
    NotFound { program: String },
    /// Permission denied when spawning.
    #[error("Permission denied running {program}")]
    PermissionDenied { program: String },
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(program: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound {
                program: program.display().to_string(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                program: program.display().to_string(),
            },
            _ => Self::Io(err),
        }
    }
}

/// How a running tool process was brought down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process had already exited before any signal was needed.
    AlreadyExited,
    /// The process stopped within the grace period after the polite signal.
    Graceful,
    /// The process had to be killed.
    Forced,
}

/// A running external tool process.
#[derive(Debug)]
pub struct ToolProcess {
    child: Child,
}

impl ToolProcess {
    /// Spawn `program` with the given arguments.
    ///
    /// Stdin is closed so a tool that asks interactive questions reads EOF
    /// instead of blocking forever. The child is killed if the handle is
    /// dropped while it is still running.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(program: &Path, args: &ToolArgs) -> Result<Self, SpawnError> {
        let mut cmd = Command::new(program);
        cmd.args(args.as_slice())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| SpawnError::from_io(program, e))?;

        Ok(Self { child })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit. Cancel safe.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully kill the process and reap it.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Stop the process, politely first where the platform allows it.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after `grace`.
    /// On other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn terminate(&mut self, grace: Duration) -> std::io::Result<Termination> {
        if self.try_wait()?.is_some() {
            return Ok(Termination::AlreadyExited);
        }

        #[cfg(unix)]
        {
            self.terminate_unix(grace).await
        }

        #[cfg(not(unix))]
        {
            let _ = grace;
            self.kill().await?;
            Ok(Termination::Forced)
        }
    }

    #[cfg(unix)]
    async fn terminate_unix(&mut self, grace: Duration) -> std::io::Result<Termination> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id() else {
            return Ok(Termination::AlreadyExited);
        };

        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        if let Err(e) = kill(nix_pid, Signal::SIGTERM) {
            tracing::debug!(pid, error = %e, "SIGTERM failed, killing");
        } else {
            match tokio::time::timeout(grace, self.child.wait()).await {
                Ok(Ok(_)) => return Ok(Termination::Graceful),
                Ok(Err(e)) => return Err(e),
                Err(_) => tracing::debug!(pid, "Grace period elapsed, killing"),
            }
        }

        self.child.kill().await?;
        Ok(Termination::Forced)
    }
}
