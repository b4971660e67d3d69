//! Supervised execution of one external tool invocation.
//!
//! The runner spawns the tool, feeds every output line to a caller-supplied
//! handler and waits on three event sources at once: the cancellation
//! token, the next output line, and process exit. Whichever fires first
//! decides the outcome. On every path out of [`ProcessSupervisor::run`] the
//! child is confirmed stopped.

use std::path::Path;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::supervisor::{ExitState, InvocationState, InvocationStateMachine};
use crate::tool::{merged_lines, LinesError, SpawnError, Termination, ToolArgs, ToolProcess};

/// Default grace period between SIGTERM and SIGKILL.
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// How long to wait for a killed process to be reaped before giving up.
const KILL_CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

/// After exit, stop draining once the pipes stay quiet this long. A
/// background child that inherited them may keep them open indefinitely.
pub const DRAIN_IDLE_TIMEOUT: Duration = Duration::from_millis(100);

/// Error type for supervisor operations.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// The tool could not be launched.
    #[error("Failed to launch tool: {0}")]
    Spawn(#[from] SpawnError),
    /// An output pipe was not available.
    #[error(transparent)]
    Pipe(#[from] LinesError),
    /// Waiting on the process failed.
    #[error("Failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),
    /// Failed to terminate the process.
    #[error("Failed to terminate process: {0}")]
    Terminate(#[source] std::io::Error),
    /// The process survived a kill and may have leaked.
    #[error("Process {pid:?} still running after kill")]
    StillRunning { pid: Option<u32> },
}

/// Outcome of one supervised run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Invocation identifier, also used in log fields.
    pub id: Uuid,
    /// How the run ended.
    pub state: ExitState,
    /// Exit status if the process exited on its own.
    pub status: Option<ExitStatus>,
    /// Number of output lines delivered to the handler.
    pub lines: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl RunReport {
    /// Whether the process ran to its natural end.
    #[must_use]
    pub fn exited(&self) -> bool {
        self.state == ExitState::NaturalExit
    }

    /// Exit code of a natural exit, if the platform reported one.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }
}

/// Why the wait loop stopped.
enum WaitOutcome {
    Exited(ExitStatus),
    Cancelled,
    Watchdog,
    Failed(SupervisorError),
}

/// Launches tool processes and supervises them until exit or cancellation.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    terminate_grace: Duration,
    max_runtime: Option<Duration>,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSupervisor {
    /// Create a supervisor with the default grace period and no watchdog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            terminate_grace: DEFAULT_TERMINATE_GRACE,
            max_runtime: None,
        }
    }

    /// Set the grace period between the polite stop signal and the kill.
    #[must_use]
    pub fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    /// Stop any run that exceeds `limit`, as if it had been cancelled.
    #[must_use]
    pub fn with_max_runtime(mut self, limit: Option<Duration>) -> Self {
        self.max_runtime = limit;
        self
    }

    #[must_use]
    pub fn terminate_grace(&self) -> Duration {
        self.terminate_grace
    }

    #[must_use]
    pub fn max_runtime(&self) -> Option<Duration> {
        self.max_runtime
    }

    /// Run `program` with `args`, passing every output line to `on_line`.
    ///
    /// Returns once the process exited on its own or `cancel` fired and the
    /// process was stopped. A token that is already cancelled returns a
    /// `Cancelled` report without launching anything. The handler may
    /// cancel `cancel` itself; the run then stops before the next line is
    /// delivered.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::Spawn` if the tool cannot be launched and
    /// `SupervisorError::StillRunning` if the process could not be stopped.
    pub async fn run<F>(
        &self,
        program: &Path,
        args: &ToolArgs,
        mut on_line: F,
        cancel: &CancellationToken,
    ) -> Result<RunReport, SupervisorError>
    where
        F: FnMut(&str),
    {
        let id = Uuid::new_v4();
        let started = Instant::now();
        let mut machine = InvocationStateMachine::new();

        if cancel.is_cancelled() {
            tracing::info!(
                %id,
                program = %program.display(),
                "Cancelled before start, not launching"
            );
            machine.transition(InvocationState::Cancelled);
            return Ok(RunReport {
                id,
                state: ExitState::Cancelled,
                status: None,
                lines: 0,
                elapsed: started.elapsed(),
            });
        }

        tracing::info!(
            %id,
            program = %program.display(),
            args = %args,
            "Starting tool"
        );

        let mut process = ToolProcess::spawn(program, args)?;
        let pid = process.id();
        machine.transition(InvocationState::Running);
        tracing::debug!(%id, pid = ?pid, "Tool running");

        let mut lines = match merged_lines(&mut process) {
            Ok(lines) => lines,
            Err(e) => {
                self.stop(&mut process, id).await?;
                return Err(e.into());
            }
        };
        let mut lines_open = true;
        let mut delivered = 0usize;

        let deadline = self.max_runtime.map(|d| tokio::time::Instant::now() + d);
        let watchdog = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(watchdog);

        let outcome = loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => break WaitOutcome::Cancelled,
                () = &mut watchdog => break WaitOutcome::Watchdog,
                line = lines.next(), if lines_open => match line {
                    Some(Ok(line)) => {
                        delivered += 1;
                        tracing::trace!(
                            %id,
                            stream = ?line.stream,
                            line = %line.text,
                            "Tool output"
                        );
                        on_line(&line.text);
                    }
                    Some(Err(e)) => {
                        tracing::debug!(%id, error = %e, "Skipping unreadable output line");
                    }
                    None => lines_open = false,
                },
                status = process.wait() => match status {
                    Ok(status) => break WaitOutcome::Exited(status),
                    Err(e) => break WaitOutcome::Failed(SupervisorError::Wait(e)),
                },
            }
        };

        let (state, status) = match outcome {
            WaitOutcome::Exited(status) => {
                // Output written just before exit may still be buffered in the pipes.
                while lines_open {
                    tokio::select! {
                        biased;

                        () = cancel.cancelled() => lines_open = false,
                        line = lines.next() => match line {
                            Some(Ok(line)) => {
                                delivered += 1;
                                tracing::trace!(
                                    %id,
                                    stream = ?line.stream,
                                    line = %line.text,
                                    "Tool output"
                                );
                                on_line(&line.text);
                            }
                            Some(Err(e)) => {
                                tracing::debug!(%id, error = %e, "Skipping unreadable output line");
                            }
                            None => lines_open = false,
                        },
                        () = tokio::time::sleep(DRAIN_IDLE_TIMEOUT) => {
                            tracing::debug!(
                                %id,
                                "Output pipes still open after exit, stop reading"
                            );
                            lines_open = false;
                        }
                    }
                }
                (ExitState::NaturalExit, Some(status))
            }
            WaitOutcome::Cancelled => {
                tracing::info!(%id, "Requested to stop tool");
                (self.stop(&mut process, id).await?, None)
            }
            WaitOutcome::Watchdog => {
                tracing::warn!(%id, limit = ?self.max_runtime, "Tool exceeded its maximum runtime");
                (self.stop(&mut process, id).await?, None)
            }
            WaitOutcome::Failed(e) => {
                self.stop(&mut process, id).await?;
                return Err(e);
            }
        };

        machine.transition(state.into());
        let report = RunReport {
            id,
            state,
            status,
            lines: delivered,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            %id,
            state = ?report.state,
            code = ?report.exit_code(),
            lines = report.lines,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Tool finished"
        );
        Ok(report)
    }

    /// Stop the process and confirm it is gone.
    async fn stop(
        &self,
        process: &mut ToolProcess,
        id: Uuid,
    ) -> Result<ExitState, SupervisorError> {
        let pid = process.id();
        let termination = match process.terminate(self.terminate_grace).await {
            Ok(termination) => termination,
            Err(e) => {
                tracing::error!(%id, pid = ?pid, error = %e, "Failed to terminate tool");
                return Self::confirm_stopped(process, pid, SupervisorError::Terminate(e)).await;
            }
        };

        match termination {
            Termination::AlreadyExited | Termination::Graceful => Ok(ExitState::Cancelled),
            Termination::Forced => {
                tracing::warn!(%id, pid = ?pid, "Tool did not stop in time and was killed");
                Ok(ExitState::Killed)
            }
        }
    }

    /// Last-chance check after a failed termination attempt.
    async fn confirm_stopped(
        process: &mut ToolProcess,
        pid: Option<u32>,
        cause: SupervisorError,
    ) -> Result<ExitState, SupervisorError> {
        match tokio::time::timeout(KILL_CONFIRM_TIMEOUT, process.wait()).await {
            Ok(Ok(_)) => Ok(ExitState::Killed),
            Ok(Err(_)) => Err(cause),
            Err(_) => Err(SupervisorError::StillRunning { pid }),
        }
    }
}
