use crate::config::ControllerConfig;
use crate::error::Result;
use crate::process::{LogHandling, ProcessHandle, ProcessId, ProcessStatus, ProcessTable, TerminationResult};
use async_trait::async_trait;
use std::path::Path;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Platform strategy for starting, stopping and observing a detached process
///
/// The controller owns no live handle to the child. Everything after the
/// spawn goes through the PID kept in the [`ProcessHandle`].
///
/// # State machine
///
/// ```text
/// NotStarted(pid = 0) --start--> Running(pid = p) --stop--> NotStarted(pid = 0)
/// ```
///
/// `start` while a PID is tracked is rejected with `false`, `stop` without a
/// PID succeeds immediately and `status` never changes the handle.
#[async_trait]
pub trait ProcessController: Send + Sync {
    /// Spawn `handle.command()` detached from the caller.
    ///
    /// Output goes to `handle.log_file()` (truncated or appended according to
    /// `log_handling`) or is discarded. Returns `true` and records the PID in
    /// the handle when the platform reported one; returns `false` when the
    /// command is empty, a PID is already tracked or no PID was reported.
    async fn start(&self, handle: &mut ProcessHandle, log_handling: LogHandling) -> Result<bool>;

    /// Request termination of the tracked PID and confirm it is gone.
    ///
    /// Returns `true` (and clears the PID) only once the process table no
    /// longer lists the process.
    async fn stop(&self, handle: &mut ProcessHandle) -> Result<bool>;

    /// Point-in-time liveness of the tracked PID
    async fn status(&self, handle: &ProcessHandle) -> Result<ProcessStatus>;

    /// Quote `program` and `args` into a single command line for this platform
    fn compose_command(&self, program: &Path, args: &[String]) -> Result<String>;

    /// Get the platform name for logging and debugging
    fn platform_name(&self) -> &'static str;
}

/// Factory trait for creating platform-specific controllers
pub trait ProcessControllerFactory {
    /// The type of controller this factory creates
    type Controller: ProcessController;

    /// Create a controller for the current platform.
    ///
    /// Fails with a platform error when a required helper is unavailable.
    fn create_controller(config: &ControllerConfig) -> Result<Self::Controller>;

    fn platform_name() -> &'static str;
}

/// Status lookup shared by the platform controllers
pub async fn query_status<T>(table: &T, pid: ProcessId) -> Result<ProcessStatus>
where
    T: ProcessTable + ?Sized,
{
    if pid.is_none() {
        return Ok(ProcessStatus::Stopped);
    }

    let alive = table.is_alive(pid).await?;
    debug!(pid = %pid, table = table.name(), alive, "Queried process table");

    Ok(if alive {
        ProcessStatus::Running
    } else {
        ProcessStatus::Stopped
    })
}

/// Send one termination request and poll until the process is gone.
///
/// The request is never repeated. Polling runs every
/// `config.poll_interval()` for at most `config.stop_confirm()`.
pub async fn stop_and_confirm<T>(
    table: &T,
    handle: &mut ProcessHandle,
    config: &ControllerConfig,
) -> Result<bool>
where
    T: ProcessTable + ?Sized,
{
    let pid = handle.pid();
    if pid.is_none() {
        return Ok(true);
    }

    match table.terminate(pid).await? {
        TerminationResult::Success => {
            debug!(pid = %pid, "Termination requested, confirming exit");
        }
        TerminationResult::ProcessNotFound => {
            debug!(pid = %pid, "Process already gone, confirming");
        }
        TerminationResult::AccessDenied => {
            warn!(pid = %pid, "Permission denied to terminate process");
        }
        TerminationResult::Failed(reason) => {
            warn!(pid = %pid, reason = %reason, "Termination request failed");
        }
    }

    let deadline = Instant::now() + config.stop_confirm();
    loop {
        if !table.is_alive(pid).await? {
            info!(pid = %pid, "Process stopped");
            handle.clear_pid();
            return Ok(true);
        }

        if Instant::now() >= deadline {
            warn!(
                pid = %pid,
                waited_ms = config.stop_confirm_ms,
                "Process still running after termination request"
            );
            return Ok(false);
        }

        tokio::time::sleep(config.poll_interval()).await;
    }
}
