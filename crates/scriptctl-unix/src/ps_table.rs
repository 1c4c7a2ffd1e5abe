use anyhow::anyhow;
use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use scriptctl_core::{
    ProcessId, ProcessTable, Result, ScriptCtlError, TerminationResult, output_lines, run_helper,
};
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Process table that asks `ps` for liveness and signals with SIGTERM
pub struct PsProcessTable {
    command_timeout: Duration,
}

impl PsProcessTable {
    pub fn new(command_timeout: Duration) -> Self {
        Self { command_timeout }
    }
}

/// Interpret `ps -o stat= -p <pid>` output: one state column per matching row
pub(crate) fn live_in_ps_output(stdout: &[u8]) -> bool {
    output_lines(stdout)
        .iter()
        .map(|line| line.trim())
        .find(|line| !line.is_empty())
        .is_some_and(|stat| !stat.starts_with('Z'))
}

#[async_trait]
impl ProcessTable for PsProcessTable {
    async fn is_alive(&self, pid: ProcessId) -> Result<bool> {
        if pid.is_none() {
            return Ok(false);
        }

        let pid_arg = pid.to_string();
        let mut cmd = Command::new("ps");
        cmd.args(["-o", "stat=", "-p", &pid_arg]);
        let output = run_helper(&mut cmd, &format!("ps -o stat= -p {pid}"), self.command_timeout).await?;

        if output.status.success() {
            return Ok(live_in_ps_output(&output.stdout));
        }

        // `ps` exits non-zero with a quiet stderr when nothing matched
        let stderr = output_lines(&output.stderr).join(" ");
        if stderr.trim().is_empty() {
            Ok(false)
        } else {
            Err(ScriptCtlError::Other(anyhow!("ps failed for PID {pid}: {stderr}")))
        }
    }

    async fn terminate(&self, pid: ProcessId) -> Result<TerminationResult> {
        // A negative pid_t would address a process group or every process
        let Ok(raw) = i32::try_from(pid.0) else {
            warn!(pid = %pid, "PID out of range for pid_t, not signalling");
            return Ok(TerminationResult::Failed(format!("PID {pid} out of range")));
        };
        if raw <= 0 {
            return Ok(TerminationResult::Failed(format!("PID {pid} out of range")));
        }

        Ok(match signal::kill(NixPid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) => {
                info!(pid = %pid, "Sent SIGTERM to process");
                TerminationResult::Success
            }
            Err(nix::errno::Errno::ESRCH) => {
                info!(pid = %pid, "Process not found (already terminated)");
                TerminationResult::ProcessNotFound
            }
            Err(nix::errno::Errno::EPERM) => {
                warn!(pid = %pid, "Permission denied to terminate process");
                TerminationResult::AccessDenied
            }
            Err(e) => {
                warn!(pid = %pid, error = %e, "Failed to send SIGTERM to process");
                TerminationResult::Failed(format!("SIGTERM failed: {e}"))
            }
        })
    }

    fn name(&self) -> &'static str {
        "ps"
    }
}
