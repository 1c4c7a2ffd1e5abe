use async_trait::async_trait;
use scriptctl_core::{
    ProcessId, ProcessTable, Result, ScriptCtlError, TerminationResult, find_in_path,
    output_lines, run_helper,
};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

pub const PSEXEC: &str = "psexec.exe";
pub const PSKILL: &str = "pskill.exe";
pub const PSLIST: &str = "pslist.exe";

/// Resolved locations of the Sysinternals helpers
#[derive(Debug, Clone, PartialEq)]
pub struct PsTools {
    pub psexec: PathBuf,
    pub pskill: PathBuf,
    pub pslist: PathBuf,
}

impl PsTools {
    /// Find the helpers in `helper_dir`, or on `PATH` when no directory is given.
    ///
    /// A missing helper is a platform error: without it the controller cannot work.
    pub fn locate(helper_dir: Option<&Path>) -> Result<Self> {
        let find = |name: &str| -> Result<PathBuf> {
            let found = match helper_dir {
                Some(dir) => Some(dir.join(name)).filter(|candidate| candidate.is_file()),
                None => find_in_path(name),
            };
            found.ok_or_else(|| {
                let place = match helper_dir {
                    Some(dir) => dir.display().to_string(),
                    None => "PATH".to_string(),
                };
                ScriptCtlError::Platform(format!("helper executable {name} not found in {place}"))
            })
        };

        Ok(Self {
            psexec: find(PSEXEC)?,
            pskill: find(PSKILL)?,
            pslist: find(PSLIST)?,
        })
    }
}

/// All output lines of a helper; PsTools print their banners on stderr
pub(crate) fn combined_lines(output: &Output) -> Vec<String> {
    let mut lines = output_lines(&output.stdout);
    lines.extend(output_lines(&output.stderr));
    lines
}

/// Whether a `pslist <pid>` listing contains a row for `pid`.
///
/// Rows read `Name Pid Pri Thd Hnd Priv CPU-Time Elapsed-Time`. Banner and
/// `process 4242 was not found on HOST.` lines never have the PID second
/// followed by numeric columns, so only the column layout is checked.
pub(crate) fn pid_listed(lines: &[String], pid: ProcessId) -> bool {
    let wanted = pid.to_string();
    lines.iter().any(|line| {
        let mut columns = line.split_whitespace().skip(1);
        columns.next() == Some(wanted.as_str())
            && columns
                .next()
                .is_some_and(|pri| pri.chars().all(|c| c.is_ascii_digit()))
    })
}

/// Map `pskill` output onto a termination result
pub(crate) fn classify_pskill(success: bool, lines: &[String]) -> TerminationResult {
    let text = lines.join(" ");
    let lowered = text.to_lowercase();

    if lowered.contains("access is denied") {
        TerminationResult::AccessDenied
    } else if lowered.contains("does not exist") || lowered.contains("not found") {
        TerminationResult::ProcessNotFound
    } else if success && lowered.contains("killed") {
        TerminationResult::Success
    } else {
        TerminationResult::Failed(text)
    }
}

/// Process table that shells out to `pslist` and `pskill`
pub struct PsToolsProcessTable {
    tools: PsTools,
    command_timeout: Duration,
}

impl PsToolsProcessTable {
    pub fn new(tools: PsTools, command_timeout: Duration) -> Self {
        Self {
            tools,
            command_timeout,
        }
    }
}

#[async_trait]
impl ProcessTable for PsToolsProcessTable {
    async fn is_alive(&self, pid: ProcessId) -> Result<bool> {
        if pid.is_none() {
            return Ok(false);
        }

        let mut cmd = Command::new(&self.tools.pslist);
        cmd.args(["-accepteula", &pid.to_string()]);
        let output = run_helper(&mut cmd, &format!("pslist {pid}"), self.command_timeout).await?;

        Ok(pid_listed(&combined_lines(&output), pid))
    }

    async fn terminate(&self, pid: ProcessId) -> Result<TerminationResult> {
        let mut cmd = Command::new(&self.tools.pskill);
        // -t takes the cmd.exe wrapper and the script it runs down together
        cmd.args(["-accepteula", "-t", &pid.to_string()]);
        let output = run_helper(&mut cmd, &format!("pskill -t {pid}"), self.command_timeout).await?;

        let result = classify_pskill(output.status.success(), &combined_lines(&output));
        match &result {
            TerminationResult::Success => info!(pid = %pid, "Killed process tree"),
            TerminationResult::ProcessNotFound => {
                info!(pid = %pid, "Process not found (already terminated)")
            }
            other => warn!(pid = %pid, result = ?other, "pskill did not kill process"),
        }
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "pstools"
    }
}
