use crate::error::{Result, ScriptCtlError};
use anyhow::Context;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Run a short-lived helper command and collect its output.
///
/// The child gets a null stdin and is killed if it outlives `timeout`. A
/// non-zero exit status is not an error here; callers interpret it.
pub async fn run_helper(command: &mut Command, label: &str, timeout: Duration) -> Result<Output> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(command = %label, "Running helper command");

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| ScriptCtlError::Timeout {
            command: label.to_string(),
            timeout,
        })?
        .with_context(|| format!("Failed to run helper command: {label}"))?;

    debug!(command = %label, status = ?output.status.code(), "Helper command finished");
    Ok(output)
}

/// Split captured output into lines, dropping the trailing empty one
pub fn output_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}

/// Look `program` up on `PATH`
pub fn find_in_path(program: impl AsRef<OsStr>) -> Option<PathBuf> {
    let program = Path::new(program.as_ref());
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
