//! PID file persistence.
//!
//! The file holds a single trimmed decimal PID, `0` meaning "not running". It
//! outlives the host process and is the only record of a background script
//! once the session that started it is gone.

use crate::error::Result;
use crate::process::ProcessId;
use anyhow::Context;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Read the PID stored at `path`.
///
/// A missing, empty, unreadable or corrupt file and any non-positive value all
/// read as `ProcessId::NONE`.
pub fn read_pid(path: &Path) -> ProcessId {
    match std::fs::read_to_string(path) {
        Ok(content) => content.parse().unwrap_or_else(|_| {
            debug!(path = %path.display(), "PID file content is not a number");
            ProcessId::NONE
        }),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "PID file not readable");
            ProcessId::NONE
        }
    }
}

/// Replace the content of the PID file with `pid`.
///
/// Written to a uniquely named temp file in the same directory first and
/// renamed over the target.
pub fn write_pid(path: &Path, pid: ProcessId) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::Builder::new()
        .prefix(".scriptctl-pid")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create temp file next to {}", path.display()))?;
    temp.write_all(pid.to_string().as_bytes())
        .with_context(|| format!("Failed to write PID file {}", path.display()))?;
    temp.persist(path)
        .with_context(|| format!("Failed to replace PID file {}", path.display()))?;

    debug!(path = %path.display(), pid = %pid, "Persisted PID");
    Ok(())
}
