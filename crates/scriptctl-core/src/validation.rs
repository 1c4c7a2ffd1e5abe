//! Set-time checks for configured paths.
//!
//! Every check either succeeds or returns a `Path` error naming the path and
//! the reason. The only filesystem write is the writability probe, a
//! temporary file that is removed again immediately.

use crate::error::{PathProblem, Result, ScriptCtlError};
use std::fs::OpenOptions;
use std::path::Path;

/// The path must exist
pub fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(ScriptCtlError::path(path, PathProblem::DoesNotExist));
    }
    Ok(())
}

/// The path must be an existing regular file the current user may execute
pub fn ensure_executable(path: &Path) -> Result<()> {
    ensure_exists(path)?;
    let metadata = path.metadata()?;
    if !metadata.is_file() {
        return Err(ScriptCtlError::path(path, PathProblem::NotAFile));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(ScriptCtlError::path(path, PathProblem::NotExecutable));
        }
    }

    Ok(())
}

/// The directory that will hold `path` must exist and accept new files
pub fn ensure_parent_writable(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    if !parent.is_dir() {
        return Err(ScriptCtlError::path(parent, PathProblem::ParentMissing));
    }

    tempfile::Builder::new()
        .prefix(".scriptctl-probe")
        .tempfile_in(parent)
        .map_err(|_| ScriptCtlError::path(parent, PathProblem::ParentNotWritable))?;

    Ok(())
}

/// The file must exist and be open-able for writing, without touching its content
pub fn ensure_writable_file(path: &Path) -> Result<()> {
    ensure_exists(path)?;
    OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|_| ScriptCtlError::path(path, PathProblem::NotWritable))?;
    Ok(())
}
