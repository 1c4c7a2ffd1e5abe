use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result alias used across the scriptctl crates
pub type Result<T> = std::result::Result<T, ScriptCtlError>;

/// Why a configured path was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathProblem {
    DoesNotExist,
    NotAFile,
    NotExecutable,
    ParentMissing,
    ParentNotWritable,
    NotWritable,
}

impl fmt::Display for PathProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            PathProblem::DoesNotExist => "does not exist",
            PathProblem::NotAFile => "is not a file",
            PathProblem::NotExecutable => "is not executable",
            PathProblem::ParentMissing => "parent directory does not exist",
            PathProblem::ParentNotWritable => "parent directory not writable",
            PathProblem::NotWritable => "not writable",
        };
        f.write_str(reason)
    }
}

/// Core error types for scriptctl operations
#[derive(Error, Debug)]
pub enum ScriptCtlError {
    #[error("Path error: {} {reason}", path.display())]
    Path { path: PathBuf, reason: PathProblem },

    #[error("Script exited with {}: {}", exit_label(*code), output.join(" | "))]
    Run {
        code: Option<i32>,
        output: Vec<String>,
    },

    #[error("Invalid state: {0}")]
    State(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Command `{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl ScriptCtlError {
    pub fn path(path: impl Into<PathBuf>, reason: PathProblem) -> Self {
        ScriptCtlError::Path {
            path: path.into(),
            reason,
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        ScriptCtlError::State(message.into())
    }

    /// Errors the caller can fix by reconfiguring the session
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, ScriptCtlError::Path { .. } | ScriptCtlError::State(_))
    }

    /// Errors that mean the environment cannot host a controller at all
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScriptCtlError::Platform(_))
    }

    /// Captured output of a failed foreground run
    pub fn run_output(&self) -> Option<&[String]> {
        match self {
            ScriptCtlError::Run { output, .. } => Some(output),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_error_names_path_and_reason() {
        let error = ScriptCtlError::path("/opt/node/bin/node", PathProblem::NotExecutable);
        let display = format!("{error}");
        assert!(display.contains("/opt/node/bin/node"));
        assert!(display.contains("is not executable"));
    }

    #[test]
    fn test_run_error_carries_output() {
        let error = ScriptCtlError::Run {
            code: Some(1),
            output: vec!["boom".to_string(), "trace".to_string()],
        };
        assert_eq!(
            error.run_output(),
            Some(&["boom".to_string(), "trace".to_string()][..])
        );
        let display = format!("{error}");
        assert!(display.contains("status 1"));
        assert!(display.contains("boom | trace"));
    }

    #[test]
    fn test_error_categorization() {
        assert!(ScriptCtlError::path("/tmp/x", PathProblem::DoesNotExist).is_configuration_error());
        assert!(ScriptCtlError::state("no pid file").is_configuration_error());
        assert!(!ScriptCtlError::Platform("pslist.exe missing".into()).is_configuration_error());

        assert!(ScriptCtlError::Platform("pslist.exe missing".into()).is_fatal());
        assert!(!ScriptCtlError::state("no pid file").is_fatal());
        assert!(ScriptCtlError::state("no pid file").run_output().is_none());
    }

    #[test]
    fn test_error_debug_format() {
        let error = ScriptCtlError::Timeout {
            command: "ps -p 42".to_string(),
            timeout: Duration::from_secs(1),
        };
        let debug_str = format!("{error:?}");
        assert!(debug_str.contains("Timeout"));
        assert!(debug_str.contains("ps -p 42"));
    }
}
