use crate::error::{Result, ScriptCtlError};
use crate::validation;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Operating system process identifier; `0` stands for "no process"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

impl ProcessId {
    pub const NONE: ProcessId = ProcessId(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        ProcessId(pid)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProcessId {
    type Err = std::num::ParseIntError;

    /// Parses trimmed decimal text. Values outside `1..=i32::MAX` collapse to `0`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let value: i64 = s.trim().parse()?;
        Ok(match i32::try_from(value) {
            Ok(pid) if pid > 0 => ProcessId(pid as u32),
            _ => ProcessId::NONE,
        })
    }
}

/// Liveness of a tracked process at the moment it was queried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Stopped,
}

impl ProcessStatus {
    pub fn is_running(self) -> bool {
        self == ProcessStatus::Running
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::Running => f.write_str("running"),
            ProcessStatus::Stopped => f.write_str("stopped"),
        }
    }
}

/// What to do with an existing log file when a background process starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogHandling {
    /// Truncate the log file
    #[default]
    Override,
    /// Keep previous content and append
    Append,
}

/// Result of a termination request
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationResult {
    /// The request was delivered
    Success,
    /// Process was not found (already exited)
    ProcessNotFound,
    /// Permission denied (insufficient privileges)
    AccessDenied,
    /// Operation failed with specific error message
    Failed(String),
}

/// State of one controlled process: what to run, where its output goes and
/// which PID it was last seen with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessHandle {
    command: String,
    pid: ProcessId,
    log_file: Option<PathBuf>,
}

impl ProcessHandle {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Replace the command. Rejected while a PID is tracked.
    pub fn set_command(&mut self, command: impl Into<String>) -> Result<()> {
        if !self.pid.is_none() {
            return Err(ScriptCtlError::state(format!(
                "command cannot change while process {} is tracked",
                self.pid
            )));
        }
        self.command = command.into();
        Ok(())
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Track an existing process, e.g. one read back from a PID file
    pub fn set_pid(&mut self, pid: ProcessId) -> Result<()> {
        if pid.is_none() {
            return Err(ScriptCtlError::state("PID must be greater than zero"));
        }
        self.pid = pid;
        Ok(())
    }

    pub fn clear_pid(&mut self) {
        self.pid = ProcessId::NONE;
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Set the log file; its directory must exist and be writable
    pub fn set_log_file(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        validation::ensure_parent_writable(&path)?;
        self.log_file = Some(path);
        Ok(())
    }

    pub fn clear_log_file(&mut self) {
        self.log_file = None;
    }
}

/// Query and signal side of the OS process table
///
/// Controllers depend only on these two questions, so a `ps` based table, a
/// helper-executable table or a native API can be swapped in freely.
#[async_trait]
pub trait ProcessTable: Send + Sync {
    /// Whether `pid` currently names a live (non-zombie) process
    async fn is_alive(&self, pid: ProcessId) -> Result<bool>;

    /// Ask the OS to terminate `pid`; does not wait for it to exit
    async fn terminate(&self, pid: ProcessId) -> Result<TerminationResult>;

    /// Short label for logs
    fn name(&self) -> &'static str;
}

#[async_trait]
impl ProcessTable for Box<dyn ProcessTable> {
    async fn is_alive(&self, pid: ProcessId) -> Result<bool> {
        (**self).is_alive(pid).await
    }

    async fn terminate(&self, pid: ProcessId) -> Result<TerminationResult> {
        (**self).terminate(pid).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_handle_has_no_pid() {
        let handle = ProcessHandle::new("node /srv/app.js");
        assert_eq!(handle.command(), "node /srv/app.js");
        assert_eq!(handle.pid(), ProcessId::NONE);
        assert!(handle.log_file().is_none());
    }

    #[test]
    fn test_set_pid_rejects_zero() {
        let mut handle = ProcessHandle::new("node app.js");
        assert!(handle.set_pid(ProcessId(0)).is_err());
        handle.set_pid(ProcessId(321)).unwrap();
        assert_eq!(handle.pid(), ProcessId(321));
        handle.clear_pid();
        assert!(handle.pid().is_none());
    }

    #[test]
    fn test_command_is_frozen_while_tracked() {
        let mut handle = ProcessHandle::new("node a.js");
        handle.set_command("node b.js").unwrap();
        handle.set_pid(ProcessId(7)).unwrap();

        let err = handle.set_command("node c.js").unwrap_err();
        assert!(matches!(err, ScriptCtlError::State(_)));
        assert_eq!(handle.command(), "node b.js");
    }

    #[test]
    fn test_log_file_requires_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = ProcessHandle::default();

        let good = dir.path().join("out.log");
        handle.set_log_file(&good).unwrap();

        let bad = dir.path().join("missing").join("out.log");
        assert!(handle.set_log_file(&bad).is_err());
        assert_eq!(handle.log_file(), Some(good.as_path()));
    }

    #[test]
    fn test_process_id_parsing() {
        assert_eq!(" 4242\n".parse::<ProcessId>().unwrap(), ProcessId(4242));
        assert_eq!("0".parse::<ProcessId>().unwrap(), ProcessId::NONE);
        assert_eq!("-12".parse::<ProcessId>().unwrap(), ProcessId::NONE);
        assert_eq!("2147483647".parse::<ProcessId>().unwrap(), ProcessId(2_147_483_647));
        // Would wrap to a negative pid_t (process group or -1 broadcast)
        assert_eq!("2147483648".parse::<ProcessId>().unwrap(), ProcessId::NONE);
        assert_eq!("4294967295".parse::<ProcessId>().unwrap(), ProcessId::NONE);
        assert_eq!("99999999999".parse::<ProcessId>().unwrap(), ProcessId::NONE);
        assert!("node".parse::<ProcessId>().is_err());
        assert!("".parse::<ProcessId>().is_err());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ProcessStatus::Running.to_string(), "running");
        assert_eq!(ProcessStatus::Stopped.to_string(), "stopped");
        assert_eq!(LogHandling::default(), LogHandling::Override);
    }
}
