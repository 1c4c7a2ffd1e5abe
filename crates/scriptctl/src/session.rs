use crate::VERSION;
use crate::factory::{PlatformController, PlatformControllerFactory};
use scriptctl_core::pid_file::{read_pid, write_pid};
use scriptctl_core::validation::{
    ensure_executable, ensure_exists, ensure_parent_writable, ensure_writable_file,
};
use scriptctl_core::{
    ControllerConfig, LogHandling, ProcessController, ProcessControllerFactory, ProcessHandle,
    ProcessId, ProcessStatus, Result, ScriptCtlError, SessionConfig, output_lines, run_helper,
};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// One controlled script: the runtime, the script it runs and the files
/// that track it.
///
/// The PID is held in two places: the cached handle and the PID file. Whenever
/// the cached PID is `0` it is re-read from the file before status, start, stop
/// or `pid()`, so a new session picks up a process started by an earlier one.
pub struct ScriptSession<C = PlatformController> {
    controller: C,
    handle: ProcessHandle,
    executable: Option<PathBuf>,
    script: Option<PathBuf>,
    args: Vec<String>,
    pid_file: Option<PathBuf>,
    command_timeout: Duration,
}

impl ScriptSession<PlatformController> {
    /// Session backed by this platform's controller
    pub fn new(config: &ControllerConfig) -> Result<Self> {
        let controller = PlatformControllerFactory::create_controller(config)?;
        let mut session = Self::with_controller(controller);
        session.command_timeout = config.command_timeout();
        Ok(session)
    }

    /// Build a session from a loaded config; every path goes through its setter
    pub fn from_config(config: SessionConfig) -> Result<Self> {
        let mut session = Self::new(&config.controller)?;
        if let Some(path) = config.executable {
            session.set_executable(path)?;
        }
        if let Some(path) = config.script {
            session.set_script(path)?;
        }
        if let Some(path) = config.pid_file {
            session.set_pid_file(path)?;
        }
        if let Some(path) = config.log_file {
            session.set_log_file(path)?;
        }
        session.set_args(config.args);
        Ok(session)
    }
}

impl<C: ProcessController> ScriptSession<C> {
    pub fn with_controller(controller: C) -> Self {
        Self {
            controller,
            handle: ProcessHandle::default(),
            executable: None,
            script: None,
            args: Vec::new(),
            pid_file: None,
            command_timeout: ControllerConfig::default().command_timeout(),
        }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    /// Set the runtime executable; it must be an existing executable file
    pub fn set_executable(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        ensure_executable(&path)?;
        self.executable = Some(path);
        Ok(())
    }

    pub fn script(&self) -> Option<&Path> {
        self.script.as_deref()
    }

    /// Set the script the runtime is started with; it must exist
    pub fn set_script(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        ensure_exists(&path)?;
        self.script = Some(path);
        Ok(())
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Extra arguments passed to the script
    pub fn set_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
    }

    pub fn pid_file(&self) -> Option<&Path> {
        self.pid_file.as_deref()
    }

    /// Set the PID file; its directory must exist and be writable
    pub fn set_pid_file(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        ensure_parent_writable(&path)?;
        self.pid_file = Some(path);
        Ok(())
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.handle.log_file()
    }

    /// Set the log file for background runs; its directory must exist and be writable
    pub fn set_log_file(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.handle.set_log_file(path)
    }

    /// Command line of the last background start
    pub fn command(&self) -> &str {
        self.handle.command()
    }

    fn require_executable(&self) -> Result<&Path> {
        self.executable
            .as_deref()
            .ok_or_else(|| ScriptCtlError::state("no executable configured"))
    }

    fn require_script(&self) -> Result<&Path> {
        self.script
            .as_deref()
            .ok_or_else(|| ScriptCtlError::state("no script configured"))
    }

    fn require_pid_file(&self) -> Result<PathBuf> {
        self.pid_file
            .clone()
            .ok_or_else(|| ScriptCtlError::state("no PID file configured"))
    }

    /// Pick up the PID file's value when nothing is cached
    fn reconcile(&mut self) -> Result<()> {
        if !self.handle.pid().is_none() {
            return Ok(());
        }
        let Some(path) = self.pid_file.as_deref() else {
            return Ok(());
        };

        let pid = read_pid(path);
        if !pid.is_none() {
            debug!(pid = %pid, path = %path.display(), "Reconciled PID from file");
            self.handle.set_pid(pid)?;
        }
        Ok(())
    }

    /// Run the script in the foreground and wait for it to exit.
    ///
    /// Returns the stdout lines followed by the stderr lines. A non-zero exit
    /// is a [`ScriptCtlError::Run`] carrying the same lines.
    pub async fn execute(&self) -> Result<Vec<String>> {
        let executable = self.require_executable()?;
        let script = self.require_script()?;

        debug!(
            executable = %executable.display(),
            script = %script.display(),
            "Running script in foreground"
        );
        let output = Command::new(executable)
            .arg(script)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .await?;

        let mut lines = output_lines(&output.stdout);
        lines.extend(output_lines(&output.stderr));

        if output.status.success() {
            Ok(lines)
        } else {
            Err(ScriptCtlError::Run {
                code: output.status.code(),
                output: lines,
            })
        }
    }

    /// Start the script detached and persist its PID.
    ///
    /// Returns `false` when the process is already running or the controller
    /// could not start it. A PID left in the file by a process that has since
    /// died is discarded.
    pub async fn start_background(&mut self, log_handling: LogHandling) -> Result<bool> {
        let executable = self.require_executable()?.to_path_buf();
        let script = self.require_script()?.to_path_buf();
        let pid_file = self.require_pid_file()?;
        ensure_parent_writable(&pid_file)?;

        self.reconcile()?;
        if !self.handle.pid().is_none() {
            let pid = self.handle.pid();
            if self.controller.status(&self.handle).await?.is_running() {
                warn!(pid = %pid, "Script is already running");
                return Ok(false);
            }
            warn!(pid = %pid, "Discarding stale PID");
            self.handle.clear_pid();
        }

        let mut words = vec![script.display().to_string()];
        words.extend(self.args.iter().cloned());
        let command = self.controller.compose_command(&executable, &words)?;
        self.handle.set_command(command)?;

        if !self.controller.start(&mut self.handle, log_handling).await? {
            warn!(command = %self.handle.command(), "Background start failed");
            return Ok(false);
        }

        let pid = self.handle.pid();
        write_pid(&pid_file, pid)?;
        info!(pid = %pid, pid_file = %pid_file.display(), "Started script in background");
        Ok(true)
    }

    /// Stop the background script and reset the PID file to `0`.
    ///
    /// Returns `false` if the process is still alive after the confirmation
    /// window; the PID file is left untouched in that case.
    pub async fn stop_background(&mut self) -> Result<bool> {
        let pid_file = self.require_pid_file()?;
        if !pid_file.exists() {
            return Err(ScriptCtlError::state(format!(
                "PID file {} does not exist",
                pid_file.display()
            )));
        }
        ensure_writable_file(&pid_file)?;

        self.reconcile()?;
        let pid = self.handle.pid();
        if !self.controller.stop(&mut self.handle).await? {
            warn!(pid = %pid, "Script did not stop");
            return Ok(false);
        }

        write_pid(&pid_file, ProcessId::NONE)?;
        info!(pid = %pid, "Stopped background script");
        Ok(true)
    }

    pub async fn status(&mut self) -> Result<ProcessStatus> {
        self.reconcile()?;
        self.controller.status(&self.handle).await
    }

    /// Last known PID, `0` when none is recorded
    pub fn pid(&mut self) -> Result<ProcessId> {
        self.reconcile()?;
        Ok(self.handle.pid())
    }

    /// First line the runtime prints for `--version`
    pub async fn runtime_version(&self) -> Result<String> {
        let executable = self.require_executable()?;
        let mut cmd = Command::new(executable);
        cmd.arg("--version");
        let label = format!("{} --version", executable.display());
        let output = run_helper(&mut cmd, &label, self.command_timeout).await?;

        let mut lines = output_lines(&output.stdout);
        lines.extend(output_lines(&output.stderr));
        if !output.status.success() {
            return Err(ScriptCtlError::Run {
                code: output.status.code(),
                output: lines,
            });
        }
        Ok(lines.into_iter().next().unwrap_or_default())
    }

    pub fn control_version(&self) -> &'static str {
        VERSION
    }

    /// Human readable summary of the session
    pub async fn info(&mut self) -> Result<String> {
        fn shown(path: Option<&Path>) -> String {
            path.map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string())
        }

        let runtime = match self.runtime_version().await {
            Ok(version) => version,
            Err(e) => {
                debug!(error = %e, "Runtime version unavailable");
                "unknown".to_string()
            }
        };
        let status = match self.status().await? {
            ProcessStatus::Running => format!("running with PID {}", self.handle.pid()),
            ProcessStatus::Stopped => ProcessStatus::Stopped.to_string(),
        };

        Ok(format!(
            "scriptctl {version} ({platform})\n\
             \n\
             Version:       {runtime}\n\
             Path to exe:   {exe}\n\
             Script:        {script}\n\
             PID File:      {pid_file}\n\
             Logfile:       {log_file}\n\
             Status:        {status}\n",
            version = self.control_version(),
            platform = self.controller.platform_name(),
            exe = shown(self.executable()),
            script = shown(self.script()),
            pid_file = shown(self.pid_file()),
            log_file = shown(self.log_file()),
        ))
    }
}
