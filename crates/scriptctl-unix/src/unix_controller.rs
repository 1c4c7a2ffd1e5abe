use crate::ps_table::PsProcessTable;
use async_trait::async_trait;
use scriptctl_core::{
    ControllerConfig, LogHandling, ProcessController, ProcessHandle, ProcessId, ProcessStatus,
    ProcessTable, ProcessTableKind, Result, ScriptCtlError, SysinfoProcessTable, find_in_path,
    output_lines, query_status, run_helper, stop_and_confirm,
};
use std::path::Path;
use tokio::process::Command;
use tracing::{info, warn};

/// POSIX controller: detached shell launch, SIGTERM stop, process-table liveness
pub struct UnixProcessController {
    table: Box<dyn ProcessTable>,
    config: ControllerConfig,
}

impl UnixProcessController {
    pub fn new(config: &ControllerConfig) -> Result<Self> {
        config.validate()?;

        let table: Box<dyn ProcessTable> = match config.process_table {
            ProcessTableKind::Auto | ProcessTableKind::Native => Box::new(SysinfoProcessTable::new()),
            ProcessTableKind::Helper => {
                if find_in_path("ps").is_none() {
                    return Err(ScriptCtlError::Platform("`ps` was not found on PATH".into()));
                }
                Box::new(PsProcessTable::new(config.command_timeout()))
            }
        };

        info!(table = table.name(), "Initializing Unix process controller");
        Ok(Self::with_table(config, table))
    }

    /// Use a caller-supplied process table
    pub fn with_table(config: &ControllerConfig, table: Box<dyn ProcessTable>) -> Self {
        Self {
            table,
            config: config.clone(),
        }
    }
}

fn quote(word: &str) -> Result<String> {
    shlex::try_quote(word)
        .map(|quoted| quoted.into_owned())
        .map_err(|e| ScriptCtlError::state(format!("cannot quote {word:?}: {e}")))
}

/// Shell snippet that backgrounds `command` immune to hangups and prints its PID
pub(crate) fn background_script(
    command: &str,
    log_file: Option<&Path>,
    log_handling: LogHandling,
) -> Result<String> {
    let target = match log_file {
        Some(path) => {
            let path = path.to_str().ok_or_else(|| {
                ScriptCtlError::state(format!("log path {} is not valid UTF-8", path.display()))
            })?;
            quote(path)?
        }
        None => "/dev/null".to_string(),
    };

    let redirect = match (log_file, log_handling) {
        (Some(_), LogHandling::Append) => ">>",
        _ => ">",
    };

    Ok(format!("nohup {command} {redirect} {target} 2>&1 & echo $!"))
}

/// The launcher's first stdout line is `$!`
pub(crate) fn parse_echoed_pid(stdout: &[u8]) -> Option<ProcessId> {
    output_lines(stdout)
        .first()
        .and_then(|line| line.parse::<ProcessId>().ok())
        .filter(|pid| !pid.is_none())
}

#[async_trait]
impl ProcessController for UnixProcessController {
    async fn start(&self, handle: &mut ProcessHandle, log_handling: LogHandling) -> Result<bool> {
        let command = handle.command().trim().to_string();
        if command.is_empty() {
            warn!("Refusing to start an empty command");
            return Ok(false);
        }
        if !handle.pid().is_none() {
            warn!(pid = %handle.pid(), "Process already tracked, not starting another");
            return Ok(false);
        }

        let script = background_script(&command, handle.log_file(), log_handling)?;
        let mut launcher = Command::new("sh");
        launcher.arg("-c").arg(&script);
        // Own process group so terminal signals aimed at the host miss the child
        launcher.process_group(0);

        let label = format!("sh -c {script}");
        let output = run_helper(&mut launcher, &label, self.config.command_timeout()).await?;

        match parse_echoed_pid(&output.stdout) {
            Some(pid) => {
                handle.set_pid(pid)?;
                info!(pid = %pid, command = %command, "Spawned background process");
                Ok(true)
            }
            None => {
                warn!(
                    command = %command,
                    status = ?output.status.code(),
                    stderr = %output_lines(&output.stderr).join(" "),
                    "Launcher did not report a PID"
                );
                Ok(false)
            }
        }
    }

    async fn stop(&self, handle: &mut ProcessHandle) -> Result<bool> {
        stop_and_confirm(&self.table, handle, &self.config).await
    }

    async fn status(&self, handle: &ProcessHandle) -> Result<ProcessStatus> {
        query_status(&self.table, handle.pid()).await
    }

    fn compose_command(&self, program: &Path, args: &[String]) -> Result<String> {
        let program = program.to_str().ok_or_else(|| {
            ScriptCtlError::state(format!("program path {} is not valid UTF-8", program.display()))
        })?;

        shlex::try_join(std::iter::once(program).chain(args.iter().map(String::as_str)))
            .map_err(|e| ScriptCtlError::state(format!("cannot quote command line: {e}")))
    }

    fn platform_name(&self) -> &'static str {
        "Unix"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn controller() -> UnixProcessController {
        let config = ControllerConfig {
            stop_confirm_ms: 3_000,
            poll_interval_ms: 20,
            ..Default::default()
        };
        UnixProcessController::new(&config).unwrap()
    }

    #[test]
    fn test_background_script_without_log() {
        let script = background_script("node /srv/app.js", None, LogHandling::Append).unwrap();
        assert_eq!(script, "nohup node /srv/app.js > /dev/null 2>&1 & echo $!");
    }

    #[test]
    fn test_background_script_log_modes() {
        let log = PathBuf::from("/var/log/app.log");
        let truncate = background_script("node app.js", Some(&log), LogHandling::Override).unwrap();
        assert_eq!(truncate, "nohup node app.js > /var/log/app.log 2>&1 & echo $!");

        let append = background_script("node app.js", Some(&log), LogHandling::Append).unwrap();
        assert_eq!(append, "nohup node app.js >> /var/log/app.log 2>&1 & echo $!");
    }

    #[test]
    fn test_background_script_quotes_log_path() {
        let log = PathBuf::from("/tmp/my logs/app.log");
        let script = background_script("node app.js", Some(&log), LogHandling::Override).unwrap();
        assert_eq!(script, "nohup node app.js > '/tmp/my logs/app.log' 2>&1 & echo $!");
    }

    #[test]
    fn test_parse_echoed_pid() {
        assert_eq!(parse_echoed_pid(b"4711\n"), Some(ProcessId(4711)));
        assert_eq!(parse_echoed_pid(b"4711\nextra\n"), Some(ProcessId(4711)));
        assert_eq!(parse_echoed_pid(b"0\n"), None);
        assert_eq!(parse_echoed_pid(b""), None);
        assert_eq!(parse_echoed_pid(b"sh: nohup: not found\n"), None);
    }

    #[test]
    fn test_compose_command_quotes_words() {
        let composed = controller()
            .compose_command(
                Path::new("/usr/bin/node"),
                &[
                    "/srv/my app/server.js".to_string(),
                    "--port".to_string(),
                    "8000".to_string(),
                ],
            )
            .unwrap();
        assert_eq!(composed, "/usr/bin/node '/srv/my app/server.js' --port 8000");
    }

    #[tokio::test]
    async fn test_start_rejects_empty_or_tracked() {
        let controller = controller();

        let mut empty = ProcessHandle::new("   ");
        assert!(!controller.start(&mut empty, LogHandling::Override).await.unwrap());
        assert!(empty.pid().is_none());

        let mut tracked = ProcessHandle::new("sleep 30");
        tracked.set_pid(ProcessId(std::process::id())).unwrap();
        assert!(!controller.start(&mut tracked, LogHandling::Override).await.unwrap());
        assert_eq!(tracked.pid(), ProcessId(std::process::id()));
    }

    #[tokio::test]
    async fn test_start_status_stop_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("sleep.log");

        let controller = controller();
        let mut handle = ProcessHandle::new("sh -c 'echo booted; exec sleep 30'");
        handle.set_log_file(&log).unwrap();

        assert!(controller.start(&mut handle, LogHandling::Override).await.unwrap());
        let pid = handle.pid();
        assert!(!pid.is_none());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(controller.status(&handle).await.unwrap(), ProcessStatus::Running);
        assert_eq!(std::fs::read_to_string(&log).unwrap().trim(), "booted");

        assert!(controller.stop(&mut handle).await.unwrap());
        assert!(handle.pid().is_none());
        assert_eq!(controller.status(&handle).await.unwrap(), ProcessStatus::Stopped);

        let mut probe = ProcessHandle::default();
        probe.set_pid(pid).unwrap();
        assert_eq!(controller.status(&probe).await.unwrap(), ProcessStatus::Stopped);
    }

    #[tokio::test]
    async fn test_child_outlives_launcher() {
        let controller = controller();
        let mut handle = ProcessHandle::new("sleep 30");
        assert!(controller.start(&mut handle, LogHandling::Override).await.unwrap());

        // The `sh` launcher has exited by now; the backgrounded job must not have
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(controller.status(&handle).await.unwrap(), ProcessStatus::Running);
        assert!(controller.stop(&mut handle).await.unwrap());
    }

    #[tokio::test]
    async fn test_stop_without_pid() {
        let mut handle = ProcessHandle::new("sleep 30");
        assert!(controller().stop(&mut handle).await.unwrap());
    }
}
