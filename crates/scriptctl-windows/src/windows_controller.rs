use crate::pstools::{PsTools, PsToolsProcessTable, combined_lines};
use async_trait::async_trait;
use scriptctl_core::{
    ControllerConfig, LogHandling, ProcessController, ProcessHandle, ProcessId, ProcessStatus,
    ProcessTable, ProcessTableKind, Result, ScriptCtlError, SysinfoProcessTable, query_status,
    run_helper, stop_and_confirm,
};
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Windows controller: `psexec -d` launch, `pskill` stop, `pslist` liveness
pub struct WindowsProcessController {
    tools: PsTools,
    table: Box<dyn ProcessTable>,
    config: ControllerConfig,
}

impl WindowsProcessController {
    pub fn new(config: &ControllerConfig) -> Result<Self> {
        config.validate()?;
        let tools = PsTools::locate(config.helper_dir.as_deref())?;

        let table: Box<dyn ProcessTable> = match config.process_table {
            ProcessTableKind::Auto | ProcessTableKind::Helper => Box::new(
                PsToolsProcessTable::new(tools.clone(), config.command_timeout()),
            ),
            ProcessTableKind::Native => Box::new(SysinfoProcessTable::new()),
        };

        info!(
            psexec = %tools.psexec.display(),
            table = table.name(),
            "Initializing Windows process controller"
        );
        Ok(Self {
            tools,
            table,
            config: config.clone(),
        })
    }
}

/// Quote one word for the Windows command line
fn quote_word(word: &str) -> Result<String> {
    if word.contains('"') {
        return Err(ScriptCtlError::state(format!(
            "cannot quote {word:?}: embedded double quote"
        )));
    }
    if word.is_empty() || word.contains([' ', '\t']) {
        Ok(format!("\"{word}\""))
    } else {
        Ok(word.to_string())
    }
}

/// `cmd.exe /c` line that runs `command` with its output redirected
pub(crate) fn launch_line(
    command: &str,
    log_file: Option<&Path>,
    log_handling: LogHandling,
) -> String {
    let (redirect, target) = match log_file {
        Some(path) => {
            let redirect = match log_handling {
                LogHandling::Override => ">",
                LogHandling::Append => ">>",
            };
            (redirect, format!("\"{}\"", path.display()))
        }
        None => (">", "NUL".to_string()),
    };

    // cmd strips the outermost pair of quotes after /c
    format!("cmd.exe /c \"{command} {redirect} {target} 2>&1\"")
}

/// PID from the `... started on HOST with process ID 1234.` line
pub(crate) fn parse_started_pid(lines: &[String]) -> Option<ProcessId> {
    lines
        .iter()
        .rev()
        .find(|line| line.contains("process ID"))
        .and_then(|line| line.split_whitespace().last())
        .map(|token| token.trim_end_matches(|c: char| !c.is_ascii_digit()))
        .and_then(|token| token.parse::<ProcessId>().ok())
        .filter(|pid| !pid.is_none())
}

/// PID reported by `psexec -d`.
///
/// The text line is preferred; `-d` also sets the exit status to the PID,
/// which is used when the line is missing but psexec still says it started
/// the process.
pub(crate) fn reported_pid(output: &Output) -> Option<ProcessId> {
    let lines = combined_lines(output);
    if let Some(pid) = parse_started_pid(&lines) {
        return Some(pid);
    }

    let started = lines.iter().any(|line| line.contains("started"));
    match output.status.code() {
        Some(code) if started && code > 0 => {
            debug!(code, "Taking PID from psexec exit status");
            Some(ProcessId(code as u32))
        }
        _ => None,
    }
}

#[async_trait]
impl ProcessController for WindowsProcessController {
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

        let line = launch_line(&command, handle.log_file(), log_handling);
        let mut psexec = Command::new(&self.tools.psexec);
        psexec.args(["-accepteula", "-d"]);

        #[cfg(windows)]
        {
            // CREATE_NO_WINDOW (0x08000000) - no console popup for the helper
            psexec.creation_flags(0x08000000);
            // cmd.exe parses its own quoting; hand the line over untouched
            psexec.raw_arg(&line);
        }
        #[cfg(not(windows))]
        psexec.arg(&line);

        let label = format!("psexec -d {line}");
        let output = run_helper(&mut psexec, &label, self.config.command_timeout()).await?;

        match reported_pid(&output) {
            Some(pid) => {
                handle.set_pid(pid)?;
                info!(pid = %pid, command = %command, "Spawned background process");
                Ok(true)
            }
            None => {
                warn!(
                    command = %command,
                    status = ?output.status.code(),
                    output = %combined_lines(&output).join(" "),
                    "psexec did not report a PID"
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
        let mut words = vec![quote_word(&program.display().to_string())?];
        for arg in args {
            words.push(quote_word(arg)?);
        }
        Ok(words.join(" "))
    }

    fn platform_name(&self) -> &'static str {
        "Windows"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[cfg(unix)]
    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        use std::os::unix::process::ExitStatusExt;
        Output {
            status: std::process::ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[cfg(windows)]
    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        use std::os::windows::process::ExitStatusExt;
        Output {
            status: std::process::ExitStatus::from_raw(code as u32),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_parse_started_pid() {
        let banner = lines(
            "PsExec v2.43 - Execute processes remotely\n\
             Copyright (C) 2001-2023 Mark Russinovich\n\
             \n\
             cmd.exe started on BUILD01 with process ID 5120.",
        );
        assert_eq!(parse_started_pid(&banner), Some(ProcessId(5120)));
    }

    #[test]
    fn test_parse_started_pid_ignores_other_lines() {
        assert_eq!(parse_started_pid(&lines("The system cannot find the file specified.")), None);
        assert_eq!(parse_started_pid(&lines("started with process ID 0.")), None);
        assert_eq!(parse_started_pid(&[]), None);
    }

    #[test]
    fn test_reported_pid_prefers_text() {
        let out = output(77, "", "cmd.exe started on BUILD01 with process ID 5120.\n");
        assert_eq!(reported_pid(&out), Some(ProcessId(5120)));
    }

    #[test]
    fn test_reported_pid_falls_back_to_exit_status() {
        let out = output(101, "", "cmd.exe started on BUILD01.\n");
        assert_eq!(reported_pid(&out), Some(ProcessId(101)));
    }

    #[test]
    fn test_failed_launch_reports_no_pid() {
        let out = output(2, "", "PsExec could not start cmd.exe:\nThe system cannot find the file specified.\n");
        assert_eq!(reported_pid(&out), None);
    }

    #[test]
    fn test_launch_line_redirection() {
        let log = PathBuf::from(r"C:\logs\app.log");
        assert_eq!(
            launch_line("node app.js", Some(&log), LogHandling::Override),
            r#"cmd.exe /c "node app.js > "C:\logs\app.log" 2>&1""#
        );
        assert_eq!(
            launch_line("node app.js", Some(&log), LogHandling::Append),
            r#"cmd.exe /c "node app.js >> "C:\logs\app.log" 2>&1""#
        );
        assert_eq!(
            launch_line("node app.js", None, LogHandling::Append),
            r#"cmd.exe /c "node app.js > NUL 2>&1""#
        );
    }

    #[test]
    fn test_quote_word() {
        assert_eq!(quote_word(r"C:\nodejs\node.exe").unwrap(), r"C:\nodejs\node.exe");
        assert_eq!(
            quote_word(r"C:\Program Files\nodejs\node.exe").unwrap(),
            r#""C:\Program Files\nodejs\node.exe""#
        );
        assert_eq!(quote_word("").unwrap(), r#""""#);
        assert!(quote_word(r#"say "hi""#).is_err());
    }
}
