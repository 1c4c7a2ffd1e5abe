use crate::error::{Result, ScriptCtlError};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which process table backs liveness checks and termination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProcessTableKind {
    /// Native on Unix, helper executables on Windows
    #[default]
    Auto,
    /// OS process APIs
    Native,
    /// External listing/kill commands (`ps`/`kill`, `pslist`/`pskill`)
    Helper,
}

/// Tunables shared by the platform controllers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into, strip_option), default)]
pub struct ControllerConfig {
    /// Upper bound for every helper command the controller runs (in milliseconds)
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// How long a stop waits for the process to disappear (in milliseconds)
    #[serde(default = "default_stop_confirm_ms")]
    pub stop_confirm_ms: u64,

    /// Delay between liveness checks while confirming a stop (in milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub process_table: ProcessTableKind,

    /// Directory holding the Windows helper executables; `PATH` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_dir: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout_ms(),
            stop_confirm_ms: default_stop_confirm_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            process_table: ProcessTableKind::default(),
            helper_dir: None,
        }
    }
}

impl ControllerConfig {
    pub fn builder() -> ControllerConfigBuilder {
        ControllerConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_ms == 0 {
            return Err(ScriptCtlError::state("command_timeout_ms must be greater than zero"));
        }

        if self.poll_interval_ms == 0 {
            return Err(ScriptCtlError::state("poll_interval_ms must be greater than zero"));
        }

        if self.poll_interval_ms > self.stop_confirm_ms {
            return Err(ScriptCtlError::state(
                "poll_interval_ms cannot be greater than stop_confirm_ms",
            ));
        }

        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn stop_confirm(&self) -> Duration {
        Duration::from_millis(self.stop_confirm_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Everything a session needs, in a form that can be loaded from JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub controller: ControllerConfig,
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SessionConfig = serde_json::from_str(json)
            .map_err(|e| ScriptCtlError::state(format!("invalid session config: {e}")))?;
        config.controller.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

// Default value functions for serde
fn default_command_timeout_ms() -> u64 {
    10_000
}
fn default_stop_confirm_ms() -> u64 {
    5_000
}
fn default_poll_interval_ms() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.command_timeout(), Duration::from_secs(10));
        assert_eq!(config.process_table, ProcessTableKind::Auto);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ControllerConfig::builder()
            .command_timeout_ms(250u64)
            .helper_dir("C:\\tools\\pstools")
            .build()
            .unwrap();
        assert_eq!(config.command_timeout_ms, 250);
        assert_eq!(config.stop_confirm_ms, 5_000);
        assert_eq!(config.helper_dir, Some(PathBuf::from("C:\\tools\\pstools")));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = ControllerConfig {
            command_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.command_timeout_ms = 1_000;
        config.poll_interval_ms = 6_000;
        assert!(config.validate().is_err());

        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_config_from_json() {
        let config = SessionConfig::from_json(
            r#"{
                "executable": "/usr/bin/node",
                "script": "/srv/app/server.js",
                "args": ["--port", "8000"],
                "pidFile": "/run/app/server.pid",
                "controller": { "stopConfirmMs": 2000, "processTable": "helper" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.executable, Some(PathBuf::from("/usr/bin/node")));
        assert_eq!(config.args, vec!["--port", "8000"]);
        assert!(config.log_file.is_none());
        assert_eq!(config.controller.stop_confirm_ms, 2_000);
        assert_eq!(config.controller.poll_interval_ms, 100);
        assert_eq!(config.controller.process_table, ProcessTableKind::Helper);
    }

    #[test]
    fn test_session_config_rejects_bad_controller() {
        let result = SessionConfig::from_json(r#"{ "controller": { "commandTimeoutMs": 0 } }"#);
        assert!(matches!(result, Err(ScriptCtlError::State(_))));
        assert!(SessionConfig::from_json("not json").is_err());
    }
}
