use crate::error::Result;
use crate::process::{ProcessId, ProcessTable, TerminationResult};
use async_trait::async_trait;
use std::sync::Mutex;
use sysinfo::{Pid, ProcessStatus as OsProcessStatus, ProcessesToUpdate, Signal, System};
use tracing::{info, warn};

/// Process table backed by the OS process APIs through `sysinfo`
pub struct SysinfoProcessTable {
    system: Mutex<System>,
}

impl Default for SysinfoProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProcessTable {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, System> {
        // Poisoned only if another query panicked mid-refresh
        self.system.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ProcessTable for SysinfoProcessTable {
    async fn is_alive(&self, pid: ProcessId) -> Result<bool> {
        if pid.is_none() {
            return Ok(false);
        }

        let os_pid = Pid::from_u32(pid.0);
        let mut system = self.lock();
        system.refresh_processes(ProcessesToUpdate::Some(&[os_pid]), true);

        Ok(system
            .process(os_pid)
            .is_some_and(|process| process.status() != OsProcessStatus::Zombie))
    }

    async fn terminate(&self, pid: ProcessId) -> Result<TerminationResult> {
        let os_pid = Pid::from_u32(pid.0);
        let mut system = self.lock();
        system.refresh_processes(ProcessesToUpdate::Some(&[os_pid]), true);

        let Some(process) = system.process(os_pid) else {
            info!(pid = %pid, "Process not found (already terminated)");
            return Ok(TerminationResult::ProcessNotFound);
        };

        // SIGTERM where signals exist, TerminateProcess otherwise
        let delivered = match process.kill_with(Signal::Term) {
            Some(delivered) => delivered,
            None => process.kill(),
        };

        if delivered {
            info!(pid = %pid, "Sent termination request");
            Ok(TerminationResult::Success)
        } else {
            warn!(pid = %pid, "Termination request was not delivered");
            Ok(TerminationResult::Failed(format!(
                "could not signal process {pid}"
            )))
        }
    }

    fn name(&self) -> &'static str {
        "sysinfo"
    }
}
