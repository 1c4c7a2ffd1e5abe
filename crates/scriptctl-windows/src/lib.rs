//! Windows-specific process control implementation
//!
//! Background launches go through Sysinternals `psexec -d`, liveness through
//! `pslist` and termination through `pskill -t`. The helpers are located on
//! `PATH` or in the configured helper directory when the controller is built.

mod pstools;
mod windows_controller;

pub use pstools::{PSEXEC, PSKILL, PSLIST, PsTools, PsToolsProcessTable};
pub use windows_controller::WindowsProcessController;

/// Windows-specific controller factory
pub struct WindowsControllerFactory;

impl scriptctl_core::ProcessControllerFactory for WindowsControllerFactory {
    type Controller = WindowsProcessController;

    fn create_controller(
        config: &scriptctl_core::ControllerConfig,
    ) -> scriptctl_core::Result<Self::Controller> {
        WindowsProcessController::new(config)
    }

    fn platform_name() -> &'static str {
        "Windows"
    }
}
