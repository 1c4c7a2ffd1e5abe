//! Unix-specific process control implementation

#[cfg(unix)]
mod ps_table;
#[cfg(unix)]
mod unix_controller;

#[cfg(unix)]
pub use ps_table::PsProcessTable;
#[cfg(unix)]
pub use unix_controller::UnixProcessController;

/// Unix-specific controller factory
#[cfg(unix)]
pub struct UnixControllerFactory;

#[cfg(unix)]
impl scriptctl_core::ProcessControllerFactory for UnixControllerFactory {
    type Controller = UnixProcessController;

    fn create_controller(
        config: &scriptctl_core::ControllerConfig,
    ) -> scriptctl_core::Result<Self::Controller> {
        UnixProcessController::new(config)
    }

    fn platform_name() -> &'static str {
        "Unix"
    }
}
