use scriptctl_core::{ControllerConfig, ProcessControllerFactory, Result};
use tracing::info;

#[cfg(not(any(unix, windows)))]
compile_error!("Unsupported platform: only Unix and Windows are currently supported");

/// Platform-independent factory that selects the controller at compile time
pub struct PlatformControllerFactory;

impl ProcessControllerFactory for PlatformControllerFactory {
    #[cfg(unix)]
    type Controller = scriptctl_unix::UnixProcessController;

    #[cfg(windows)]
    type Controller = scriptctl_windows::WindowsProcessController;

    fn create_controller(config: &ControllerConfig) -> Result<Self::Controller> {
        info!(platform = Self::platform_name(), "Creating process controller");

        #[cfg(unix)]
        return scriptctl_unix::UnixControllerFactory::create_controller(config);

        #[cfg(windows)]
        return scriptctl_windows::WindowsControllerFactory::create_controller(config);
    }

    fn platform_name() -> &'static str {
        #[cfg(unix)]
        return scriptctl_unix::UnixControllerFactory::platform_name();

        #[cfg(windows)]
        return scriptctl_windows::WindowsControllerFactory::platform_name();
    }
}

/// Controller type used by sessions on this platform
pub type PlatformController = <PlatformControllerFactory as ProcessControllerFactory>::Controller;

#[cfg(test)]
mod tests {
    use super::*;
    use scriptctl_core::ProcessController;

    #[test]
    fn test_platform_detection() {
        let platform = PlatformControllerFactory::platform_name();
        #[cfg(unix)]
        assert_eq!(platform, "Unix");
        #[cfg(windows)]
        assert_eq!(platform, "Windows");
    }

    #[cfg(unix)]
    #[test]
    fn test_create_unix_controller() {
        let controller =
            PlatformControllerFactory::create_controller(&ControllerConfig::default()).unwrap();
        assert_eq!(controller.platform_name(), PlatformControllerFactory::platform_name());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ControllerConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(PlatformControllerFactory::create_controller(&config).is_err());
    }
}
