//! Control a script interpreter process (a Node.js-like runtime running a
//! user script) from a host process.
//!
//! A [`ScriptSession`] runs the script in the foreground, or starts it
//! detached and tracks it through a PID file that survives host restarts.
//!
//! ```no_run
//! use scriptctl::{ControllerConfig, LogHandling, ScriptSession};
//!
//! # async fn demo() -> scriptctl::Result<()> {
//! let mut session = ScriptSession::new(&ControllerConfig::default())?;
//! session.set_executable("/usr/bin/node")?;
//! session.set_script("/srv/app/server.js")?;
//! session.set_pid_file("/run/app/server.pid")?;
//! session.set_log_file("/var/log/app/server.log")?;
//!
//! if session.start_background(LogHandling::Append).await? {
//!     println!("started with PID {}", session.pid()?);
//! }
//! # Ok(())
//! # }
//! ```

mod factory;
mod session;

pub use factory::{PlatformController, PlatformControllerFactory};
pub use session::ScriptSession;

/// Version of this control library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export core functionality
pub use scriptctl_core::*;
