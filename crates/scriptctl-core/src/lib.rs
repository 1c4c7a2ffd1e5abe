//! scriptctl core - platform-independent abstractions and configuration
//!
//! This crate provides the process handle, the controller and process-table
//! traits, configuration, error types and the PID file helpers that are
//! shared across the platform-specific controllers.

mod command;
mod config;
mod controller;
mod error;
pub mod pid_file;
mod process;
mod table;
pub mod validation;

pub use command::{find_in_path, output_lines, run_helper};
pub use config::*;
pub use controller::*;
pub use error::*;
pub use process::*;
pub use table::SysinfoProcessTable;
