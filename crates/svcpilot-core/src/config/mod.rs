//! Configuration module wiring for svcpilot.
//!
//! Keeps config types, I/O, and runtime resolution in separate files.

mod config_io;
mod config_runtime;
mod config_types;

pub use config_io::ConfigError;
pub use config_runtime::RunContext;
pub use config_types::*;
