//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod archive;
pub mod config;
pub mod watch;
