//! Subcommand implementations.

pub mod actions;
pub mod completions;
pub mod inputs;
pub mod run;
pub mod version;
pub mod watch;
