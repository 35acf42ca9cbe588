//! CLI Module Organization
//!
//! - args: CLI argument structures and flag overrides
//! - commands: command execution logic
//! - display: tables and summaries printed to the console

pub mod args;
pub mod commands;
pub mod display;

// Re-export commonly used items for convenience
pub use args::*;
pub use commands::*;
