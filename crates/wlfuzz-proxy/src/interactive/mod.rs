//! Interactive breakpoint controller.
//!
//! Always the last pass. Shows every message and, when stopped (first
//! message, `next`, or Ctrl-C), blocks the pipeline on operator commands.

pub mod commands;
pub mod controller;

pub use commands::{run_command, CommandEnv, CommandOutcome, COMMANDS};
pub use controller::{InteractivePass, Statistics};
