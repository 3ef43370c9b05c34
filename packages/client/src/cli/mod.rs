//! Line-oriented operator console.

pub mod command;
pub mod presenter;
pub mod runner;

pub use runner::{ConsoleOptions, run_console};
