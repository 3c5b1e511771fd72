//! Shared utilities

pub mod dym;
pub mod fs;
pub mod jsonc;
pub mod process;
pub mod signal;

pub use dym::did_you_mean;
pub use process::{quote_command, ProcessBuilder, ProcessResult};
