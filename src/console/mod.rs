//! Operator console: line parsing and the interactive session.

mod command;
mod session;

pub use command::{Command, USAGE};
pub use session::run_console;
