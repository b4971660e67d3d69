//! External tool process spawning and output streaming.

mod args;
mod lines;
mod process;

pub use args::*;
pub use lines::*;
pub use process::*;

/// Which pipe of the child a line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStream {
    Stdout,
    Stderr,
}
