//! Supervisor module for tool invocation lifecycle and cancellation.

mod registry;
mod runner;
mod state;

pub use registry::*;
pub use runner::*;
pub use state::*;
