//! Batch driver and its collaborators: titles and metadata sidecars.

mod driver;
mod sidecar;
mod title;

pub use driver::*;
pub use sidecar::*;
pub use title::*;
