//! ffmpeg operations: frame search by image, still extraction, conversion.

mod matcher;
mod ops;
mod timecode;

pub use matcher::*;
pub use ops::*;
pub use timecode::*;
