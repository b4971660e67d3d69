//! clipseek - cut recordings between two frames found by ffmpeg image matching.

pub mod batch;
pub mod config;
pub mod display;
pub mod ffmpeg;
pub mod supervisor;
pub mod tool;
