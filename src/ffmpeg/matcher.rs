//! Parser for ffmpeg `blackframe` filter diagnostics.
//!
//! ffmpeg's human-readable log is not a versioned protocol, so the contract
//! relied on here is kept deliberately small:
//!
//! - the line starts with [`MARKER`] (`[Parsed_blackframe_`);
//! - the frame index follows the last occurrence of [`FRAME_TOKEN`]
//!   (` frame:`, with the leading space so `last_keyframe:` never matches);
//! - the keyframe index follows the last occurrence of [`KEYFRAME_TOKEN`];
//! - each value runs up to the next whitespace or the end of the line and
//!   must parse as an unsigned integer.
//!
//! A sample line:
//!
//! ```text
//! [Parsed_blackframe_1 @ 0x1] frame:49 pblack:99 pts:25088 t:1.960000 type:P last_keyframe:0
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of every line emitted by the blackframe filter.
pub const MARKER: &str = "[Parsed_blackframe_";
/// Token preceding the matched frame index.
pub const FRAME_TOKEN: &str = " frame:";
/// Token preceding the most recent keyframe index.
pub const KEYFRAME_TOKEN: &str = "last_keyframe:";

/// A frame reported as matching, with the keyframe to seek from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyframeMatch {
    pub frame: u64,
    pub keyframe: u64,
}

impl fmt::Display for KeyframeMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame {} (keyframe {})", self.frame, self.keyframe)
    }
}

/// Parse one diagnostic line.
///
/// Returns `None` for every line that is not a complete blackframe report.
#[must_use]
pub fn match_line(line: &str) -> Option<KeyframeMatch> {
    if !line.starts_with(MARKER) {
        return None;
    }
    let frame = field(line, FRAME_TOKEN)?;
    let keyframe = field(line, KEYFRAME_TOKEN)?;
    Some(KeyframeMatch { frame, keyframe })
}

fn field(line: &str, token: &str) -> Option<u64> {
    let start = line.rfind(token)? + token.len();
    let rest = &line[start..];
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Invocation-local slot that keeps only the first match it is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMatch {
    found: Option<KeyframeMatch>,
}

impl FirstMatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `candidate` if nothing is stored yet. Returns whether it was stored.
    pub fn record(&mut self, candidate: KeyframeMatch) -> bool {
        if self.found.is_some() {
            return false;
        }
        self.found = Some(candidate);
        true
    }

    #[must_use]
    pub fn get(&self) -> Option<KeyframeMatch> {
        self.found
    }

    #[must_use]
    pub fn into_inner(self) -> Option<KeyframeMatch> {
        self.found
    }
}
