//! `hh:mm:ss` timecodes for seek (`-ss`) and duration (`-t`) arguments.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Whole-second position or length in a video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timecode {
    seconds: u64,
}

/// Error returned when a timecode string cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid timecode {input:?}: expected hh:mm:ss, mm:ss or seconds")]
pub struct TimecodeError {
    input: String,
}

impl Timecode {
    #[must_use]
    pub fn from_secs(seconds: u64) -> Self {
        Self { seconds }
    }

    /// Position of `frame` at `fps`, truncated to the whole second.
    ///
    /// A zero frame rate yields zero rather than dividing by zero.
    #[must_use]
    pub fn from_frames(frame: u64, fps: u32) -> Self {
        Self::from_secs(frame.checked_div(u64::from(fps)).unwrap_or(0))
    }

    #[must_use]
    pub fn as_secs(self) -> u64 {
        self.seconds
    }

    #[must_use]
    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.seconds)
    }
}

impl From<Duration> for Timecode {
    fn from(duration: Duration) -> Self {
        Self::from_secs(duration.as_secs())
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.seconds / 3600;
        let minutes = self.seconds % 3600 / 60;
        let seconds = self.seconds % 60;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
    }
}

impl FromStr for Timecode {
    type Err = TimecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TimecodeError {
            input: s.to_string(),
        };
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() > 3 {
            return Err(err());
        }

        let mut seconds = 0u64;
        for (i, part) in parts.iter().enumerate() {
            let value: u64 = part.parse().map_err(|_| err())?;
            // Only the leading component may exceed 59.
            if i > 0 && value >= 60 {
                return Err(err());
            }
            seconds = seconds.checked_mul(60).and_then(|s| s.checked_add(value)).ok_or_else(err)?;
        }
        Ok(Self::from_secs(seconds))
    }
}
