//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// External tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Path or name of the ffmpeg executable.
    pub path: PathBuf,
    /// Video encoder passed to `-c:v` when converting.
    pub encoder: String,
    /// Milliseconds between the polite stop signal and the kill.
    pub terminate_grace_ms: u64,
    /// Upper bound on a single invocation in seconds; 0 disables it.
    pub max_runtime_secs: u64,
    /// Treat a non-zero exit of extract/convert as a failure.
    pub strict_exit_status: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ffmpeg"),
            encoder: "h264_nvenc".to_string(),
            terminate_grace_ms: 2000,
            max_runtime_secs: 0,
            strict_exit_status: false,
        }
    }
}

impl ToolConfig {
    #[must_use]
    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }

    #[must_use]
    pub fn max_runtime(&self) -> Option<Duration> {
        (self.max_runtime_secs > 0).then(|| Duration::from_secs(self.max_runtime_secs))
    }
}

/// Image-match detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Still image marking where the clip starts.
    pub start_image: Option<PathBuf>,
    /// Still image marking where the clip ends.
    pub stop_image: Option<PathBuf>,
    /// Percentage of black pixels for a frame to count as matching.
    pub blackframe_amount: u8,
    /// Pixel value below which a pixel counts as black.
    pub blackframe_threshold: u8,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            start_image: None,
            stop_image: None,
            blackframe_amount: 98,
            blackframe_threshold: 32,
        }
    }
}

/// Batch conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub source_folder: PathBuf,
    pub output_folder: PathBuf,
    /// Only files whose name contains this text are processed.
    pub filename_filter: String,
    /// Skip inputs whose output already exists instead of replacing it.
    pub skip_existing: bool,
    pub frames_per_second: u32,
    /// Clip length used when the stop image is never found.
    pub default_duration_secs: u64,
    /// Thumbnail position relative to the start frame.
    pub thumbnail_offset_frames: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            source_folder: PathBuf::from("."),
            output_folder: PathBuf::from("converted"),
            filename_filter: String::new(),
            skip_existing: true,
            frames_per_second: 25,
            default_duration_secs: 1800,
            thumbnail_offset_frames: 250,
        }
    }
}

/// OCR title extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub enabled: bool,
    pub tesseract_path: PathBuf,
    /// Mean word confidence (0-100) required to accept OCR text.
    pub min_confidence: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tesseract_path: PathBuf::from("tesseract"),
            min_confidence: 70.0,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tool: ToolConfig,
    pub detect: DetectConfig,
    pub batch: BatchConfig,
    pub ocr: OcrConfig,
}
