//! Batch conversion of every recording in a source folder.
//!
//! For each input the driver locates the start and stop frames by image
//! match, extracts a thumbnail, names the clip, writes its metadata
//! sidecar and converts the range between the two frames. Every file runs
//! inside its own error boundary; one failure is reported and counted and
//! the batch moves on.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::batch::{resolve_title, write_sidecar, TitleSource};
use crate::config::{BatchConfig, DetectConfig};
use crate::display;
use crate::ffmpeg::{output_path, FfmpegTool, KeyframeMatch, OperationError, Timecode};

/// Error type for batch processing.
#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    #[error("Input folder {0} doesn't exist")]
    SourceMissing(PathBuf),
    #[error("Cannot write to {0}")]
    OutputMissing(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Operation(#[from] OperationError),
    #[error("Interrupted")]
    Interrupted,
}

impl BatchError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of processing one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Converted { output: PathBuf, title: String },
    Skipped { reason: String },
}

/// Frame range chosen for one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRange {
    pub start_frame: u64,
    pub end_frame: u64,
    /// Whether `end_frame` came from the default duration.
    pub fallback: bool,
}

impl ClipRange {
    /// Choose the clip range from the located start and stop frames.
    ///
    /// A stop frame that was not found, or that does not lie after the
    /// start, is replaced by `start + default_duration_secs`.
    #[must_use]
    pub fn resolve(start_frame: u64, stop_frame: Option<u64>, batch: &BatchConfig) -> Self {
        match stop_frame {
            Some(end) if end > start_frame => Self {
                start_frame,
                end_frame: end,
                fallback: false,
            },
            _ => Self {
                start_frame,
                end_frame: start_frame.saturating_add(
                    batch
                        .default_duration_secs
                        .saturating_mul(u64::from(batch.frames_per_second)),
                ),
                fallback: true,
            },
        }
    }

    #[must_use]
    pub fn start(&self, fps: u32) -> Timecode {
        Timecode::from_frames(self.start_frame, fps)
    }

    #[must_use]
    pub fn duration(&self, fps: u32) -> Timecode {
        Timecode::from_frames(self.end_frame - self.start_frame, fps)
    }
}

/// Counts for a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub interrupted: bool,
}

/// List the regular files in `folder`, sorted by name.
///
/// # Errors
///
/// Returns an error if the folder cannot be read.
pub fn list_inputs(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Whether `path` passes the file name filter. An empty filter accepts all.
#[must_use]
pub fn matches_filter(path: &Path, filter: &str) -> bool {
    filter.trim().is_empty()
        || path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().contains(filter))
}

/// Drives a batch over a source folder.
pub struct BatchDriver {
    batch: BatchConfig,
    detect: DetectConfig,
    ffmpeg: FfmpegTool,
    titles: Box<dyn TitleSource>,
    shutdown: CancellationToken,
}

impl BatchDriver {
    #[must_use]
    pub fn new(
        batch: BatchConfig,
        detect: DetectConfig,
        ffmpeg: FfmpegTool,
        titles: Box<dyn TitleSource>,
    ) -> Self {
        Self {
            batch,
            detect,
            ffmpeg,
            titles,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the batch after the current step when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop the batch and cancel every running ffmpeg invocation.
    ///
    /// The registry is closed as well, so a step that starts after this
    /// call is cancelled before it launches anything.
    pub fn interrupt(&self) {
        self.shutdown.cancel();
        self.ffmpeg.registry().close();
    }

    /// Process every matching file in the source folder.
    ///
    /// # Errors
    ///
    /// Returns an error only if the folders themselves are unusable;
    /// per-file failures are counted in the summary.
    pub async fn run(&self) -> Result<BatchSummary, BatchError> {
        let source = &self.batch.source_folder;
        let output = &self.batch.output_folder;
        if !source.is_dir() {
            return Err(BatchError::SourceMissing(source.clone()));
        }
        if !output.is_dir() {
            return Err(BatchError::OutputMissing(output.clone()));
        }

        tracing::info!(folder = %source.display(), "Convert all videos");
        let inputs = list_inputs(source).map_err(|e| BatchError::io(source, e))?;
        let mut summary = BatchSummary::default();

        for input in inputs {
            if self.shutdown.is_cancelled() {
                summary.interrupted = true;
                break;
            }
            if !matches_filter(&input, &self.batch.filename_filter) {
                tracing::debug!(
                    file = %input.display(),
                    filter = %self.batch.filename_filter,
                    "Skip file because its name doesn't match the filter"
                );
                continue;
            }

            display::print_file_start(&input);
            match self.process_file(&input).await {
                Ok(FileOutcome::Converted { output, title }) => {
                    display::print_converted(&output, &title);
                    summary.converted += 1;
                }
                Ok(FileOutcome::Skipped { reason }) => {
                    display::print_skip(&input, &reason);
                    summary.skipped += 1;
                }
                Err(BatchError::Interrupted) => {
                    tracing::warn!(file = %input.display(), "Interrupted");
                    summary.interrupted = true;
                    break;
                }
                Err(e) => {
                    tracing::error!(file = %input.display(), error = %e, "Failed to process file");
                    display::print_error(&format!("{}: {e}", input.display()));
                    summary.failed += 1;
                }
            }
        }

        display::print_summary(
            summary.converted,
            summary.skipped,
            summary.failed,
            summary.interrupted,
        );
        Ok(summary)
    }

    fn check_interrupted(&self) -> Result<(), BatchError> {
        if self.shutdown.is_cancelled() {
            Err(BatchError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Locate `image` in `input`, if an image is configured.
    async fn locate(
        &self,
        input: &Path,
        image: Option<&Path>,
    ) -> Result<Option<KeyframeMatch>, BatchError> {
        let Some(image) = image else {
            return Ok(None);
        };
        self.check_interrupted()?;
        let found = self.ffmpeg.find_frame_by_image(input, image).await?;
        self.check_interrupted()?;
        display::print_match(image, found);
        Ok(found)
    }

    /// Process a single input file.
    ///
    /// # Errors
    ///
    /// Returns an error if any ffmpeg step fails or the batch is interrupted.
    pub async fn process_file(&self, input: &Path) -> Result<FileOutcome, BatchError> {
        let out_dir = &self.batch.output_folder;
        let output = output_path(out_dir, input, "mp4");
        if output.exists() {
            if self.batch.skip_existing {
                return Ok(FileOutcome::Skipped {
                    reason: format!("output {} already exists", output.display()),
                });
            }
            tracing::info!(output = %output.display(), "Output already exists, delete it first");
            tokio::fs::remove_file(&output)
                .await
                .map_err(|e| BatchError::io(&output, e))?;
        }

        let fps = self.batch.frames_per_second;
        let start_frame = self
            .locate(input, self.detect.start_image.as_deref())
            .await?
            .map_or(0, |m| m.keyframe);
        let stop_frame = self
            .locate(input, self.detect.stop_image.as_deref())
            .await?
            .map(|m| m.frame);

        let range = ClipRange::resolve(start_frame, stop_frame, &self.batch);
        if range.fallback {
            tracing::warn!(
                file = %input.display(),
                default_secs = self.batch.default_duration_secs,
                "Failed to find the end, using the default length"
            );
        }

        let thumbnail = output_path(out_dir, input, "jpg");
        let thumb_at = Timecode::from_frames(
            range.start_frame.saturating_add(self.batch.thumbnail_offset_frames),
            fps,
        );
        self.check_interrupted()?;
        let thumbnail = match self.ffmpeg.extract_image(input, &thumbnail, thumb_at).await {
            Ok(_) if thumbnail.exists() => Some(thumbnail),
            Ok(_) => {
                tracing::warn!(file = %input.display(), "Thumbnail was not written");
                None
            }
            Err(e) => {
                tracing::warn!(file = %input.display(), error = %e, "Thumbnail extraction failed");
                None
            }
        };
        self.check_interrupted()?;

        let title = resolve_title(self.titles.as_ref(), input, thumbnail.as_deref()).await;
        self.check_interrupted()?;
        let sidecar = output_path(out_dir, input, "nfo");
        write_sidecar(&sidecar, &title, thumbnail.as_deref())
            .await
            .map_err(|e| BatchError::io(&sidecar, e))?;

        self.check_interrupted()?;
        let report = self
            .ffmpeg
            .convert(input, &output, range.start(fps), range.duration(fps))
            .await?;
        if !report.exited() {
            return Err(BatchError::Interrupted);
        }

        Ok(FileOutcome::Converted { output, title })
    }
}
