//! High-level ffmpeg operations built on the process supervisor.
//!
//! Each operation registers its own cancellation handle for the duration
//! of the call, so [`FfmpegTool::cancel_all`] reaches everything in flight
//! while a frame search can still stop just its own process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{DetectConfig, ToolConfig};
use crate::ffmpeg::{match_line, FirstMatch, KeyframeMatch, Timecode};
use crate::supervisor::{CancellationRegistry, ProcessSupervisor, RunReport, SupervisorError};
use crate::tool::ToolArgs;

/// Error type for ffmpeg operations.
#[derive(thiserror::Error, Debug)]
pub enum OperationError {
    /// The supervised run failed.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    /// The tool exited with a failure status and strict checking is on.
    #[error("ffmpeg exited with status {code:?}")]
    ToolFailed { code: Option<i32> },
}

/// Arguments that scan `movie` for the frame matching `image`.
///
/// The still image is looped as a second input and blended with the movie
/// by difference, so the matching frame turns (almost) black and is
/// reported by the `blackframe` filter.
#[must_use]
pub fn find_frame_args(movie: &Path, image: &Path, detect: &DetectConfig) -> ToolArgs {
    ToolArgs::new()
        .arg("-i")
        .path(movie)
        .flag("-loop", "1")
        .arg("-i")
        .path(image)
        .arg("-an")
        .flag(
            "-filter_complex",
            format!(
                "blend=difference:shortest=1,blackframe={}:{}",
                detect.blackframe_amount, detect.blackframe_threshold
            ),
        )
        .flag("-f", "null")
        .arg("-")
}

/// Arguments that write the single frame at `start` to `output`.
#[must_use]
pub fn extract_image_args(movie: &Path, output: &Path, start: Timecode) -> ToolArgs {
    ToolArgs::new()
        .flag("-ss", start.to_string())
        .arg("-i")
        .path(movie)
        .flag("-vframes", "1")
        .flag("-q:v", "2")
        .path(output)
}

/// Arguments that transcode `duration` from `start` of `input` into `output`.
#[must_use]
pub fn convert_args(
    input: &Path,
    output: &Path,
    start: Timecode,
    duration: Timecode,
    encoder: &str,
) -> ToolArgs {
    ToolArgs::new()
        .flag("-ss", start.to_string())
        .arg("-i")
        .path(input)
        .flag("-t", duration.to_string())
        .flag("-c:v", encoder)
        .path(output)
}

/// Facade over the ffmpeg operations.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    tool: ToolConfig,
    detect: DetectConfig,
    supervisor: ProcessSupervisor,
    registry: Arc<CancellationRegistry>,
}

impl FfmpegTool {
    /// Create the facade over an injected registry.
    #[must_use]
    pub fn new(
        tool: ToolConfig,
        detect: DetectConfig,
        registry: Arc<CancellationRegistry>,
    ) -> Self {
        let supervisor = ProcessSupervisor::new()
            .with_terminate_grace(tool.terminate_grace())
            .with_max_runtime(tool.max_runtime());
        Self {
            tool,
            detect,
            supervisor,
            registry,
        }
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.tool.path
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<CancellationRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    /// Find the first frame of `movie` that matches `image`.
    ///
    /// The scan is stopped as soon as a match is reported, so its cost is
    /// bounded by the position of the match. Returns `None` if ffmpeg
    /// finishes (or is cancelled) without reporting one.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::Supervisor` if ffmpeg cannot be launched or
    /// stopped.
    pub async fn find_frame_by_image(
        &self,
        movie: &Path,
        image: &Path,
    ) -> Result<Option<KeyframeMatch>, OperationError> {
        tracing::info!(
            image = %image.display(),
            movie = %movie.display(),
            "Find keyframe with image"
        );
        let args = find_frame_args(movie, image, &self.detect);
        let guard = self.registry.begin();
        let mut found = FirstMatch::new();

        let report = self
            .supervisor
            .run(
                &self.tool.path,
                &args,
                |line| {
                    if guard.is_cancelled() {
                        return;
                    }
                    if let Some(candidate) = match_line(line) {
                        if found.record(candidate) {
                            tracing::info!(
                                image = %image.display(),
                                frame = candidate.frame,
                                keyframe = candidate.keyframe,
                                "Found matching frame"
                            );
                            guard.cancel();
                        }
                    }
                },
                guard.token(),
            )
            .await?;

        let result = found.into_inner();
        if result.is_none() {
            tracing::info!(
                image = %image.display(),
                state = ?report.state,
                "No matching frame found"
            );
        }
        Ok(result)
    }

    /// Extract the frame at `start` of `movie` as a still image.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::Supervisor` if ffmpeg cannot be launched or
    /// stopped, and `OperationError::ToolFailed` on a failure status when
    /// strict exit checking is enabled.
    pub async fn extract_image(
        &self,
        movie: &Path,
        output: &Path,
        start: Timecode,
    ) -> Result<RunReport, OperationError> {
        tracing::info!(
            movie = %movie.display(),
            output = %output.display(),
            %start,
            "Extract still image"
        );
        self.run_to_completion(&extract_image_args(movie, output, start))
            .await
    }

    /// Transcode `duration` from `start` of `input` into `output`.
    ///
    /// # Errors
    ///
    /// Same as [`FfmpegTool::extract_image`].
    pub async fn convert(
        &self,
        input: &Path,
        output: &Path,
        start: Timecode,
        duration: Timecode,
    ) -> Result<RunReport, OperationError> {
        tracing::info!(
            input = %input.display(),
            output = %output.display(),
            %start,
            %duration,
            "Convert video"
        );
        let args = convert_args(input, output, start, duration, &self.tool.encoder);
        self.run_to_completion(&args).await
    }

    /// Cancel every operation currently in flight.
    pub fn cancel_all(&self) -> usize {
        self.registry.cancel_all()
    }

    async fn run_to_completion(&self, args: &ToolArgs) -> Result<RunReport, OperationError> {
        let guard = self.registry.begin();
        let report = self
            .supervisor
            .run(
                &self.tool.path,
                args,
                |line| tracing::debug!(target: "clipseek::ffmpeg::output", "{line}"),
                guard.token(),
            )
            .await?;

        if self.tool.strict_exit_status && report.exited() {
            if let Some(status) = report.status.filter(|s| !s.success()) {
                return Err(OperationError::ToolFailed {
                    code: status.code(),
                });
            }
        }
        Ok(report)
    }
}

/// Path in `dir` named after the full file name of `input` plus `extension`.
///
/// Inputs that differ only in extension get distinct outputs, and an
/// output never equals its input.
#[must_use]
pub fn output_path(dir: &Path, input: &Path, extension: &str) -> PathBuf {
    let name = input
        .file_name()
        .map_or_else(|| "output".into(), |s| s.to_string_lossy());
    dir.join(format!("{name}.{extension}"))
}
