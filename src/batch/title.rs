//! Title sources for converted clips.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use crate::supervisor::{CancellationRegistry, ProcessSupervisor, SupervisorError};
use crate::tool::ToolArgs;

/// Title used when a file name has nothing usable left.
pub const UNTITLED: &str = "Untitled";

/// Error type for title extraction.
#[derive(thiserror::Error, Debug)]
pub enum TitleError {
    #[error("OCR failed: {0}")]
    Ocr(#[from] SupervisorError),
}

/// Something that can name a clip.
#[async_trait]
pub trait TitleSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Produce a title for `video`, optionally looking at its `thumbnail`.
    ///
    /// `Ok(None)` means the source had nothing confident to offer.
    async fn title(&self, video: &Path, thumbnail: Option<&Path>)
        -> Result<Option<String>, TitleError>;
}

fn separators() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[._\s]+").expect("valid separator regex"))
}

/// Derive a readable title from the file name of `path`.
#[must_use]
pub fn title_from_filename(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = separators().replace_all(&stem, " ").trim().to_string();
    if title.is_empty() {
        UNTITLED.to_string()
    } else {
        title
    }
}

/// Titles taken from the video's file name.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilenameTitle;

#[async_trait]
impl TitleSource for FilenameTitle {
    fn name(&self) -> &'static str {
        "filename"
    }

    async fn title(
        &self,
        video: &Path,
        _thumbnail: Option<&Path>,
    ) -> Result<Option<String>, TitleError> {
        Ok(Some(title_from_filename(video)))
    }
}

/// Words recognised by tesseract with their mean confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrText {
    pub text: String,
    pub confidence: f32,
}

/// Parse tesseract `tsv` output lines.
///
/// Only word rows (12 columns, numeric non-negative confidence, non-empty
/// text) count; the header and anything else on the stream are ignored.
/// Returns `None` when no word was recognised.
#[must_use]
pub fn parse_tsv<'a>(lines: impl IntoIterator<Item = &'a str>) -> Option<OcrText> {
    let mut words = Vec::new();
    let mut total = 0.0f32;

    for line in lines {
        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() != 12 {
            continue;
        }
        let Ok(confidence) = columns[10].trim().parse::<f32>() else {
            continue;
        };
        let text = columns[11].trim();
        if confidence < 0.0 || text.is_empty() {
            continue;
        }
        total += confidence;
        words.push(text);
    }

    if words.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let confidence = total / words.len() as f32;
    Some(OcrText {
        text: words.join(" "),
        confidence,
    })
}

/// Titles read from the thumbnail with the `tesseract` OCR tool.
#[derive(Debug, Clone)]
pub struct TesseractTitle {
    program: PathBuf,
    min_confidence: f32,
    supervisor: ProcessSupervisor,
    registry: Arc<CancellationRegistry>,
}

impl TesseractTitle {
    #[must_use]
    pub fn new(
        program: PathBuf,
        min_confidence: f32,
        supervisor: ProcessSupervisor,
        registry: Arc<CancellationRegistry>,
    ) -> Self {
        Self {
            program,
            min_confidence,
            supervisor,
            registry,
        }
    }

    /// Arguments that print word-level TSV for `image` to stdout.
    #[must_use]
    pub fn args(image: &Path) -> ToolArgs {
        ToolArgs::new().path(image).arg("stdout").arg("tsv")
    }
}

#[async_trait]
impl TitleSource for TesseractTitle {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn title(
        &self,
        _video: &Path,
        thumbnail: Option<&Path>,
    ) -> Result<Option<String>, TitleError> {
        let Some(thumbnail) = thumbnail else {
            return Ok(None);
        };

        let guard = self.registry.begin();
        let mut output = Vec::new();
        let report = self
            .supervisor
            .run(
                &self.program,
                &Self::args(thumbnail),
                |line| output.push(line.to_string()),
                guard.token(),
            )
            .await?;
        if !report.exited() {
            tracing::info!(
                image = %thumbnail.display(),
                state = ?report.state,
                "OCR did not finish"
            );
            return Ok(None);
        }

        let Some(ocr) = parse_tsv(output.iter().map(String::as_str)) else {
            tracing::debug!(image = %thumbnail.display(), "OCR found no text");
            return Ok(None);
        };
        if ocr.confidence < self.min_confidence {
            tracing::info!(
                image = %thumbnail.display(),
                text = %ocr.text,
                confidence = ocr.confidence,
                min = self.min_confidence,
                "OCR text below confidence threshold"
            );
            return Ok(None);
        }
        Ok(Some(ocr.text))
    }
}

/// Ask `source` for a title, falling back to the file name.
pub async fn resolve_title(
    source: &dyn TitleSource,
    video: &Path,
    thumbnail: Option<&Path>,
) -> String {
    match source.title(video, thumbnail).await {
        Ok(Some(title)) if !title.trim().is_empty() => title,
        Ok(_) => {
            tracing::debug!(source = source.name(), "No title, using file name");
            title_from_filename(video)
        }
        Err(e) => {
            tracing::warn!(
                source = source.name(),
                error = %e,
                "Title source failed, using file name"
            );
            title_from_filename(video)
        }
    }
}
