//! Merged line stream over a child's stdout and stderr.
//!
//! Lines end at `\n`, `\r` or `\r\n`. ffmpeg rewrites its progress line in
//! place with a bare `\r`, and log lines can follow it directly, so
//! splitting on `\n` alone would glue them together.

use std::pin::Pin;

use bytes::BytesMut;
use futures_util::stream::{self, Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, FramedRead};

use crate::tool::{ToolProcess, ToolStream};

/// Longest line kept; anything longer is dropped up to the next delimiter.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

const LINE_DELIMITERS: &[u8] = b"\r\n";

/// Error type for output stream operations.
#[derive(thiserror::Error, Debug)]
pub enum LinesError {
    #[error("Process stdout not available")]
    NoStdout,
    #[error("Process stderr not available")]
    NoStderr,
}

/// One line of tool output, tagged with the stream it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: ToolStream,
    pub text: String,
}

/// Boxed stream of output lines.
pub type OutputLines = Pin<Box<dyn Stream<Item = std::io::Result<OutputLine>> + Send>>;

/// Splits tool output on any of `\r` and `\n`.
///
/// Empty lines are skipped, which also folds `\r\n` into one break.
/// Invalid UTF-8 is replaced rather than rejected.
#[derive(Debug, Clone)]
pub struct ToolLineCodec {
    inner: AnyDelimiterCodec,
}

impl ToolLineCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            inner: AnyDelimiterCodec::new_with_max_length(
                LINE_DELIMITERS.to_vec(),
                Vec::new(),
                max_length,
            ),
        }
    }

    fn next_line(
        &mut self,
        buf: &mut BytesMut,
        eof: bool,
    ) -> Result<Option<String>, std::io::Error> {
        loop {
            let chunk = if eof {
                self.inner.decode_eof(buf)
            } else {
                self.inner.decode(buf)
            };
            match chunk {
                Ok(Some(chunk)) if chunk.is_empty() => {}
                Ok(Some(chunk)) => return Ok(Some(String::from_utf8_lossy(&chunk).into_owned())),
                Ok(None) => return Ok(None),
                // The codec discards the rest of the line on the next call.
                Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => {
                    tracing::debug!("Dropping overlong output line");
                }
                Err(AnyDelimiterCodecError::Io(e)) => return Err(e),
            }
        }
    }
}

impl Default for ToolLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ToolLineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, std::io::Error> {
        self.next_line(buf, false)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, std::io::Error> {
        self.next_line(buf, true)
    }
}

fn tagged<R>(reader: R, stream: ToolStream) -> impl Stream<Item = std::io::Result<OutputLine>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    FramedRead::new(reader, ToolLineCodec::new())
        .map(move |line| line.map(|text| OutputLine { stream, text }))
}

/// Take both output pipes of `process` and merge them into one stream.
///
/// Lines are yielded in the order the OS delivers them; there is no
/// ordering guarantee between the two pipes.
///
/// # Errors
///
/// Returns `LinesError` if either pipe was already taken.
pub fn merged_lines(process: &mut ToolProcess) -> Result<OutputLines, LinesError> {
    let stdout = process.take_stdout().ok_or(LinesError::NoStdout)?;
    let stderr = process.take_stderr().ok_or(LinesError::NoStderr)?;

    Ok(Box::pin(stream::select(
        tagged(stdout, ToolStream::Stdout),
        tagged(stderr, ToolStream::Stderr),
    )))
}
