//! Colored CLI display utilities for batch progress.
//!
//! Status lines go to stdout next to the tracing output on stderr.

use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::ffmpeg::KeyframeMatch;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate a string to at most `max_len` characters, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Print the start of work on one input file.
pub fn print_file_start(input: &Path) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[FILE]".blue().bold(),
        truncate(&file_name(input), 80).cyan()
    );
    let _ = io::stdout().flush();
}

/// Print that a file was skipped.
pub fn print_skip(input: &Path, reason: &str) {
    println!(
        "{} {} {} - {}",
        timestamp().dimmed(),
        "[SKIP]".yellow().bold(),
        file_name(input),
        reason.dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print the result of a frame search.
pub fn print_match(image: &Path, found: Option<KeyframeMatch>) {
    match found {
        Some(m) => println!(
            "{} {} {} at {}",
            timestamp().dimmed(),
            "[MATCH]".green().bold(),
            file_name(image),
            m
        ),
        None => println!(
            "{} {} {} not found",
            timestamp().dimmed(),
            "[MATCH]".yellow().bold(),
            file_name(image)
        ),
    }
    let _ = io::stdout().flush();
}

/// Print a finished conversion.
pub fn print_converted(output: &Path, title: &str) {
    println!(
        "{} {} {} ({})",
        timestamp().dimmed(),
        "[DONE]".green().bold(),
        file_name(output),
        truncate(title, 60).dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[ERROR]".red().bold(),
        message
    );
    let _ = io::stdout().flush();
}

/// Print the final batch tally.
pub fn print_summary(converted: usize, skipped: usize, failed: usize, interrupted: bool) {
    let label = if interrupted {
        "[STOPPED]".yellow().bold().to_string()
    } else {
        "[SUMMARY]".blue().bold().to_string()
    };
    let failed_text = if failed > 0 {
        format!("{failed} failed").red().to_string()
    } else {
        format!("{failed} failed")
    };
    println!(
        "{} {} {} converted, {} skipped, {}",
        timestamp().dimmed(),
        label,
        converted.to_string().green(),
        skipped,
        failed_text
    );
    let _ = io::stdout().flush();
}
