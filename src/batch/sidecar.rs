//! Metadata sidecar files written next to converted clips.

use std::fmt::Write as _;
use std::path::Path;

use chrono::Local;

/// Escape text for use inside an XML element.
#[must_use]
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the sidecar document for a clip.
#[must_use]
pub fn render_sidecar(title: &str, thumbnail: Option<&str>) -> String {
    let mut doc =
        String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
    doc.push_str("<movie>\n");
    let _ = writeln!(doc, "  <title>{}</title>", escape_xml(title));
    if let Some(thumb) = thumbnail {
        let _ = writeln!(doc, "  <thumb>{}</thumb>", escape_xml(thumb));
    }
    let _ = writeln!(
        doc,
        "  <dateadded>{}</dateadded>",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    doc.push_str("</movie>\n");
    doc
}

/// Write the sidecar for a clip to `path`.
///
/// The thumbnail is referenced by file name only, relative to the sidecar.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn write_sidecar(
    path: &Path,
    title: &str,
    thumbnail: Option<&Path>,
) -> std::io::Result<()> {
    let thumb_name = thumbnail
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned());
    let doc = render_sidecar(title, thumb_name.as_deref());
    tokio::fs::write(path, doc).await?;
    tracing::debug!(path = %path.display(), %title, "Wrote metadata sidecar");
    Ok(())
}
