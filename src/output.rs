//! Output artifacts: what the user downloads, copies or prints.
//!
//! The result text is never transformed here. An artifact only pairs it with
//! a file name and the MIME type of the format the attempt asked for.

use crate::error::ConvertError;
use crate::format::TargetFormat;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix inserted between the source stem and the target extension.
pub const CONVERTED_SUFFIX: &str = "_converted";

/// `<stem>_converted.<ext>`, where `<stem>` is the source name without its
/// final extension.
///
/// ```
/// use omniconvert::{output::artifact_file_name, TargetFormat};
///
/// assert_eq!(artifact_file_name("report.final.pdf", TargetFormat::Docx), "report.final_converted.docx");
/// assert_eq!(artifact_file_name("README", TargetFormat::Markdown), "README_converted.md");
/// ```
pub fn artifact_file_name(source_name: &str, format: TargetFormat) -> String {
    format!("{}{}.{}", source_stem(source_name), CONVERTED_SUFFIX, format.extension())
}

/// File name used for the printable page.
pub fn print_file_name(source_name: &str) -> String {
    format!("{}_print.html", source_stem(source_name))
}

fn source_stem(source_name: &str) -> &str {
    match Path::new(source_name).file_stem().and_then(|s| s.to_str()) {
        Some(stem) if !stem.is_empty() => stem,
        _ => "document",
    }
}

/// A downloadable result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputArtifact {
    pub file_name: String,
    pub mime_type: String,
    pub content: String,
}

impl OutputArtifact {
    pub fn new(source_name: &str, format: TargetFormat, content: String) -> Self {
        Self {
            file_name: artifact_file_name(source_name, format),
            mime_type: format.mime_type().to_string(),
            content,
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Write `artifact` into `dir` and return the final path.
///
/// Uses atomic write (temp file + rename) so a reader never sees a partial
/// file. `dir` is created if missing.
pub async fn write_artifact(dir: &Path, artifact: &OutputArtifact) -> Result<PathBuf, ConvertError> {
    let path = dir.join(&artifact.file_name);
    write_atomic(&path, artifact.content.as_bytes()).await?;
    debug!("Wrote {} ({} bytes)", path.display(), artifact.len());
    Ok(path)
}

pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), ConvertError> {
    let write_failed = |e: std::io::Error| ConvertError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, content).await.map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_failed)
}

const PRINT_STYLE: &str = "body{font-family:'Plus Jakarta Sans',sans-serif;padding:40px;\
line-height:1.6;color:#1e293b;} table{width:100%;border-collapse:collapse;margin:20px 0;} \
th,td{border:1px solid #e2e8f0;padding:12px;text-align:left;}";

/// Wrap `result` in a minimal styled HTML page for printing.
///
/// The result is embedded verbatim; for HTML-flavoured formats it renders as
/// markup, for the others the browser shows it as flowing text.
pub fn print_document(result: &str) -> String {
    format!(
        "<html><head><title>Print Preview</title><style>{PRINT_STYLE}</style></head><body>{result}</body></html>"
    )
}

/// Write the print page for `result` as `<stem>_print.html` into `dir`.
pub async fn write_print_document(
    dir: &Path,
    source_name: &str,
    result: &str,
) -> Result<PathBuf, ConvertError> {
    let path = dir.join(print_file_name(source_name));
    write_atomic(&path, print_document(result).as_bytes()).await?;
    Ok(path)
}
