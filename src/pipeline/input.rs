//! Source acquisition: turn a user-picked file into a [`SourceFile`].
//!
//! Selection only looks at metadata (name, size, MIME type). The bytes are
//! read later, once, by the encoder, and every later attempt reuses them.
//! Oversized files are rejected here so they never reach the encoder or the
//! network. A file whose size changed between selection and that first read
//! is refused.

use crate::error::ConvertError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::OnceCell;
use tracing::debug;

/// MIME type used when neither the extension nor the content identifies the file.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Where the bytes of a source file live.
#[derive(Clone)]
pub enum SourceContent {
    /// On disk; read lazily by the encoder, then kept. Clones share the
    /// loaded bytes.
    Path {
        path: PathBuf,
        loaded: Arc<OnceCell<Arc<[u8]>>>,
    },
    /// Already in memory.
    Bytes(Arc<[u8]>),
}

impl fmt::Debug for SourceContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceContent::Path { path, loaded } => f
                .debug_struct("Path")
                .field("path", path)
                .field("loaded", &loaded.initialized())
                .finish(),
            SourceContent::Bytes(b) => write!(f, "Bytes(<{} bytes>)", b.len()),
        }
    }
}

/// A file supplied by the user for conversion. Immutable once built.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    size: u64,
    mime_type: String,
    content: SourceContent,
}

impl SourceFile {
    /// Select a file on disk, enforcing the `limit` (bytes).
    ///
    /// Reads metadata only, plus a few magic bytes when the extension is not
    /// recognised.
    pub async fn from_path(path: impl AsRef<Path>, limit: u64) -> Result<Self, ConvertError> {
        let path = path.as_ref().to_path_buf();
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| read_failed(&path, &e))?;
        if !meta.is_file() {
            return Err(ConvertError::ReadFailed {
                path,
                detail: "not a regular file".to_string(),
            });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let size = meta.len();
        check_size(&name, size, limit)?;

        let mime_type = match mime_from_extension(&name) {
            Some(m) => m.to_string(),
            None => sniff_file(&path).await.unwrap_or(OCTET_STREAM).to_string(),
        };

        debug!("Selected {} ({} bytes, {})", path.display(), size, mime_type);
        Ok(Self {
            name,
            size,
            mime_type,
            content: SourceContent::Path {
                path,
                loaded: Arc::new(OnceCell::new()),
            },
        })
    }

    /// Select an in-memory file, enforcing the `limit` (bytes).
    ///
    /// `mime_type` overrides detection when given.
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
        mime_type: Option<&str>,
        limit: u64,
    ) -> Result<Self, ConvertError> {
        let name = name.into();
        let bytes: Arc<[u8]> = bytes.into();
        let size = bytes.len() as u64;
        check_size(&name, size, limit)?;

        let mime_type = mime_type
            .map(str::to_string)
            .or_else(|| mime_from_extension(&name).map(str::to_string))
            .or_else(|| sniff(&bytes).map(str::to_string))
            .unwrap_or_else(|| OCTET_STREAM.to_string());

        Ok(Self {
            name,
            size,
            mime_type,
            content: SourceContent::Bytes(bytes),
        })
    }

    /// Replace the detected MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn content(&self) -> &SourceContent {
        &self.content
    }

    /// Path on disk, if the file is path-backed.
    pub fn path(&self) -> Option<&Path> {
        match &self.content {
            SourceContent::Path { path, .. } => Some(path),
            SourceContent::Bytes(_) => None,
        }
    }

    /// The file's bytes as of the first read.
    ///
    /// A path-backed file is read from disk on the first call only. That read
    /// must find exactly [`size`](Self::size) bytes, the size checked at
    /// selection; anything else fails with [`ConvertError::ReadFailed`].
    pub async fn bytes(&self) -> Result<Arc<[u8]>, ConvertError> {
        match &self.content {
            SourceContent::Bytes(bytes) => Ok(Arc::clone(bytes)),
            SourceContent::Path { path, loaded } => loaded
                .get_or_try_init(|| load_selected(path, self.size))
                .await
                .map(Arc::clone),
        }
    }
}

fn check_size(name: &str, size: u64, limit: u64) -> Result<(), ConvertError> {
    if size > limit {
        return Err(ConvertError::TooLarge {
            name: name.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

async fn load_selected(path: &Path, expected: u64) -> Result<Arc<[u8]>, ConvertError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| read_failed(path, &e))?;
    let found = bytes.len() as u64;
    if found != expected {
        return Err(ConvertError::ReadFailed {
            path: path.to_path_buf(),
            detail: format!(
                "file changed since it was selected ({} bytes, expected {})",
                found, expected
            ),
        });
    }
    debug!("Loaded {} ({} bytes)", path.display(), found);
    Ok(bytes.into())
}

pub(crate) fn read_failed(path: &Path, e: &std::io::Error) -> ConvertError {
    let detail = match e.kind() {
        std::io::ErrorKind::NotFound => "file not found".to_string(),
        std::io::ErrorKind::PermissionDenied => "permission denied".to_string(),
        _ => e.to_string(),
    };
    ConvertError::ReadFailed {
        path: path.to_path_buf(),
        detail,
    }
}

/// MIME type from the file extension, for the formats users upload.
pub fn mime_from_extension(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "rtf" => "application/rtf",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime)
}

/// MIME type from leading magic bytes.
pub fn sniff(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF") {
        Some("application/pdf")
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"{\\rtf") {
        Some("application/rtf")
    } else {
        None
    }
}

async fn sniff_file(path: &Path) -> Option<&'static str> {
    let mut f = tokio::fs::File::open(path).await.ok()?;
    let mut magic = [0u8; 8];
    let n = f.read(&mut magic).await.ok()?;
    sniff(&magic[..n])
}
