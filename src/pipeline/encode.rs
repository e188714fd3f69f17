//! File encoding: [`SourceFile`] → standard base64 string.
//!
//! The service takes the document inline in the JSON body, so the bytes are
//! base64-encoded with the standard alphabet and no `data:` prefix. Encoding
//! is lazy: nothing is read until the returned future is awaited, and a
//! path-backed file is read from disk exactly once across all attempts.

use crate::error::ConvertError;
use crate::pipeline::input::SourceFile;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Read and base64-encode the file's raw bytes.
///
/// # Errors
/// [`ConvertError::ReadFailed`] if a path-backed file can no longer be read,
/// or no longer has the size it had when selected.
pub async fn encode_source(file: &SourceFile) -> Result<String, ConvertError> {
    let bytes = file.bytes().await?;
    let b64 = STANDARD.encode(&bytes);

    debug!("Encoded {} → {} bytes base64", file.name(), b64.len());
    Ok(b64)
}
