//! Error types for the omniconvert library.
//!
//! [`ConvertError`] is the single error type returned by the library. The
//! variants that can end a conversion attempt map onto a [`FailureKind`], and
//! the session keeps a [`Failure`] (kind + rendered message) in its `Error`
//! state. The message is what a user sees; the kind is what a caller branches
//! on.

use crate::format::TargetFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Message used when the service answers without any usable text.
pub const EMPTY_RESULT_MESSAGE: &str = "Error: Conversion returned empty results.";

/// Message used when a service failure carries no message of its own.
pub const SERVICE_BUSY_MESSAGE: &str = "System busy. Please try again with Fast Mode.";

/// All errors returned by the omniconvert library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The selected file is larger than the configured ceiling.
    #[error("File '{name}' is too large ({size} bytes). Max {} MB for AI processing.", mebibytes(.limit))]
    TooLarge { name: String, size: u64, limit: u64 },

    /// The file could not be read or encoded.
    #[error("Failed to read '{path}': {detail}")]
    ReadFailed { path: PathBuf, detail: String },

    // ── Service errors ────────────────────────────────────────────────────
    /// The service answered but produced no text.
    #[error("{}", EMPTY_RESULT_MESSAGE)]
    EmptyResult,

    /// Network, HTTP, auth or response-shape failure from the service.
    #[error("{}", service_message(.message))]
    ServiceError { message: String },

    /// Structured output failed validation (only when validation is enabled).
    #[error("Model returned invalid {format} output: {detail}")]
    InvalidOutput { format: TargetFormat, detail: String },

    // ── Setup errors ──────────────────────────────────────────────────────
    /// No generative service could be constructed (missing API key etc.).
    #[error("Generative service '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn mebibytes(bytes: &u64) -> u64 {
    bytes / (1024 * 1024)
}

fn service_message(message: &str) -> &str {
    if message.trim().is_empty() {
        SERVICE_BUSY_MESSAGE
    } else {
        message
    }
}

impl ConvertError {
    /// Build a service error from whatever message the transport produced.
    pub fn service(message: impl Into<String>) -> Self {
        ConvertError::ServiceError {
            message: message.into(),
        }
    }

    /// Classify this error for the session's `Error` state.
    ///
    /// Setup and I/O errors never occur inside an attempt through the normal
    /// path; if one does surface there it is reported as a service failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            ConvertError::TooLarge { .. } => FailureKind::TooLarge,
            ConvertError::ReadFailed { .. } => FailureKind::ReadFailed,
            ConvertError::EmptyResult => FailureKind::EmptyResult,
            ConvertError::InvalidOutput { .. } => FailureKind::InvalidOutput,
            ConvertError::ServiceError { .. }
            | ConvertError::ProviderNotConfigured { .. }
            | ConvertError::InvalidConfig(_)
            | ConvertError::OutputWriteFailed { .. }
            | ConvertError::Internal(_) => FailureKind::ServiceError,
        }
    }
}

/// The kinds of failure an attempt can settle with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TooLarge,
    ReadFailed,
    EmptyResult,
    ServiceError,
    InvalidOutput,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::TooLarge => "too_large",
            FailureKind::ReadFailed => "read_failed",
            FailureKind::EmptyResult => "empty_result",
            FailureKind::ServiceError => "service_error",
            FailureKind::InvalidOutput => "invalid_output",
        };
        f.write_str(s)
    }
}

/// A settled failure: what went wrong and the message to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&ConvertError> for Failure {
    fn from(e: &ConvertError) -> Self {
        Failure::new(e.kind(), e.to_string())
    }
}

impl From<ConvertError> for Failure {
    fn from(e: ConvertError) -> Self {
        Failure::from(&e)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_uses_sentinel() {
        assert_eq!(ConvertError::EmptyResult.to_string(), EMPTY_RESULT_MESSAGE);
    }

    #[test]
    fn service_error_keeps_message() {
        let e = ConvertError::service("rate limited");
        assert_eq!(e.to_string(), "rate limited");
        assert_eq!(e.kind(), FailureKind::ServiceError);
    }

    #[test]
    fn service_error_without_message_falls_back() {
        let e = ConvertError::service("   ");
        assert_eq!(e.to_string(), SERVICE_BUSY_MESSAGE);
    }

    #[test]
    fn too_large_display() {
        let e = ConvertError::TooLarge {
            name: "big.pdf".into(),
            size: 20 * 1024 * 1024,
            limit: 15 * 1024 * 1024,
        };
        let msg = e.to_string();
        assert!(msg.contains("big.pdf"), "got: {msg}");
        assert!(msg.contains("15 MB"), "got: {msg}");
        assert_eq!(e.kind(), FailureKind::TooLarge);
    }

    #[test]
    fn failure_from_error_keeps_kind_and_message() {
        let e = ConvertError::ReadFailed {
            path: PathBuf::from("/nope"),
            detail: "permission denied".into(),
        };
        let f = Failure::from(&e);
        assert_eq!(f.kind, FailureKind::ReadFailed);
        assert!(f.message.contains("permission denied"));
        assert!(!f.message.is_empty());
    }

    #[test]
    fn failure_kind_serialises_snake_case() {
        let json = serde_json::to_string(&FailureKind::EmptyResult).unwrap();
        assert_eq!(json, "\"empty_result\"");
    }
}
