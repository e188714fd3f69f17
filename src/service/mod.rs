//! The external generative content service, behind a narrow interface.
//!
//! The conversion client never talks HTTP itself; it hands a fully built
//! [`GenerateRequest`] to a [`GenerativeService`] and gets text (or nothing)
//! back. That keeps the one nondeterministic collaborator swappable: tests
//! inject a deterministic stub, the CLI picks Gemini or any provider
//! `edgequake-llm` knows about.
//!
//! ```text
//! ConversionClient ──▶ dyn GenerativeService
//!                        ├─ GeminiService       (native REST, thinking budget)
//!                        └─ LlmProviderService  (edgequake-llm providers)
//! ```

pub mod gemini;
pub mod provider;

pub use gemini::GeminiService;
pub use provider::LlmProviderService;

use crate::error::ConvertError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Inline binary payload: base64 data plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineData {
    pub mime_type: String,
    /// Standard base64, no `data:` prefix.
    pub data: String,
}

/// Sampling and deliberation settings for one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    /// Zero disables deliberation.
    pub thinking_budget: u32,
}

/// Everything the service needs for one conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: String,
    pub prompt: String,
    pub inline_data: InlineData,
    pub config: GenerationConfig,
}

/// What came back. `text` is `None` when the service produced no text part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateResponse {
    pub text: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl GenerateResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// A generative content backend.
///
/// Implementations issue exactly one request per call and never retry.
/// Transport, HTTP and response-shape failures are returned as
/// [`ConvertError::ServiceError`]; a well-formed answer without text is
/// `Ok` with `text: None`.
#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// Short name for logs, e.g. `"gemini"`.
    fn name(&self) -> &str;

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ConvertError>;
}
