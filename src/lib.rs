//! # omniconvert
//!
//! Convert documents (PDF, Word, text, images) into Markdown, JSON, CSV,
//! plain text, HTML, Word-compatible HTML, RTF or print-ready HTML by
//! handing the file to a multimodal generative model.
//!
//! The crate owns no format encoders. It encodes the source file, builds a
//! format-specific instruction, makes exactly one model call per attempt, and
//! hands the text back as-is. The interesting part is the small state
//! machine around that call, [`Session`], which guarantees a single attempt
//! in flight and explicit, user-driven retry.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Input    select a path or bytes, enforce the size ceiling
//!  ├─ 2. Encode   read once, base64
//!  ├─ 3. Model    one generateContent call (fast or deep tier)
//!  ├─ 4. Check    optional structural validation
//!  └─ 5. Output   result text + <stem>_converted.<ext>
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use omniconvert::{convert, ConversionOptions, ConverterConfig, TargetFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Gemini key read from GEMINI_API_KEY / API_KEY
//!     let config = ConverterConfig::default();
//!     let options = ConversionOptions::default().summarize(true);
//!     let output = convert("report.pdf", TargetFormat::Markdown, options, &config).await?;
//!     println!("{}", output.text());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `omniconvert` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## Processing Tiers
//!
//! | Tier | Model | Thinking budget | Chosen when |
//! |------|-------|-----------------|-------------|
//! | fast | `gemini-3-flash-preview` | 0 | default |
//! | deep | `gemini-3-pro-preview` | 2000 | `high_precision` is on |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod service;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConverterConfig, ConverterConfigBuilder, PostProcess, ProcessingTier};
pub use convert::{
    build_client, convert, convert_from_bytes, convert_sync, convert_to_file, resolve_service,
    ConversionOutput, ConversionReport,
};
pub use error::{ConvertError, Failure, FailureKind};
pub use format::{ConversionOptions, Language, OptionChange, TargetFormat};
pub use output::{print_document, write_artifact, write_print_document, OutputArtifact};
pub use pipeline::input::SourceFile;
pub use pipeline::llm::ConversionClient;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use service::{GeminiService, GenerativeService, LlmProviderService};
pub use session::{Attempt, AttemptId, Dispatch, Session, Status};
