//! One-shot conversion entry points.
//!
//! Each function drives a private [`Session`] through exactly one attempt:
//! select the file, apply the choices, run, and map the settled state back to
//! a `Result`. Use [`Session`] directly when you need retry or want to keep
//! the file around between attempts.

use crate::config::{ConverterConfig, ProcessingTier};
use crate::error::{ConvertError, Failure};
use crate::format::{ConversionOptions, OptionChange, TargetFormat};
use crate::output::{self, OutputArtifact};
use crate::pipeline::input::SourceFile;
use crate::pipeline::llm::ConversionClient;
use crate::service::{GeminiService, GenerativeService, LlmProviderService};
use crate::session::Session;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// The result of a successful one-shot conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Result text paired with its download name and MIME type.
    pub artifact: OutputArtifact,
    pub tier: ProcessingTier,
    pub duration: Duration,
}

impl ConversionOutput {
    /// The converted text, exactly as the service returned it.
    pub fn text(&self) -> &str {
        &self.artifact.content
    }
}

/// Machine-readable summary of a session's last attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub file: Option<String>,
    pub format: TargetFormat,
    pub options: ConversionOptions,
    pub tier: ProcessingTier,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
    pub attempts: u32,
    pub duration_ms: u64,
}

impl ConversionReport {
    /// Summarise `session`, preferring the parameters of its last attempt.
    pub fn from_session(session: &Session, attempts: u32, duration: Duration) -> Self {
        let (file, format, options) = match session.last_attempt() {
            Some(p) => (Some(p.file.name().to_string()), p.format, p.options),
            None => (
                session.file().map(|f| f.name().to_string()),
                session.format(),
                *session.options(),
            ),
        };
        Self {
            file,
            format,
            tier: ProcessingTier::for_options(&options),
            options,
            status: session.status().label(),
            artifact: session.artifact().map(|a| a.file_name),
            output_path: None,
            error: session.failure().cloned(),
            attempts,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }
}

/// Convert the file at `path` to `format`.
///
/// # Errors
/// The error the attempt settled with, or a setup error when no service can
/// be resolved from `config`.
pub async fn convert(
    path: impl AsRef<Path>,
    format: TargetFormat,
    options: ConversionOptions,
    config: &ConverterConfig,
) -> Result<ConversionOutput, ConvertError> {
    let file = SourceFile::from_path(path, config.max_file_bytes).await?;
    convert_source(file, format, options, config).await
}

/// Convert an in-memory document.
///
/// `name` is used for the artifact file name and, without `mime_type`, for
/// MIME detection.
pub async fn convert_from_bytes(
    name: &str,
    bytes: impl Into<Arc<[u8]>>,
    mime_type: Option<&str>,
    format: TargetFormat,
    options: ConversionOptions,
    config: &ConverterConfig,
) -> Result<ConversionOutput, ConvertError> {
    let file = SourceFile::from_bytes(name, bytes, mime_type, config.max_file_bytes)?;
    convert_source(file, format, options, config).await
}

/// Convert the file at `path` and write `<stem>_converted.<ext>` into
/// `output_dir`. Returns the written path.
pub async fn convert_to_file(
    path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    format: TargetFormat,
    options: ConversionOptions,
    config: &ConverterConfig,
) -> Result<PathBuf, ConvertError> {
    let output = convert(path, format, options, config).await?;
    output::write_artifact(output_dir.as_ref(), &output.artifact).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    path: impl AsRef<Path>,
    format: TargetFormat,
    options: ConversionOptions,
    config: &ConverterConfig,
) -> Result<ConversionOutput, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(path, format, options, config))
}

async fn convert_source(
    file: SourceFile,
    format: TargetFormat,
    options: ConversionOptions,
    config: &ConverterConfig,
) -> Result<ConversionOutput, ConvertError> {
    let start = Instant::now();
    let client = build_client(config)?;
    info!("Converting {} to {} via {}", file.name(), format, client.service_name());

    let mut session = Session::new(config.max_file_bytes);
    let _ = session.select_file(file)?;
    let _ = session.set_format(format);
    let _ = session.set_option(OptionChange::Summarize(options.summarize));
    let _ = session.set_option(OptionChange::TranslateTo(options.translate_to));
    let _ = session.set_option(OptionChange::HighPrecision(options.high_precision));

    let attempt = session
        .start_convert()
        .ok_or_else(|| ConvertError::Internal("no attempt could be started".to_string()))?;
    let outcome = attempt.execute(&client).await;
    let duration = start.elapsed();

    match outcome {
        Ok(text) => {
            let _ = session.settle_success(attempt.id(), text);
            let artifact = session
                .artifact()
                .ok_or_else(|| ConvertError::Internal("success without artifact".to_string()))?;
            debug!("Converted in {:?}", duration);
            Ok(ConversionOutput {
                artifact,
                tier: attempt.params().tier(),
                duration,
            })
        }
        Err(e) => {
            let _ = session.settle_error(attempt.id(), Failure::from(&e));
            Err(e)
        }
    }
}

/// Build a [`ConversionClient`] around the service `config` resolves to.
pub fn build_client(config: &ConverterConfig) -> Result<ConversionClient, ConvertError> {
    let service = resolve_service(config)?;
    Ok(ConversionClient::new(service, config.clone()))
}

/// Resolve the generative service, from most-specific to least-specific.
///
/// 1. **Pre-built service** (`config.provider`) used as-is. Useful in tests
///    or when the caller wraps the service in middleware.
/// 2. **Gemini** when `provider_name` is `"gemini"`, or unset and a key is
///    available from the config, `GEMINI_API_KEY` or `API_KEY`.
/// 3. **Named provider** (`provider_name`, e.g. `"openai"`) created through
///    [`edgequake_llm::ProviderFactory`], which reads that provider's own
///    API key from the environment.
pub fn resolve_service(config: &ConverterConfig) -> Result<Arc<dyn GenerativeService>, ConvertError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    match config.provider_name.as_deref() {
        None | Some("gemini") => {
            if config.resolved_api_key().is_none() {
                return Err(ConvertError::ProviderNotConfigured {
                    provider: "gemini".to_string(),
                    hint: "Set GEMINI_API_KEY (or API_KEY), pass --api-key, \
                           or choose another provider with --provider."
                        .to_string(),
                });
            }
            Ok(Arc::new(GeminiService::from_config(config)?))
        }
        Some(name) => Ok(Arc::new(LlmProviderService::from_config(name, config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{GenerateRequest, GenerateResponse};
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl GenerativeService for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ConvertError> {
            Ok(GenerateResponse::text(format!("{}:{}", request.model, request.inline_data.mime_type)))
        }
    }

    struct Silent;

    #[async_trait]
    impl GenerativeService for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn generate(&self, _: GenerateRequest) -> Result<GenerateResponse, ConvertError> {
            Ok(GenerateResponse::empty())
        }
    }

    fn config_with(service: Arc<dyn GenerativeService>) -> ConverterConfig {
        ConverterConfig::builder().provider(service).build().unwrap()
    }

    #[test]
    fn prebuilt_provider_wins() {
        let config = ConverterConfig::builder()
            .provider(Arc::new(Echo))
            .provider_name("openai")
            .build()
            .unwrap();
        assert_eq!(resolve_service(&config).unwrap().name(), "echo");
    }

    #[test]
    fn explicit_key_selects_gemini() {
        let config = ConverterConfig::builder().api_key("k").build().unwrap();
        assert_eq!(resolve_service(&config).unwrap().name(), "gemini");
    }

    #[tokio::test]
    async fn bytes_convert_to_named_artifact() {
        let out = convert_from_bytes(
            "memo.pdf",
            b"%PDF-1.4".to_vec(),
            None,
            TargetFormat::Markdown,
            ConversionOptions::default(),
            &config_with(Arc::new(Echo)),
        )
        .await
        .unwrap();
        assert_eq!(out.artifact.file_name, "memo_converted.md");
        assert_eq!(out.text(), "gemini-3-flash-preview:application/pdf");
        assert_eq!(out.tier, ProcessingTier::Fast);
    }

    #[tokio::test]
    async fn precision_option_reaches_the_request() {
        let out = convert_from_bytes(
            "memo.txt",
            b"hello".to_vec(),
            None,
            TargetFormat::Text,
            ConversionOptions::default().high_precision(true),
            &config_with(Arc::new(Echo)),
        )
        .await
        .unwrap();
        assert_eq!(out.text(), "gemini-3-pro-preview:text/plain");
        assert_eq!(out.tier, ProcessingTier::Deep);
    }

    #[tokio::test]
    async fn empty_reply_is_empty_result() {
        let err = convert_from_bytes(
            "memo.txt",
            b"hello".to_vec(),
            None,
            TargetFormat::Text,
            ConversionOptions::default(),
            &config_with(Arc::new(Silent)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConvertError::EmptyResult));
    }

    #[tokio::test]
    async fn oversized_bytes_never_reach_the_service() {
        let config = ConverterConfig::builder()
            .provider(Arc::new(Echo))
            .max_file_bytes(4)
            .build()
            .unwrap();
        let err = convert_from_bytes(
            "memo.txt",
            b"hello".to_vec(),
            None,
            TargetFormat::Text,
            ConversionOptions::default(),
            &config,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConvertError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn convert_to_file_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("letter.txt");
        std::fs::write(&src, "Dear reader").unwrap();

        let written = convert_to_file(
            &src,
            dir.path().join("out"),
            TargetFormat::Json,
            ConversionOptions::default(),
            &config_with(Arc::new(Echo)),
        )
        .await
        .unwrap();
        assert_eq!(written, dir.path().join("out").join("letter_converted.json"));
        assert_eq!(
            std::fs::read_to_string(written).unwrap(),
            "gemini-3-flash-preview:text/plain"
        );
    }

    #[test]
    fn convert_sync_runs_without_a_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.md");
        std::fs::write(&src, "# a").unwrap();
        let out = convert_sync(
            &src,
            TargetFormat::Html,
            ConversionOptions::default(),
            &config_with(Arc::new(Echo)),
        )
        .unwrap();
        assert_eq!(out.artifact.mime_type, "text/html");
    }

    #[test]
    fn report_reflects_idle_session() {
        let session = Session::default();
        let report = ConversionReport::from_session(&session, 0, Duration::ZERO);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["format"], "docx");
        assert!(json.get("error").is_none());
    }
}
