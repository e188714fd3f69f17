//! Configuration types for document conversion.
//!
//! Everything the conversion client needs (models per tier, sampling, API
//! credentials, the file-size ceiling) lives in one [`ConverterConfig`],
//! built via its [`ConverterConfigBuilder`]. The per-attempt choices a user
//! makes (format, summarize, translate, precision) are not here; they travel
//! with each attempt as [`crate::format::ConversionOptions`].

use crate::error::ConvertError;
use crate::format::ConversionOptions;
use crate::service::GenerativeService;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Largest file accepted for processing: 15 MiB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 15 * 1024 * 1024;

/// Default Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Configuration for the conversion client.
///
/// # Example
/// ```rust
/// use omniconvert::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .fast_model("gemini-3-flash-preview")
///     .temperature(0.1)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConverterConfig {
    /// Model used by the fast tier. Default: `gemini-3-flash-preview`.
    pub fast_model: String,

    /// Model used by the deep (high precision) tier. Default: `gemini-3-pro-preview`.
    pub deep_model: String,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Conversion should reproduce the document, not improvise on it.
    pub temperature: f32,

    /// Thinking budget sent with deep-tier requests. Default: 2000.
    ///
    /// Fast-tier requests always send a budget of 0.
    pub deep_thinking_budget: u32,

    /// Files larger than this are rejected at selection time. Default: 15 MiB.
    pub max_file_bytes: u64,

    /// API key for the native Gemini client.
    /// If None, `GEMINI_API_KEY` then `API_KEY` are read from the environment.
    pub api_key: Option<String>,

    /// Gemini REST base URL, without a trailing slash.
    pub base_url: String,

    /// Per-request timeout in seconds. Default: None (wait for the service).
    pub request_timeout_secs: Option<u64>,

    /// Provider name (`gemini`, `openai`, `anthropic`, `ollama`, …).
    /// If None, Gemini is used.
    pub provider_name: Option<String>,

    /// Pre-constructed service. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn GenerativeService>>,

    /// Custom system instruction. If None, uses the built-in one.
    pub system_prompt: Option<String>,

    /// What to do with the model's text before declaring success.
    pub postprocess: PostProcess,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            fast_model: "gemini-3-flash-preview".to_string(),
            deep_model: "gemini-3-pro-preview".to_string(),
            temperature: 0.1,
            deep_thinking_budget: 2000,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            request_timeout_secs: None,
            provider_name: None,
            provider: None,
            system_prompt: None,
            postprocess: PostProcess::default(),
        }
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("fast_model", &self.fast_model)
            .field("deep_model", &self.deep_model)
            .field("temperature", &self.temperature)
            .field("deep_thinking_budget", &self.deep_thinking_budget)
            .field("max_file_bytes", &self.max_file_bytes)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn GenerativeService>"))
            .field("postprocess", &self.postprocess)
            .finish()
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model name for the given tier.
    pub fn model_for(&self, tier: ProcessingTier) -> &str {
        match tier {
            ProcessingTier::Fast => &self.fast_model,
            ProcessingTier::Deep => &self.deep_model,
        }
    }

    /// Thinking budget for the given tier.
    pub fn thinking_budget_for(&self, tier: ProcessingTier) -> u32 {
        match tier {
            ProcessingTier::Fast => 0,
            ProcessingTier::Deep => self.deep_thinking_budget,
        }
    }

    /// The API key from config, else `GEMINI_API_KEY`, else `API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn fast_model(mut self, model: impl Into<String>) -> Self {
        self.config.fast_model = model.into();
        self
    }

    pub fn deep_model(mut self, model: impl Into<String>) -> Self {
        self.config.deep_model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn deep_thinking_budget(mut self, budget: u32) -> Self {
        self.config.deep_thinking_budget = budget;
        self
    }

    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_bytes = bytes;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn GenerativeService>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn postprocess(mut self, mode: PostProcess) -> Self {
        self.config.postprocess = mode;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, ConvertError> {
        let c = &self.config;
        if c.fast_model.trim().is_empty() || c.deep_model.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "model names must not be empty".into(),
            ));
        }
        if c.max_file_bytes == 0 {
            return Err(ConvertError::InvalidConfig(
                "max file size must be ≥ 1 byte".into(),
            ));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(ConvertError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        if !c.base_url.starts_with("http://") && !c.base_url.starts_with("https://") {
            return Err(ConvertError::InvalidConfig(format!(
                "base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Fast/shallow vs. slow/deep processing.
///
/// | Tier | Model | Thinking budget |
/// |------|-------|-----------------|
/// | Fast | `fast_model` | 0 |
/// | Deep | `deep_model` | `deep_thinking_budget` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingTier {
    /// Turbo mode. (default)
    #[default]
    Fast,
    /// Precision mode.
    Deep,
}

impl ProcessingTier {
    pub fn for_options(options: &ConversionOptions) -> Self {
        if options.high_precision {
            ProcessingTier::Deep
        } else {
            ProcessingTier::Fast
        }
    }
}

impl fmt::Display for ProcessingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingTier::Fast => f.write_str("fast"),
            ProcessingTier::Deep => f.write_str("deep"),
        }
    }
}

/// Handling of the model's text before an attempt settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PostProcess {
    /// Hand the text back exactly as the model produced it. (default)
    #[default]
    None,
    /// Reject structurally invalid output for structured formats.
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_turbo_mode() {
        let c = ConverterConfig::default();
        assert_eq!(c.temperature, 0.1);
        assert_eq!(c.max_file_bytes, 15 * 1024 * 1024);
        assert_eq!(c.model_for(ProcessingTier::Fast), "gemini-3-flash-preview");
        assert_eq!(c.model_for(ProcessingTier::Deep), "gemini-3-pro-preview");
        assert_eq!(c.postprocess, PostProcess::None);
        assert!(c.request_timeout_secs.is_none());
    }

    #[test]
    fn thinking_budget_is_zero_for_fast_tier() {
        let c = ConverterConfig::builder()
            .deep_thinking_budget(4096)
            .build()
            .unwrap();
        assert_eq!(c.thinking_budget_for(ProcessingTier::Fast), 0);
        assert_eq!(c.thinking_budget_for(ProcessingTier::Deep), 4096);
    }

    #[test]
    fn tier_follows_high_precision() {
        let fast = ConversionOptions::default();
        let deep = ConversionOptions::default().high_precision(true);
        assert_eq!(ProcessingTier::for_options(&fast), ProcessingTier::Fast);
        assert_eq!(ProcessingTier::for_options(&deep), ProcessingTier::Deep);
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = ConverterConfig::builder().temperature(7.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn builder_trims_trailing_slash() {
        let c = ConverterConfig::builder()
            .base_url("http://localhost:1234/")
            .build()
            .unwrap();
        assert_eq!(c.base_url, "http://localhost:1234");
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert!(ConverterConfig::builder().max_file_bytes(0).build().is_err());
        assert!(ConverterConfig::builder().fast_model("  ").build().is_err());
        assert!(ConverterConfig::builder()
            .request_timeout_secs(0)
            .build()
            .is_err());
        assert!(ConverterConfig::builder().base_url("ftp://x").build().is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ConverterConfig::builder().api_key("secret-key").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn explicit_api_key_wins() {
        let c = ConverterConfig::builder().api_key("k1").build().unwrap();
        assert_eq!(c.resolved_api_key().as_deref(), Some("k1"));
    }
}
