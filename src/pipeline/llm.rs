//! Conversion client: build one generative request and extract its text.
//!
//! This module is intentionally thin. It picks the processing tier, derives
//! the instruction text from [`crate::prompts`], issues exactly one call to
//! the injected [`GenerativeService`], and maps the outcome to a uniform
//! result. There is no retry, backoff or streaming here; a failed attempt is
//! re-run only when the user asks for it.

use crate::config::{ConverterConfig, ProcessingTier};
use crate::error::ConvertError;
use crate::format::{ConversionOptions, TargetFormat};
use crate::pipeline::postprocess;
use crate::prompts;
use crate::service::{GenerateRequest, GenerationConfig, GenerativeService, InlineData};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Stateless façade over a [`GenerativeService`].
#[derive(Clone)]
pub struct ConversionClient {
    service: Arc<dyn GenerativeService>,
    config: ConverterConfig,
}

impl std::fmt::Debug for ConversionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionClient")
            .field("service", &self.service.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionClient {
    pub fn new(service: Arc<dyn GenerativeService>, config: ConverterConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Build the request for one attempt without sending it.
    pub fn build_request(
        &self,
        payload: String,
        source_mime_type: &str,
        format: TargetFormat,
        options: &ConversionOptions,
    ) -> GenerateRequest {
        let tier = ProcessingTier::for_options(options);
        let system_instruction = self
            .config
            .system_prompt
            .clone()
            .unwrap_or_else(|| prompts::system_instruction(format, options));

        GenerateRequest {
            model: self.config.model_for(tier).to_string(),
            system_instruction,
            prompt: prompts::user_prompt(format),
            inline_data: InlineData {
                mime_type: source_mime_type.to_string(),
                data: payload,
            },
            config: GenerationConfig {
                temperature: self.config.temperature,
                thinking_budget: self.config.thinking_budget_for(tier),
            },
        }
    }

    /// Convert an encoded document to `format`.
    ///
    /// # Errors
    /// * [`ConvertError::EmptyResult`]: the service answered with no text
    /// * [`ConvertError::ServiceError`]: transport, HTTP or response failure
    /// * [`ConvertError::InvalidOutput`]: only with `PostProcess::Validate`
    pub async fn convert(
        &self,
        payload: String,
        source_mime_type: &str,
        format: TargetFormat,
        options: &ConversionOptions,
    ) -> Result<String, ConvertError> {
        let start = Instant::now();
        let request = self.build_request(payload, source_mime_type, format, options);
        let model = request.model.clone();

        let response = self.service.generate(request).await.map_err(|e| {
            warn!("{} call failed after {:?}: {}", self.service.name(), start.elapsed(), e);
            e
        })?;

        debug!(
            "{}/{}: {} input tokens, {} output tokens, {:?}",
            self.service.name(),
            model,
            response.input_tokens,
            response.output_tokens,
            start.elapsed()
        );

        let text = match response.text {
            Some(t) if !t.is_empty() => t,
            _ => {
                warn!("{}/{} returned no text", self.service.name(), model);
                return Err(ConvertError::EmptyResult);
            }
        };

        postprocess::apply(self.config.postprocess, format, text)
    }
}
