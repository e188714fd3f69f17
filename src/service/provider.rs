//! Adapter that runs conversions through any `edgequake-llm` provider.
//!
//! The provider factory binds a model at construction time, so one provider
//! is built per tier model and requests are routed by `request.model`.
//! Providers have no notion of a thinking budget; it is dropped here and the
//! deep tier differs only by model.

use super::{GenerateRequest, GenerateResponse, GenerativeService};
use crate::config::{ConverterConfig, ProcessingTier};
use crate::error::ConvertError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A [`GenerativeService`] backed by `edgequake-llm` providers.
pub struct LlmProviderService {
    name: String,
    by_model: HashMap<String, Arc<dyn LLMProvider>>,
    fallback: Arc<dyn LLMProvider>,
}

impl LlmProviderService {
    /// Wrap a single pre-built provider; every request goes to it.
    pub fn from_provider(name: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            name: name.into(),
            by_model: HashMap::new(),
            fallback: provider,
        }
    }

    /// Build one provider per tier model via [`ProviderFactory`].
    ///
    /// The corresponding API key (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, …)
    /// is read from the environment by the factory.
    pub fn from_config(provider_name: &str, config: &ConverterConfig) -> Result<Self, ConvertError> {
        let fast_model = config.model_for(ProcessingTier::Fast).to_string();
        let deep_model = config.model_for(ProcessingTier::Deep).to_string();

        let fast = create_provider(provider_name, &fast_model)?;
        let mut by_model = HashMap::new();
        if deep_model != fast_model {
            by_model.insert(deep_model.clone(), create_provider(provider_name, &deep_model)?);
        }
        by_model.insert(fast_model, Arc::clone(&fast));

        Ok(Self {
            name: provider_name.to_string(),
            by_model,
            fallback: fast,
        })
    }

    fn provider_for(&self, model: &str) -> &Arc<dyn LLMProvider> {
        self.by_model.get(model).unwrap_or(&self.fallback)
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ConvertError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ConvertError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Turn provider output into optional text; zero-length output counts as none.
fn non_empty(content: String) -> Option<String> {
    if content.is_empty() {
        None
    } else {
        Some(content)
    }
}

#[async_trait]
impl GenerativeService for LlmProviderService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ConvertError> {
        let provider = self.provider_for(&request.model);
        let messages = vec![
            ChatMessage::system(&request.system_instruction),
            ChatMessage::user_with_images(
                &request.prompt,
                vec![ImageData::new(
                    request.inline_data.data.clone(),
                    &request.inline_data.mime_type,
                )],
            ),
        ];
        let options = CompletionOptions {
            temperature: Some(request.config.temperature),
            ..Default::default()
        };

        debug!(
            "{} request: model={} mime={} payload={}B (thinking budget not supported)",
            self.name,
            request.model,
            request.inline_data.mime_type,
            request.inline_data.data.len()
        );

        let response = provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ConvertError::service(format!("{e}")))?;

        Ok(GenerateResponse {
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
            text: non_empty(response.content),
        })
    }
}
