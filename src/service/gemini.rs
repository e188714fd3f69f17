//! Native client for the Gemini `generateContent` REST endpoint.
//!
//! Gemini accepts arbitrary inline documents (PDF, Word, images, text) next
//! to the prompt and exposes a per-request thinking budget, which is how the
//! fast and deep tiers differ. Only the fields this crate sends or reads are
//! modelled.

use super::{GenerateRequest, GenerateResponse, GenerativeService};
use crate::config::ConverterConfig;
use crate::error::ConvertError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Gemini API client.
#[derive(Clone)]
pub struct GeminiService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for GeminiService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiService")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    system_instruction: WireContent<'a>,
    contents: Vec<WireContent<'a>>,
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize)]
struct WireContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<WirePart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart<'a> {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: WireInlineData<'a>,
    },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireInlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f32,
    thinking_config: WireThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(default)]
    usage_metadata: Option<WireUsage>,
    #[serde(default)]
    prompt_feedback: Option<WirePromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    #[serde(default)]
    content: Option<WireResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseContent {
    #[serde(default)]
    parts: Vec<WireResponsePart>,
}

#[derive(Debug, Deserialize)]
struct WireResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireErrorEnvelope {
    error: WireError,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    message: String,
}

// ── Client ───────────────────────────────────────────────────────────────

impl GeminiService {
    /// Create a client against `base_url` (e.g. `…/v1beta`).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ConvertError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConvertError::ProviderNotConfigured {
                provider: "gemini".to_string(),
                hint: "Set GEMINI_API_KEY (or API_KEY), or pass --api-key.".to_string(),
            });
        }

        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder
            .build()
            .map_err(|e| ConvertError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Create a client from the conversion config, resolving the API key
    /// from the environment when the config has none.
    pub fn from_config(config: &ConverterConfig) -> Result<Self, ConvertError> {
        let key = config.resolved_api_key().ok_or_else(|| {
            ConvertError::ProviderNotConfigured {
                provider: "gemini".to_string(),
                hint: "No API key found.\nSet GEMINI_API_KEY (or API_KEY), or pass --api-key."
                    .to_string(),
            }
        })?;
        Self::new(
            config.base_url.clone(),
            key,
            config.request_timeout_secs.map(Duration::from_secs),
        )
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

fn build_body(request: &GenerateRequest) -> WireRequest<'_> {
    WireRequest {
        system_instruction: WireContent {
            role: None,
            parts: vec![WirePart::Text {
                text: &request.system_instruction,
            }],
        },
        contents: vec![WireContent {
            role: Some("user"),
            parts: vec![
                WirePart::Inline {
                    inline_data: WireInlineData {
                        mime_type: &request.inline_data.mime_type,
                        data: &request.inline_data.data,
                    },
                },
                WirePart::Text {
                    text: &request.prompt,
                },
            ],
        }],
        generation_config: WireGenerationConfig {
            temperature: request.config.temperature,
            thinking_config: WireThinkingConfig {
                thinking_budget: request.config.thinking_budget,
            },
        },
    }
}

/// Join the non-thought text parts of the first candidate.
fn extract_text(response: &WireResponse) -> Option<String> {
    let candidate = response.candidates.first()?;
    let content = candidate.content.as_ref()?;
    let text: String = content
        .parts
        .iter()
        .filter(|p| !p.thought)
        .filter_map(|p| p.text.as_deref())
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<WireErrorEnvelope>(body) {
        Ok(env) if !env.error.message.trim().is_empty() => env.error.message,
        _ => format!("HTTP {status}"),
    }
}

#[async_trait]
impl GenerativeService for GeminiService {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ConvertError> {
        let body = build_body(&request);
        debug!(
            "Gemini request: model={} mime={} payload={}B thinking_budget={}",
            request.model,
            request.inline_data.mime_type,
            request.inline_data.data.len(),
            request.config.thinking_budget
        );

        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ConvertError::service(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ConvertError::service(e.to_string()))?;

        if !status.is_success() {
            let message = error_message(status, &text);
            warn!("Gemini API error: {}: {}", status, message);
            return Err(ConvertError::service(message));
        }

        let parsed: WireResponse = serde_json::from_str(&text)
            .map_err(|e| ConvertError::service(format!("Malformed Gemini response: {e}")))?;

        if let Some(reason) = parsed
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            warn!("Gemini blocked the prompt: {}", reason);
        }
        if let Some(reason) = parsed
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
        {
            debug!("Gemini finish reason: {}", reason);
        }

        let (input_tokens, output_tokens) = parsed
            .usage_metadata
            .as_ref()
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or((0, 0));

        Ok(GenerateResponse {
            text: extract_text(&parsed),
            input_tokens,
            output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{GenerationConfig, InlineData};

    fn sample_request(budget: u32) -> GenerateRequest {
        GenerateRequest {
            model: "gemini-3-flash-preview".into(),
            system_instruction: "sys".into(),
            prompt: "Convert this file.".into(),
            inline_data: InlineData {
                mime_type: "application/pdf".into(),
                data: "JVBERi0=".into(),
            },
            config: GenerationConfig {
                temperature: 0.1,
                thinking_budget: budget,
            },
        }
    }

    #[test]
    fn body_carries_inline_data_prompt_and_budget() {
        let req = sample_request(2000);
        let json = serde_json::to_value(build_body(&req)).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "sys");
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[0]["inlineData"]["data"], "JVBERi0=");
        assert_eq!(parts[1]["text"], "Convert this file.");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(
            json["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            2000
        );
        assert!(json["systemInstruction"].get("role").is_none());
    }

    #[test]
    fn extract_text_skips_thoughts_and_joins_parts() {
        let resp: WireResponse = serde_json::from_str(
            r##"{"candidates":[{"content":{"parts":[
                {"text":"thinking…","thought":true},
                {"text":"# Hel"},
                {"text":"lo"}
            ]},"finishReason":"STOP"}]}"##,
        )
        .unwrap();
        assert_eq!(extract_text(&resp).as_deref(), Some("# Hello"));
    }

    #[test]
    fn extract_text_none_without_candidates() {
        let resp: WireResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(extract_text(&resp).is_none());
    }

    #[test]
    fn error_message_prefers_service_message() {
        let body = r#"{"error":{"code":429,"message":"rate limited","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            error_message(reqwest::StatusCode::TOO_MANY_REQUESTS, body),
            "rate limited"
        );
        assert_eq!(
            error_message(reqwest::StatusCode::BAD_GATEWAY, "<html>"),
            "HTTP 502 Bad Gateway"
        );
    }

    #[test]
    fn empty_key_is_not_configured() {
        let err = GeminiService::new("http://localhost", " ", None).unwrap_err();
        assert!(matches!(err, ConvertError::ProviderNotConfigured { .. }));
    }

    #[test]
    fn endpoint_includes_model() {
        let svc = GeminiService::new("http://localhost:9/v1beta/", "k", None).unwrap();
        assert_eq!(
            svc.endpoint("gemini-3-pro-preview"),
            "http://localhost:9/v1beta/models/gemini-3-pro-preview:generateContent"
        );
    }
}
