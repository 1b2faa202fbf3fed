//! OpenAI-compatible chat-completions backend.
//!
//! Works against OpenAI itself and any server exposing the same
//! `/v1/chat/completions` contract (Ollama, vLLM, LM Studio).

use crate::backend::{LlmBackend, LlmBackendConfig, LlmProvider, LlmRequest, LlmResponse, TokenUsage};
use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Chat-completions client for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleBackend {
    client: reqwest::Client,
    config: LlmBackendConfig,
    completions_url: String,
}

impl OpenAiCompatibleBackend {
    /// Creates a backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the provider needs an API key and none is
    /// configured, or if the HTTP client cannot be built.
    pub fn new(config: LlmBackendConfig) -> Result<Self, LlmError> {
        let has_key = config.api_key.as_deref().is_some_and(|k| !k.is_empty());
        if config.provider.requires_api_key() && !has_key {
            return Err(LlmError::InvalidConfig {
                reason: format!("provider '{}' requires an API key", config.provider),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: e.to_string(),
            })?;

        let completions_url = format!(
            "{}/v1/chat/completions",
            config.base_url.trim_end_matches('/')
        );

        Ok(Self {
            client,
            config,
            completions_url,
        })
    }

    fn body(&self, request: &LlmRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: request
                .messages()
                .into_iter()
                .map(|m| ChatMessage {
                    role: match m.role {
                        crate::backend::MessageRole::User => "user",
                        crate::backend::MessageRole::Assistant => "assistant",
                        crate::backend::MessageRole::System => "system",
                    },
                    content: m.content,
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    #[instrument(skip(self, request), fields(provider = %self.config.provider, model = %self.config.model))]
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut http = self.client.post(&self.completions_url).json(&self.body(request));

        if let Some(ref api_key) = self.config.api_key
            && !api_key.is_empty()
        {
            http = http.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = http.send().await.map_err(|e| {
            warn!(error = %e, endpoint = %self.completions_url, "Chat completion request failed");
            if e.is_timeout() {
                LlmError::Timeout
            } else if e.is_connect() {
                LlmError::ProviderUnavailable {
                    provider: self.config.provider.to_string(),
                    reason: e.to_string(),
                }
            } else {
                LlmError::RequestFailed {
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = %status,
                body = %body,
                endpoint = %self.completions_url,
                "Chat completion endpoint returned error"
            );
            return Err(error_for_status(
                self.config.provider,
                status.as_u16(),
                retry_after,
                &body,
            ));
        }

        let parsed: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::ResponseParseFailed {
                    reason: e.to_string(),
                })?;

        let llm_response = parsed.into_llm_response(&self.config.model)?;
        debug!(
            input_tokens = llm_response.usage.input_tokens,
            output_tokens = llm_response.usage.output_tokens,
            "Chat completion succeeded"
        );
        Ok(llm_response)
    }

    fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

/// Maps a non-success HTTP status to the error taxonomy.
fn error_for_status(
    provider: LlmProvider,
    status: u16,
    retry_after_secs: Option<u64>,
    body: &str,
) -> LlmError {
    match status {
        429 => LlmError::RateLimited { retry_after_secs },
        401 | 403 => LlmError::Unauthorized {
            provider: provider.to_string(),
        },
        502..=504 => LlmError::ProviderUnavailable {
            provider: provider.to_string(),
            reason: format!("HTTP {status}"),
        },
        _ => LlmError::RequestFailed {
            reason: format!("HTTP {status}: {body}"),
        },
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl ChatCompletionResponse {
    fn into_llm_response(self, requested_model: &str) -> Result<LlmResponse, LlmError> {
        let content = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::ResponseParseFailed {
                reason: "response contained no message content".to_string(),
            })?;

        let usage = self
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            usage,
            model: self.model.unwrap_or_else(|| requested_model.to_string()),
        })
    }
}
