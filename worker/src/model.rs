use std::sync::Arc;

use async_trait::async_trait;
use relay_core::records::{AgentConfig, FALLBACK_RESPONSE};
use serde_json::json;

use crate::error::ModelError;

/// A single-turn prompt for the generative backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    /// System prompt with the agent's document context appended
    pub system: String,
    pub user: String,
}

impl CompletionRequest {
    pub fn new(model: &str, system_prompt: &str, context: &str, message: &str) -> Self {
        Self {
            model: model.to_string(),
            system: format!("{system_prompt}\nContext:\n{context}"),
            user: message.to_string(),
        }
    }

    fn to_body(&self) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": self.system},
                {"role": "user", "content": self.user},
            ],
        })
    }
}

/// Request/response call to a generative backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError>;
}

/// OpenAI-compatible `chat/completions` backend (OpenRouter, OpenAI, local gateways).
#[derive(Clone)]
pub struct OpenAiCompatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatModel {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

fn text_from_completion(resp: &serde_json::Value) -> Result<String, ModelError> {
    resp["choices"][0]["message"]["content"]
        .as_str()
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
        .ok_or(ModelError::EmptyResponse)
}

#[async_trait]
impl ChatModel for OpenAiCompatModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        tracing::debug!(model = %request.model, "model completion request");

        let http_resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request.to_body())
            .send()
            .await?;

        let status = http_resp.status();
        if !status.is_success() {
            let body = http_resp.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let resp = http_resp.json::<serde_json::Value>().await?;
        text_from_completion(&resp)
    }
}

/// Result of one generation. `fell_back` marks the fixed apology text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub fell_back: bool,
}

/// Builds the prompt for an agent and always yields response text: backend
/// failures turn into [`FALLBACK_RESPONSE`].
#[derive(Clone)]
pub struct ModelClient {
    backend: Arc<dyn ChatModel>,
    default_model: String,
}

impl ModelClient {
    pub fn new(backend: Arc<dyn ChatModel>, default_model: impl Into<String>) -> Self {
        Self {
            backend,
            default_model: default_model.into(),
        }
    }

    pub async fn generate(&self, config: &AgentConfig, context: &str, message: &str) -> Generation {
        let model = config.model_or(&self.default_model);
        let request = CompletionRequest::new(model, &config.system_prompt, context, message);

        match self.backend.complete(&request).await {
            Ok(text) => Generation {
                text,
                fell_back: false,
            },
            Err(err) => {
                tracing::warn!(model = %model, error = %err, "generation failed; using fallback response");
                Generation {
                    text: FALLBACK_RESPONSE.to_string(),
                    fell_back: true,
                }
            }
        }
    }
}
