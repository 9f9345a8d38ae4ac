use async_trait::async_trait;
use relay_core::events::AgentId;
use relay_core::records::AgentConfig;
use serde::Deserialize;

use crate::error::ConfigError;

/// Resolves an agent to its model and system prompt.
#[async_trait]
pub trait AgentConfigSource: Send + Sync {
    async fn fetch(&self, agent_id: &AgentId) -> Result<AgentConfig, ConfigError>;
}

/// Agent record as returned by the agent API; only `config` matters here.
#[derive(Debug, Deserialize)]
struct AgentResponse {
    #[serde(default)]
    config: Option<AgentConfig>,
}

/// REST client for `GET {base}/api/agent/Agent/{agent_id}`.
#[derive(Clone)]
pub struct HttpAgentConfigSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpAgentConfigSource {
    pub fn new(client: reqwest::Client, base_url: &str, token: Option<&str>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(str::to_string),
        }
    }

    fn agent_url(&self, agent_id: &AgentId) -> String {
        format!("{}/api/agent/Agent/{}", self.base_url, agent_id)
    }
}

fn config_from_body(body: &str) -> Result<AgentConfig, ConfigError> {
    serde_json::from_str::<AgentResponse>(body)
        .ok()
        .and_then(|agent| agent.config)
        .ok_or(ConfigError::NotConfigured)
}

#[async_trait]
impl AgentConfigSource for HttpAgentConfigSource {
    async fn fetch(&self, agent_id: &AgentId) -> Result<AgentConfig, ConfigError> {
        let mut request = self.client.get(self.agent_url(agent_id));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConfigError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        config_from_body(&body)
    }
}
