use std::time::Duration;

use clap::Parser;

/// Startup configuration. Every flag falls back to an environment variable,
/// and `.env` is loaded before parsing.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "relay-worker",
    version,
    about = "Relays chat messages and uploaded documents between Redis pub/sub and a generative-model backend"
)]
pub struct Settings {
    /// Redis URL for pub/sub and the response cache (redis://:password@host:port)
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Postgres connection string for transcripts and file context
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    pub database_max_connections: u32,

    /// Base URL of the OpenAI-compatible model backend
    #[arg(long, env = "MODEL_API_URL", default_value = "https://openrouter.ai/api/v1")]
    pub model_api_url: String,

    #[arg(long, env = "MODEL_API_KEY", hide_env_values = true)]
    pub model_api_key: String,

    /// Model used when an agent's config leaves it unset
    #[arg(long, env = "DEFAULT_MODEL", default_value = "deepseek/deepseek-v3-base:free")]
    pub default_model: String,

    #[arg(long, env = "MODEL_TIMEOUT_SECS", default_value_t = 120)]
    pub model_timeout_secs: u64,

    /// Base URL of the agent-configuration service
    #[arg(long, env = "CONFIG_API_URL", default_value = "http://localhost:7254")]
    pub config_api_url: String,

    /// Bearer token for the agent-configuration service
    #[arg(long, env = "CONFIG_API_TOKEN", hide_env_values = true)]
    pub config_api_token: Option<String>,

    #[arg(long, env = "CONFIG_TIMEOUT_SECS", default_value_t = 30)]
    pub config_timeout_secs: u64,

    /// Port for the health probe
    #[arg(long, env = "HEALTH_PORT", default_value_t = 8080)]
    pub health_port: u16,
}

impl Settings {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn config_timeout(&self) -> Duration {
        Duration::from_secs(self.config_timeout_secs)
    }

    /// Token with surrounding whitespace removed; blank counts as unset.
    pub fn config_token(&self) -> Option<&str> {
        self.config_api_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}
