use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{AgentId, ChatMessage};

/// Text users see when the model backend fails. A response carrying this text
/// still counts as generated: it is persisted and published like any other.
pub const FALLBACK_RESPONSE: &str = "Sorry, an error occurred while processing your message.";

/// Per-agent settings resolved from the agent-configuration service.
///
/// Looked up fresh for every message and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    #[serde(default)]
    pub model: Option<String>,
    pub system_prompt: String,
}

impl AgentConfig {
    /// The configured model, or `default` when the agent leaves it unset or blank.
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(default)
    }
}

/// Extracted text of one uploaded file. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextRecord {
    pub agent_id: AgentId,
    pub file_name: String,
    pub content: String,
    pub uploaded_at: DateTime<Utc>,
}

/// One input/output exchange of a conversation. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptRecord {
    /// UUIDv7, so ids sort by write time
    pub id: Uuid,
    pub conversation_id: String,
    pub user_id: String,
    pub agent_id: AgentId,
    pub input: String,
    pub output: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptRecord {
    pub fn new(msg: &ChatMessage, output: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id: msg.conversation_id.clone(),
            user_id: msg.user_id.clone(),
            agent_id: msg.agent_id.clone(),
            input: msg.message.clone(),
            output: output.into(),
            timestamp,
        }
    }
}
