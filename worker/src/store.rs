use async_trait::async_trait;
use relay_core::events::AgentId;
use relay_core::records::{ContextRecord, TranscriptRecord};
use sqlx::PgPool;

use crate::error::StoreError;

/// Extracted document text per agent, read back in insertion order.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// All stored chunks for the agent, newline-joined, oldest first.
    async fn load_context(&self, agent_id: &AgentId) -> Result<String, StoreError>;

    async fn append_context(&self, record: &ContextRecord) -> Result<(), StoreError>;
}

/// Append-only log of generated responses.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn append_transcript(&self, record: &TranscriptRecord) -> Result<(), StoreError>;
}

/// Postgres-backed implementation of both stores.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContextStore for PgStore {
    async fn load_context(&self, agent_id: &AgentId) -> Result<String, StoreError> {
        let chunks = sqlx::query_scalar::<_, String>(
            "SELECT content FROM agent_files WHERE agent_id = $1 ORDER BY id",
        )
        .bind(agent_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(chunks.join("\n"))
    }

    async fn append_context(&self, record: &ContextRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO agent_files (agent_id, file_name, content, uploaded_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.agent_id.as_str())
        .bind(&record.file_name)
        .bind(&record.content)
        .bind(record.uploaded_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl TranscriptStore for PgStore {
    async fn append_transcript(&self, record: &TranscriptRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chat_history (id, conversation_id, user_id, agent_id, input, output, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(&record.conversation_id)
        .bind(&record.user_id)
        .bind(record.agent_id.as_str())
        .bind(&record.input)
        .bind(&record.output)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
