use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use relay_core::events::{ChatEvent, ResponsePayload};
use relay_core::records::TranscriptRecord;

use super::EventHandler;
use crate::agent_config::AgentConfigSource;
use crate::bus::{Delivery, ResponsePublisher};
use crate::model::ModelClient;
use crate::store::{ContextStore, TranscriptStore};

/// How processing of one chat event ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Payload failed validation; nothing was called
    Invalid,
    /// No usable agent config; nothing was written or published
    ConfigMissing,
    /// A response was generated but the transcript write failed
    PersistFailed,
    /// Transcript stored; delivery flags report the bus side
    Delivered {
        fell_back: bool,
        delivery: Delivery,
    },
}

/// Chat message pipeline: validate, resolve config, assemble context,
/// generate, persist, publish. Each step starts only after the previous one
/// finished.
pub struct MessagePipeline {
    configs: Arc<dyn AgentConfigSource>,
    context: Arc<dyn ContextStore>,
    model: ModelClient,
    transcripts: Arc<dyn TranscriptStore>,
    responses: ResponsePublisher,
}

impl MessagePipeline {
    pub fn new(
        configs: Arc<dyn AgentConfigSource>,
        context: Arc<dyn ContextStore>,
        model: ModelClient,
        transcripts: Arc<dyn TranscriptStore>,
        responses: ResponsePublisher,
    ) -> Self {
        Self {
            configs,
            context,
            model,
            transcripts,
            responses,
        }
    }

    pub async fn process(&self, payload: &str) -> MessageOutcome {
        let msg = match ChatEvent::parse(payload) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(code = err.code(), error = %err, "dropping invalid chat event");
                return MessageOutcome::Invalid;
            }
        };

        let config = match self.configs.fetch(&msg.agent_id).await {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    agent_id = %msg.agent_id,
                    conversation_id = %msg.conversation_id,
                    error = %err,
                    "agent config not found; dropping message"
                );
                return MessageOutcome::ConfigMissing;
            }
        };

        let context = match self.context.load_context(&msg.agent_id).await {
            Ok(context) => context,
            Err(err) => {
                tracing::warn!(
                    agent_id = %msg.agent_id,
                    error = %err,
                    "context lookup failed; continuing without context"
                );
                String::new()
            }
        };

        let generation = self.model.generate(&config, &context, &msg.message).await;

        let record = TranscriptRecord::new(&msg, generation.text.as_str(), Utc::now());
        if let Err(err) = self.transcripts.append_transcript(&record).await {
            tracing::error!(
                agent_id = %msg.agent_id,
                conversation_id = %msg.conversation_id,
                error = %err,
                "failed to persist transcript; response not delivered"
            );
            return MessageOutcome::PersistFailed;
        }

        let payload = ResponsePayload {
            conversation_id: msg.conversation_id.clone(),
            text: generation.text,
        };
        let delivery = self.responses.deliver(&msg.user_id, &payload).await;

        MessageOutcome::Delivered {
            fell_back: generation.fell_back,
            delivery,
        }
    }
}

#[async_trait]
impl EventHandler for MessagePipeline {
    async fn handle(&self, payload: &str) {
        let outcome = self.process(payload).await;
        tracing::debug!(?outcome, "chat event processed");
    }
}
