use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use relay_core::events::{AgentId, ResponsePayload};
use relay_core::keys;

use crate::error::BusError;

/// One channel subscription. Yields payloads in delivery order.
#[async_trait]
pub trait Subscription: Send {
    /// Next payload, or `None` once the underlying subscription has ended.
    async fn next_payload(&mut self) -> Option<String>;
}

/// Write side of the bus: channel publish plus expiring key writes.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64)
    -> Result<(), BusError>;
}

pub struct RedisSubscription {
    channel: String,
    messages: BoxStream<'static, redis::Msg>,
}

impl RedisSubscription {
    /// Opens a dedicated pub/sub connection and subscribes to `channel`.
    pub async fn connect(client: &redis::Client, channel: &str) -> Result<Self, BusError> {
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        tracing::info!(channel, "subscribed");

        Ok(Self {
            channel: channel.to_string(),
            messages: pubsub.into_on_message().boxed(),
        })
    }
}

#[async_trait]
impl Subscription for RedisSubscription {
    async fn next_payload(&mut self) -> Option<String> {
        loop {
            let msg = self.messages.next().await?;
            match msg.get_payload::<String>() {
                Ok(payload) => return Some(payload),
                Err(err) => {
                    tracing::warn!(
                        channel = %self.channel,
                        error = %err,
                        "dropping message with non-text payload"
                    );
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct RedisPublisher {
    conn: MultiplexedConnection,
}

impl RedisPublisher {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await?;
        Ok(())
    }
}

/// What happened to each of the two delivery paths of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub published: bool,
    pub cached: bool,
}

/// Delivers generated responses and file completion markers over the bus.
///
/// Failures are logged here and reported back as flags; callers never abort
/// on them.
#[derive(Clone)]
pub struct ResponsePublisher {
    bus: Arc<dyn Publisher>,
}

impl ResponsePublisher {
    pub fn new(bus: Arc<dyn Publisher>) -> Self {
        Self { bus }
    }

    /// Publishes on the user's live channel, then caches the same payload
    /// under the per-conversation key. The cache write is attempted even when
    /// the publish failed.
    pub async fn deliver(&self, user_id: &str, payload: &ResponsePayload) -> Delivery {
        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(
                    conversation_id = %payload.conversation_id,
                    error = %err,
                    "failed to encode response payload"
                );
                return Delivery {
                    published: false,
                    cached: false,
                };
            }
        };

        let channel = keys::response_channel(user_id);
        let published = match self.bus.publish(&channel, &body).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(
                    channel = %channel,
                    conversation_id = %payload.conversation_id,
                    error = %err,
                    "failed to publish response"
                );
                false
            }
        };

        let key = keys::response_cache_key(user_id, &payload.conversation_id);
        let cached = match self
            .bus
            .set_with_ttl(&key, &body, keys::RESPONSE_TTL_SECONDS)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(
                    key = %key,
                    conversation_id = %payload.conversation_id,
                    error = %err,
                    "failed to cache response"
                );
                false
            }
        };

        Delivery { published, cached }
    }

    /// Sets the per-file completion marker with its fixed expiry.
    pub async fn mark_file_processed(
        &self,
        agent_id: &AgentId,
        file_name: &str,
    ) -> Result<(), BusError> {
        self.bus
            .set_with_ttl(
                &keys::file_status_key(agent_id, file_name),
                keys::FILE_PROCESSED_MARKER,
                keys::FILE_STATUS_TTL_SECONDS,
            )
            .await
    }
}
