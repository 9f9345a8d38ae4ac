//! In-memory stand-ins for every external collaborator, used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use relay_core::events::AgentId;
use relay_core::records::{AgentConfig, ContextRecord, TranscriptRecord};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

use crate::agent_config::AgentConfigSource;
use crate::bus::{Publisher, Subscription};
use crate::error::{BusError, ConfigError, ModelError, StoreError};
use crate::model::{ChatModel, CompletionRequest};
use crate::store::{ContextStore, TranscriptStore};

fn bus_down() -> BusError {
    BusError::Redis(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "connection dropped",
    )))
}

/// Redis stand-in. Expiry follows tokio's clock, so paused tests can advance it.
#[derive(Default)]
pub struct MemoryBus {
    published: Mutex<Vec<(String, String)>>,
    keys: Mutex<HashMap<String, (String, Instant)>>,
    fail_publish: AtomicBool,
    fail_set: AtomicBool,
}

impl MemoryBus {
    pub fn fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn fail_set(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_on(&self, channel: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, payload)| payload)
            .collect()
    }

    /// Live value of `key`; expired keys read as absent.
    pub fn get(&self, key: &str) -> Option<String> {
        let keys = self.keys.lock().unwrap();
        keys.get(key)
            .filter(|(_, expires_at)| Instant::now() < *expires_at)
            .map(|(value, _)| value.clone())
    }

    pub fn key_count(&self) -> usize {
        self.keys.lock().unwrap().len()
    }
}

#[async_trait]
impl Publisher for MemoryBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(bus_down());
        }
        self.published
            .lock()
            .unwrap()
            .push((channel.to_string(), payload.to_string()));
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), BusError> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(bus_down());
        }
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        self.keys
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }
}

/// Context and transcript tables in memory.
#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<Vec<ContextRecord>>,
    transcripts: Mutex<Vec<TranscriptRecord>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn context_records(&self) -> Vec<ContextRecord> {
        self.files.lock().unwrap().clone()
    }

    pub fn transcripts(&self) -> Vec<TranscriptRecord> {
        self.transcripts.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.files.lock().unwrap().len() + self.transcripts.lock().unwrap().len()
    }
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn load_context(&self, agent_id: &AgentId) -> Result<String, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let files = self.files.lock().unwrap();
        Ok(files
            .iter()
            .filter(|record| &record.agent_id == agent_id)
            .map(|record| record.content.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn append_context(&self, record: &ContextRecord) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        self.files.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[async_trait]
impl TranscriptStore for MemoryStore {
    async fn append_transcript(&self, record: &TranscriptRecord) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        self.transcripts.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Config service answering from a fixed table; unknown agents are not configured.
#[derive(Default)]
pub struct StaticConfigSource {
    configs: HashMap<AgentId, AgentConfig>,
    lookups: Mutex<Vec<AgentId>>,
}

impl StaticConfigSource {
    pub fn with(mut self, agent_id: impl Into<AgentId>, model: Option<&str>, prompt: &str) -> Self {
        self.configs.insert(
            agent_id.into(),
            AgentConfig {
                model: model.map(str::to_string),
                system_prompt: prompt.to_string(),
            },
        );
        self
    }

    pub fn lookups(&self) -> Vec<AgentId> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentConfigSource for StaticConfigSource {
    async fn fetch(&self, agent_id: &AgentId) -> Result<AgentConfig, ConfigError> {
        self.lookups.lock().unwrap().push(agent_id.clone());
        self.configs
            .get(agent_id)
            .cloned()
            .ok_or(ConfigError::NotConfigured)
    }
}

/// Model backend that records requests and answers with a fixed reply or error.
pub struct ScriptedModel {
    reply: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply.clone().ok_or(ModelError::Status {
            status: 503,
            body: "upstream unavailable".to_string(),
        })
    }
}

/// Subscription fed from an mpsc channel; ends when every sender is dropped.
pub struct ChannelSubscription {
    rx: mpsc::UnboundedReceiver<String>,
}

impl ChannelSubscription {
    pub fn new() -> (mpsc::UnboundedSender<String>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl Subscription for ChannelSubscription {
    async fn next_payload(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}
