//! Bus channel and cache key naming shared by the worker and its readers.

use crate::events::AgentId;

/// Channel carrying inbound chat events
pub const CHAT_CHANNEL: &str = "chat_messages";
/// Channel carrying inbound file uploads
pub const FILE_CHANNEL: &str = "file_uploads";

/// Lifetime of a cached response and of a file status marker.
pub const RESPONSE_TTL_SECONDS: u64 = 300;
pub const FILE_STATUS_TTL_SECONDS: u64 = 300;

/// Value stored under a file status key once ingestion completed.
pub const FILE_PROCESSED_MARKER: &str = "processed";

pub fn response_channel(user_id: &str) -> String {
    format!("user:{user_id}:responses")
}

pub fn response_cache_key(user_id: &str, conversation_id: &str) -> String {
    format!("user:{user_id}:responses:{conversation_id}")
}

pub fn file_status_key(agent_id: &AgentId, file_name: &str) -> String {
    format!("file_processed:{agent_id}:{file_name}")
}
