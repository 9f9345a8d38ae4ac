use async_trait::async_trait;

pub mod file;
pub mod message;

pub use file::FilePipeline;
pub use message::MessagePipeline;

/// Consumer of one subscription's payloads. Implementations report every
/// failure themselves; nothing propagates back into the loop.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, payload: &str);
}
