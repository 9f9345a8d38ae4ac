use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::bus::Subscription;
use crate::error::StartupError;
use crate::pipeline::EventHandler;
use crate::state::{LoopFlag, LoopHealth};

/// Runs one subscription loop: wait for a payload, hand it to the handler,
/// repeat. Events are processed strictly one after another. Returns only when
/// the subscription ends.
pub async fn run_loop(
    name: &'static str,
    mut subscription: Box<dyn Subscription>,
    handler: Arc<dyn EventHandler>,
    alive: LoopFlag,
) {
    alive.set(true);
    tracing::info!(subscription = name, "consumption loop started");

    while let Some(payload) = subscription.next_payload().await {
        handler.handle(&payload).await;
    }

    alive.set(false);
    tracing::error!(
        subscription = name,
        "subscription ended; consumption loop stopped"
    );
}

/// Owns the chat and file subscriptions and their pipelines until spawned.
pub struct Dispatcher {
    chat: Box<dyn Subscription>,
    messages: Arc<dyn EventHandler>,
    uploads: Box<dyn Subscription>,
    files: Arc<dyn EventHandler>,
    health: LoopHealth,
}

impl Dispatcher {
    pub fn new(
        chat: Box<dyn Subscription>,
        messages: Arc<dyn EventHandler>,
        uploads: Box<dyn Subscription>,
        files: Arc<dyn EventHandler>,
        health: LoopHealth,
    ) -> Self {
        Self {
            chat,
            messages,
            uploads,
            files,
            health,
        }
    }

    /// Starts both loops as independent tasks.
    pub fn spawn(self) -> DispatcherHandle {
        let chat = tokio::spawn(run_loop(
            "chat_messages",
            self.chat,
            self.messages,
            self.health.chat.clone(),
        ));
        let files = tokio::spawn(run_loop(
            "file_uploads",
            self.uploads,
            self.files,
            self.health.files.clone(),
        ));

        DispatcherHandle { chat, files }
    }
}

pub struct DispatcherHandle {
    chat: JoinHandle<()>,
    files: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Resolves as soon as either loop has stopped.
    pub async fn stopped(&mut self) {
        tokio::select! {
            _ = &mut self.chat => {}
            _ = &mut self.files => {}
        }
    }

    /// Stops both loops. An event in flight is abandoned at its current step.
    pub fn shutdown(self) {
        self.chat.abort();
        self.files.abort();
    }

    /// Waits for `shutdown` or for either loop to stop, then stops both.
    /// A stopped loop is reported as [`StartupError::LoopStopped`]; only a
    /// requested shutdown returns `Ok`.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()>,
    {
        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("shutdown signal received");
                Ok(())
            }
            _ = self.stopped() => {
                tracing::error!("a consumption loop stopped; shutting down");
                Err(StartupError::LoopStopped)
            }
        };

        self.shutdown();
        result
    }
}
