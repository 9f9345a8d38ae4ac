use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sqlx::PgPool;

/// Liveness flag of one subscription loop. Only the owning loop writes it.
#[derive(Clone, Debug, Default)]
pub struct LoopFlag(Arc<AtomicBool>);

impl LoopFlag {
    pub fn set(&self, alive: bool) {
        self.0.store(alive, Ordering::Relaxed);
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One flag per subscription loop.
#[derive(Clone, Debug, Default)]
pub struct LoopHealth {
    pub chat: LoopFlag,
    pub files: LoopFlag,
}

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub loops: LoopHealth,
}
