//! Shared application state for request handlers.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::health::Registry;
use crate::ping::{EnvSource, PingJson, ProcessEnv};

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// The registry sits behind a read-write lock: it is not internally
/// synchronized. Loading and reset take the write lock; runs share the read
/// lock, so concurrent health requests do not queue behind a slow upstream.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RwLock<Registry>>,
    pub ping: Option<Arc<PingJson>>,
    pub env: Arc<dyn EnvSource>,
}

impl AppState {
    /// Creates state reading build metadata from the process environment.
    pub fn new(registry: Registry, ping: Option<PingJson>) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            ping: ping.map(Arc::new),
            env: Arc::new(ProcessEnv),
        }
    }

    /// Replaces the source build metadata is read from.
    pub fn with_env<E: EnvSource + 'static>(mut self, env: E) -> Self {
        self.env = Arc::new(env);
        self
    }
}
