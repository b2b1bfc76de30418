//! Audit events emitted by the blocking engine.
//!
//! Events are fire-and-forget from the engine's perspective: a failing
//! handler is logged and skipped, and must never fail the blocking decision
//! that produced the event.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::block::BlockDuration;
use crate::error::EventError;

/// Events describing state changes in the blocking engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A key was blocked, or an existing active block was escalated.
    IpBlocked {
        key: String,
        duration: BlockDuration,
        reason: String,
        source: String,
        /// True when an already-active block was re-applied.
        escalation: bool,
        timestamp: DateTime<Utc>,
    },

    /// An active block was explicitly removed.
    IpUnblocked {
        key: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// All active blocks were removed at once (emergency unblock).
    AllBlocksRemoved {
        count: u64,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The sweeper re-labelled time-expired active blocks.
    ExpiredBlocksSwept {
        count: u64,
        timestamp: DateTime<Utc>,
    },

    /// A failed login attempt was recorded for a key.
    LoginFailed {
        key: String,
        /// Failed attempts in the current tracking window, this one included.
        attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// A successful login cleared the key's attempt counter.
    LoginSucceeded {
        key: String,
        timestamp: DateTime<Utc>,
    },
}

/// A sink for [`Event`]s, registered with the [`EventBus`].
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError>;
}

/// Fan-out bus dispatching events to registered handlers.
///
/// `emit` delivers the event to every handler even if some fail, and
/// returns the first failure. Callers in the engine log that failure and
/// move on.
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    pub async fn emit(&self, event: &Event) -> Result<(), EventError> {
        let mut first_error = None;
        for handler in self.handlers.read().await.iter() {
            if let Err(e) = handler.handle_event(event).await {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
