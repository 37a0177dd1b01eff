//! Event system for lifecycle operations
//!
//! Every successful mutation emits a [`LedgerEvent`]. Listeners use them for
//! audit logging; a broken compensation also surfaces here as
//! [`LedgerEvent::ContentOrphaned`] so an operator can clean up.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::model::{AchievementType, Role};

/// Events emitted by the services
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LedgerEvent {
    // Achievement events
    AchievementCreated {
        id: String,
        student_id: String,
        achievement_type: AchievementType,
        title: String,
    },
    AchievementUpdated {
        id: String,
    },
    AttachmentAdded {
        id: String,
        file_name: String,
    },
    AchievementDeleted {
        id: String,
    },

    // Review events
    AchievementSubmitted {
        id: String,
        student_id: String,
    },
    AchievementVerified {
        id: String,
        verified_by: String,
    },
    AchievementRejected {
        id: String,
        verified_by: String,
        note: String,
    },

    // Roster events
    AdvisorAssigned {
        student_id: String,
        lecturer_id: String,
        by: String,
        by_role: Role,
    },

    /// Content written without a reference, compensation failed
    ContentOrphaned {
        content_ref: String,
        student_id: String,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &LedgerEvent);
}

/// Event bus for broadcasting ledger events
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: LedgerEvent) {
        trace!(event = ?event, "Emitting ledger event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::AchievementCreated { id, student_id, title, .. } => {
                info!(id = %id, student_id = %student_id, title = %title, "Achievement created");
            }
            LedgerEvent::AchievementSubmitted { id, student_id } => {
                info!(id = %id, student_id = %student_id, "Achievement submitted");
            }
            LedgerEvent::AchievementVerified { id, verified_by } => {
                info!(id = %id, verified_by = %verified_by, "Achievement verified");
            }
            LedgerEvent::AchievementRejected { id, verified_by, .. } => {
                info!(id = %id, verified_by = %verified_by, "Achievement rejected");
            }
            LedgerEvent::ContentOrphaned { content_ref, student_id } => {
                warn!(content_ref = %content_ref, student_id = %student_id, "Orphaned content document");
            }
            _ => {
                debug!(event = ?event, "Ledger event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}
