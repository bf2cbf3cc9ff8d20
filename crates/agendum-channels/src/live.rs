//! Live in-app events — a broadcast fan-out to every connected observer.
//!
//! One hub is created at process start and shared by the dispatcher (sender)
//! and the gateway's WebSocket handler (subscribers). Broadcasting is
//! fire-and-forget: with no observers connected the event is simply dropped.

use agendum_core::types::ReminderNote;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An event pushed to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEvent {
    /// Event name, e.g. `appointment_reminder`.
    pub event: String,
    pub title: String,
    pub message: String,
}

impl LiveEvent {
    /// The in-app reminder event for an appointment inside the window.
    pub fn reminder(note: &ReminderNote) -> Self {
        Self {
            event: "appointment_reminder".into(),
            title: note.title.clone(),
            message: "Your appointment starts in less than 15 minutes.".into(),
        }
    }
}

/// Broadcast hub handle. Cheap to clone; all clones share one channel.
#[derive(Clone)]
pub struct LiveEventHub {
    tx: broadcast::Sender<LiveEvent>,
}

impl LiveEventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all current observers. Returns how many received it.
    pub fn broadcast(&self, event: LiveEvent) -> usize {
        // send() only errors when there are no receivers — that is fine here
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe a new observer (one per WebSocket connection).
    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }
}

impl Default for LiveEventHub {
    fn default() -> Self {
        Self::new(64)
    }
}
