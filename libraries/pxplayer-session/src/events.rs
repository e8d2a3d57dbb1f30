//! Session events
//!
//! The session is the only publisher. Observers (client mirrors, the
//! presentation coordinator) subscribe and receive:
//! - Playback state changes (every published status)
//! - Now-playing metadata changes (after each prepare)
//! - Queue changes
//! - Buffered position pushes (periodic while the engine is active)
//! - Session activation and teardown

use crate::types::{MediaDescriptor, PlaybackStatus, QueueItem};
use std::time::Duration;
use tokio::sync::broadcast;

/// Events emitted by the session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A new playback status was published
    PlaybackStateChanged(PlaybackStatus),

    /// Now-playing media changed (`None` = nothing playing)
    MetadataChanged(Option<MediaDescriptor>),

    /// Queue contents changed
    QueueChanged(Vec<QueueItem>),

    /// Periodic buffered-position update
    BufferProgress(Duration),

    /// Session activation flag flipped
    ActiveChanged(bool),

    /// Engine reported an error
    Error {
        /// Diagnostic message
        message: String,
    },

    /// Session shut down; no more events follow
    SessionDestroyed,
}

/// Publisher side of the session event bus
#[derive(Debug, Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    /// Create a bus holding up to `capacity` undelivered events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to every subscriber
    pub fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
