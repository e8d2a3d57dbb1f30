//! Session state machine - core orchestration
//!
//! Owns the playback queue and the prepared media, drives the engine
//! adapter and publishes queue, metadata and activation changes.
//!
//! Every method runs on the serialized session context. Composite
//! transitions (prepare then play, skip then prepare or play) are spelled
//! out step by step instead of re-entering the public commands.

use crate::adapter::{EngineOutcome, PlaybackEngineAdapter};
use crate::catalog::MediaCatalog;
use crate::engine::EngineMessage;
use crate::error::Result;
use crate::events::{SessionEvent, SessionEvents};
use crate::queue::PlaybackQueue;
use crate::types::{MediaDescriptor, PlaybackState, PlaybackStatus, QueueItem};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Relative jump of the remote seek-forward action
pub const SEEK_FORWARD_STEP: Duration = Duration::from_secs(30);

/// Relative jump of the remote seek-backward action
pub const SEEK_BACKWARD_STEP: Duration = Duration::from_secs(10);

/// Point-in-time view of the session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub status: PlaybackStatus,
    pub now_playing: Option<MediaDescriptor>,
    pub queue: Vec<QueueItem>,
    pub cursor: Option<usize>,
    pub active: bool,
}

/// Playback session state machine
pub struct SessionStateMachine {
    queue: PlaybackQueue,

    /// Media resolved for the cursor, cleared by stop and skips
    prepared: Option<MediaDescriptor>,

    /// Set by the first successful prepare, cleared by stop
    active: bool,

    adapter: PlaybackEngineAdapter,
    catalog: Arc<dyn MediaCatalog>,
    events: SessionEvents,
}

impl SessionStateMachine {
    pub fn new(
        adapter: PlaybackEngineAdapter,
        catalog: Arc<dyn MediaCatalog>,
        events: SessionEvents,
    ) -> Self {
        Self {
            queue: PlaybackQueue::new(),
            prepared: None,
            active: false,
            adapter,
            catalog,
            events,
        }
    }

    // ===== Queries =====

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    pub fn prepared(&self) -> Option<&MediaDescriptor> {
        self.prepared.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Last published playback status
    pub fn status(&self) -> &PlaybackStatus {
        self.adapter.status()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.adapter.status().clone(),
            now_playing: self.prepared.clone(),
            queue: self.queue.items().to_vec(),
            cursor: self.queue.current_index(),
            active: self.active,
        }
    }

    // ===== Transport =====

    /// Resolve the media under the cursor and publish it as now playing
    pub fn prepare(&mut self) {
        let Some(item) = self.queue.current_item() else {
            debug!("Nothing to prepare, queue is empty");
            return;
        };

        let media = match self.catalog.metadata(&item.description.id) {
            Some(media) => media,
            None => {
                debug!(media_id = %item.description.id, "Not in library, using queued descriptor");
                item.description.clone()
            }
        };

        debug!(media_id = %media.id, "Prepared media");
        self.prepared = Some(media.clone());
        self.events
            .publish(SessionEvent::MetadataChanged(Some(media)));
        self.set_active(true);
    }

    /// Start or resume playback of the current item
    pub fn play(&mut self) {
        if self.queue.is_empty() {
            debug!("Play ignored, queue is empty");
            return;
        }

        if self.prepared.is_none() {
            self.prepare();
        }
        let Some(media) = self.prepared.clone() else {
            warn!("Play ignored, nothing could be prepared");
            return;
        };

        if self.adapter.status().is_paused() && self.adapter.has_engine() {
            self.adapter.play();
        } else {
            self.load(&media, true);
        }
    }

    pub fn pause(&mut self) {
        self.adapter.pause();
    }

    /// Halt playback, release the engine and deactivate the session
    pub fn stop(&mut self) {
        self.adapter.stop();
        self.prepared = None;
        self.set_active(false);
    }

    pub fn skip_to_next(&mut self) {
        if self.queue.advance().is_none() {
            debug!("Skip ignored, queue is empty");
            return;
        }
        let was_playing = self.adapter.status().is_playing();
        self.prepared = None;
        self.adapter.skip_to_next();
        self.continue_after_skip(was_playing);
    }

    pub fn skip_to_previous(&mut self) {
        if self.queue.retreat().is_none() {
            debug!("Skip ignored, queue is empty");
            return;
        }
        let was_playing = self.adapter.status().is_playing();
        self.prepared = None;
        self.adapter.skip_to_previous();
        self.continue_after_skip(was_playing);
    }

    /// Seek within the prepared media
    ///
    /// A position past the end skips to the next item; a negative position
    /// seeks to the start.
    pub fn seek_to(&mut self, position_ms: i64) {
        let Some(media) = self.prepared.as_ref() else {
            debug!(position_ms, "Seek ignored, nothing prepared");
            return;
        };

        let duration_ms = i64::try_from(media.duration.as_millis()).unwrap_or(i64::MAX);
        if position_ms > duration_ms {
            debug!(position_ms, duration_ms, "Seek past end, skipping to next");
            self.skip_to_next();
            return;
        }

        let position = Duration::from_millis(u64::try_from(position_ms).unwrap_or(0));
        let resume_playing = self.adapter.status().is_playing();
        self.adapter.seek(position, resume_playing);
    }

    /// Seek relative to the extrapolated current position
    pub fn seek_relative(&mut self, forward: bool, step: Duration) {
        let current = self.adapter.status().current_position(Instant::now());
        let current_ms = i64::try_from(current.as_millis()).unwrap_or(i64::MAX);
        let step_ms = i64::try_from(step.as_millis()).unwrap_or(i64::MAX);
        let target = if forward {
            current_ms.saturating_add(step_ms)
        } else {
            current_ms.saturating_sub(step_ms)
        };
        self.seek_to(target);
    }

    /// Move the cursor to `index` and start that item from the beginning
    pub fn play_at(&mut self, index: usize) -> Result<()> {
        self.queue.set_cursor(index)?;
        info!(index, "Playing queue item");

        self.adapter.pause();
        self.prepared = None;
        self.prepare();
        if let Some(media) = self.prepared.clone() {
            self.load(&media, true);
        }
        Ok(())
    }

    /// Pause when the audio output is about to become noisy
    pub fn audio_becoming_noisy(&mut self) {
        let status = self.adapter.status();
        if status.is_playing() || status.is_buffering() {
            info!("Audio output becoming noisy, pausing");
            self.adapter.pause();
        }
    }

    // ===== Queue =====

    /// Append one descriptor
    pub fn add_queue_item(&mut self, media: MediaDescriptor) {
        self.enqueue(vec![media]);
    }

    /// Append descriptors in order and add them to the library
    pub fn enqueue(&mut self, items: Vec<MediaDescriptor>) {
        if items.is_empty() {
            return;
        }
        let count = items.len();
        for media in items {
            self.catalog.add_media(media.clone());
            self.queue.enqueue(media);
        }
        info!(count, queue_len = self.queue.len(), "Queued media");
        self.events
            .publish(SessionEvent::QueueChanged(self.queue.items().to_vec()));
    }

    // ===== Engine =====

    /// Dispatch one engine event
    pub fn handle_engine_event(&mut self, message: EngineMessage) {
        match self.adapter.on_engine_event(message) {
            EngineOutcome::Handled | EngineOutcome::Stale => {}
            EngineOutcome::Completed => {
                self.skip_to_next();
                self.play();
            }
            EngineOutcome::Failed(message) => self.fail(message),
        }
    }

    /// Whether periodic buffered-position pushes are due
    pub fn buffer_progress_active(&self) -> bool {
        self.adapter.buffer_progress_active()
    }

    /// Push the engine's buffered position to observers
    pub fn publish_buffer_progress(&self) {
        if let Some(buffered) = self.adapter.buffered_position() {
            self.events.publish(SessionEvent::BufferProgress(buffered));
        }
    }

    /// Tear the session down; observers receive [`SessionEvent::SessionDestroyed`]
    pub fn shutdown(&mut self) {
        if self.adapter.has_engine() {
            self.stop();
        } else {
            self.prepared = None;
            self.set_active(false);
        }
        info!("Session destroyed");
        self.events.publish(SessionEvent::SessionDestroyed);
    }

    // ===== Internal =====

    fn continue_after_skip(&mut self, was_playing: bool) {
        if was_playing {
            self.play();
            return;
        }
        self.prepare();
        if let Some(media) = self.prepared.clone() {
            self.load(&media, false);
        }
    }

    fn load(&mut self, media: &MediaDescriptor, autoplay: bool) {
        if let Err(e) = self.adapter.load_and_play(media, autoplay) {
            self.fail(e.to_string());
        }
    }

    fn fail(&mut self, message: String) {
        error!(error = %message, "Stopping playback after engine failure");
        self.events.publish(SessionEvent::Error { message });
        self.adapter.stop_after_failure();
        self.prepared = None;
        self.set_active(false);
    }

    fn set_active(&mut self, active: bool) {
        if self.active != active {
            self.active = active;
            self.events.publish(SessionEvent::ActiveChanged(active));
        }
    }
}

impl std::fmt::Debug for SessionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStateMachine")
            .field("queue_len", &self.queue.len())
            .field("cursor", &self.queue.current_index())
            .field("prepared", &self.prepared.as_ref().map(|m| &m.id))
            .field("active", &self.active)
            .field("state", &self.adapter.status().state)
            .finish()
    }
}
