//! Engine adapter
//!
//! Wraps the live [`PlaybackEngine`] handle and turns engine calls and
//! engine lifecycle events into published [`PlaybackStatus`] values.
//!
//! A status is only published while an engine instance is alive, because
//! position and buffered position are read from it. After [`PlaybackEngineAdapter::stop`]
//! the instance is released and the next load creates a fresh one.

use crate::engine::{EngineEvent, EngineEventSender, EngineFactory, EngineMessage, PlaybackEngine};
use crate::error::Result;
use crate::events::{SessionEvent, SessionEvents};
use crate::types::{MediaDescriptor, PlaybackState, PlaybackStatus};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// What the session has to do after an engine event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome {
    /// Fully handled by the adapter
    Handled,

    /// End of media: advance to the next item and keep playing
    Completed,

    /// Engine failed; the session must stop playback
    Failed(String),

    /// Event came from a released engine and was dropped
    Stale,
}

/// Adapter between the session and the platform engine
pub struct PlaybackEngineAdapter {
    factory: Box<dyn EngineFactory>,
    engine: Option<Box<dyn PlaybackEngine>>,
    engine_tx: mpsc::UnboundedSender<EngineMessage>,
    generation: u64,

    /// Play/pause intent applied when the engine reports ready
    play_when_ready: bool,

    /// Buffered-position pushes are due (between play and stop)
    buffer_progress: bool,

    /// Last published status
    status: PlaybackStatus,

    events: SessionEvents,
}

impl PlaybackEngineAdapter {
    /// Create an adapter with no engine instance yet
    pub fn new(
        factory: Box<dyn EngineFactory>,
        engine_tx: mpsc::UnboundedSender<EngineMessage>,
        events: SessionEvents,
    ) -> Self {
        Self {
            factory,
            engine: None,
            engine_tx,
            generation: 0,
            play_when_ready: false,
            buffer_progress: false,
            status: PlaybackStatus::empty(),
            events,
        }
    }

    /// Last published status
    pub fn status(&self) -> &PlaybackStatus {
        &self.status
    }

    /// Generation of the most recently created engine
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether an engine instance is alive
    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Whether periodic buffered-position pushes are due
    pub fn buffer_progress_active(&self) -> bool {
        self.buffer_progress && self.engine.is_some()
    }

    // ===== Engine control =====

    /// Bind a fresh engine to `media` and start loading it
    ///
    /// With `autoplay` the engine plays as soon as it is ready; otherwise it
    /// holds paused. A load failure releases the new instance.
    pub fn load_and_play(&mut self, media: &MediaDescriptor, autoplay: bool) -> Result<()> {
        self.release_engine();

        self.generation += 1;
        let sender = EngineEventSender::new(self.generation, self.engine_tx.clone());
        let mut engine = self.factory.create(sender)?;

        if let Err(e) = engine.load(media) {
            engine.release();
            return Err(e);
        }

        debug!(media_id = %media.id, autoplay, generation = self.generation, "Engine loaded");
        self.engine = Some(engine);

        if autoplay {
            self.play();
        } else {
            self.pause();
        }
        Ok(())
    }

    /// Resume (or start) playback on the live engine
    pub fn play(&mut self) {
        self.play_when_ready = true;
        if let Some(engine) = self.engine.as_mut() {
            engine.set_play_when_ready(true);
            self.buffer_progress = true;
        }
        self.publish(PlaybackState::Playing);
    }

    /// Pause the live engine
    pub fn pause(&mut self) {
        self.play_when_ready = false;
        if let Some(engine) = self.engine.as_mut() {
            engine.set_play_when_ready(false);
        }
        self.publish(PlaybackState::Paused);
    }

    /// Publish the skip-forward transition
    pub fn skip_to_next(&mut self) {
        self.publish(PlaybackState::SkippingToNext);
    }

    /// Publish the skip-backward transition
    pub fn skip_to_previous(&mut self) {
        self.publish(PlaybackState::SkippingToPrevious);
    }

    /// Reposition the engine
    pub fn seek(&mut self, position: Duration, resume_playing: bool) {
        if let Some(engine) = self.engine.as_mut() {
            engine.seek(position);
        }
        if resume_playing {
            self.publish(PlaybackState::Playing);
        } else {
            self.publish(PlaybackState::Paused);
        }
    }

    /// Halt playback and release the engine
    pub fn stop(&mut self) {
        self.buffer_progress = false;
        self.pause();
        self.publish(PlaybackState::Stopped);
        self.release_engine();
    }

    /// Stop after an engine failure
    ///
    /// A failed load leaves no engine to read positions from, so the
    /// `Stopped` status is published with zeroed positions.
    pub fn stop_after_failure(&mut self) {
        if self.engine.is_some() {
            self.stop();
            return;
        }

        self.buffer_progress = false;
        self.play_when_ready = false;
        self.status = PlaybackStatus::new(PlaybackState::Stopped, Duration::ZERO, Duration::ZERO);
        debug!("Publishing stopped state without engine");
        self.events
            .publish(SessionEvent::PlaybackStateChanged(self.status.clone()));
    }

    /// Buffered position to push, if pushes are due
    pub fn buffered_position(&self) -> Option<Duration> {
        if !self.buffer_progress {
            return None;
        }
        self.engine.as_ref().map(|engine| engine.buffered_position())
    }

    // ===== Engine events =====

    /// Translate an engine event into a published state
    pub fn on_engine_event(&mut self, message: EngineMessage) -> EngineOutcome {
        if self.engine.is_none() || message.generation != self.generation {
            debug!(
                generation = message.generation,
                live = self.generation,
                event = ?message.event,
                "Dropping event from released engine"
            );
            return EngineOutcome::Stale;
        }

        match message.event {
            EngineEvent::Buffering => {
                self.publish(PlaybackState::Buffering);
                EngineOutcome::Handled
            }
            EngineEvent::Ready => {
                if self.play_when_ready {
                    self.play();
                } else {
                    self.pause();
                }
                EngineOutcome::Handled
            }
            EngineEvent::Ended => {
                self.publish(PlaybackState::Paused);
                EngineOutcome::Completed
            }
            EngineEvent::Error(message) => {
                error!(error = %message, "Playback engine failed");
                EngineOutcome::Failed(message)
            }
        }
    }

    fn release_engine(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.release();
            debug!(generation = self.generation, "Engine released");
        }
    }

    fn publish(&mut self, state: PlaybackState) {
        let Some(engine) = self.engine.as_ref() else {
            debug!(?state, "No engine instance, state not published");
            return;
        };

        self.status = PlaybackStatus::new(state, engine.position(), engine.buffered_position());
        debug!(?state, position = ?self.status.position, "Publishing playback state");
        self.events
            .publish(SessionEvent::PlaybackStateChanged(self.status.clone()));
    }
}

impl Drop for PlaybackEngineAdapter {
    fn drop(&mut self) {
        self.release_engine();
    }
}
