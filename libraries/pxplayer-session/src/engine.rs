//! Playback engine capability interface
//!
//! The session never decodes audio itself. A platform supplies an
//! [`EngineFactory`]; every load that needs a fresh engine gets a new
//! instance together with an [`EngineEventSender`] it uses to report
//! lifecycle transitions back to the session.

use crate::error::Result;
use crate::types::MediaDescriptor;
use std::time::Duration;
use tokio::sync::mpsc;

/// Lifecycle transitions reported by an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine ran out of data and is loading
    Buffering,

    /// Enough data is available to play
    Ready,

    /// End of media reached
    Ended,

    /// Unrecoverable engine error
    Error(String),
}

/// Engine event tagged with the instance that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineMessage {
    pub generation: u64,
    pub event: EngineEvent,
}

/// Sending half handed to each engine instance
///
/// Events are tagged with the instance generation so that late events from
/// a released engine can be told apart from the live one.
#[derive(Debug, Clone)]
pub struct EngineEventSender {
    generation: u64,
    tx: mpsc::UnboundedSender<EngineMessage>,
}

impl EngineEventSender {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<EngineMessage>) -> Self {
        Self { generation, tx }
    }

    /// Generation of the engine this sender belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report an event; returns `false` once the session is gone
    pub fn send(&self, event: EngineEvent) -> bool {
        self.tx
            .send(EngineMessage {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Platform playback engine
///
/// One instance plays one source at a time. After [`PlaybackEngine::release`]
/// the instance is dropped and never reused.
pub trait PlaybackEngine: Send {
    /// Bind the engine to a source and start loading it
    fn load(&mut self, media: &MediaDescriptor) -> Result<()>;

    /// Play as soon as enough data is available (`false` = hold paused)
    fn set_play_when_ready(&mut self, play_when_ready: bool);

    /// Reposition within the loaded source
    fn seek(&mut self, position: Duration);

    /// Halt playback and free every resource held by the instance
    fn release(&mut self);

    /// Current content position
    fn position(&self) -> Duration;

    /// Position up to which data has been buffered
    fn buffered_position(&self) -> Duration;
}

/// Creates engine instances on demand
pub trait EngineFactory: Send {
    fn create(&mut self, events: EngineEventSender) -> Result<Box<dyn PlaybackEngine>>;
}

impl<F> EngineFactory for F
where
    F: FnMut(EngineEventSender) -> Result<Box<dyn PlaybackEngine>> + Send,
{
    fn create(&mut self, events: EngineEventSender) -> Result<Box<dyn PlaybackEngine>> {
        self(events)
    }
}

/// Engine that records calls, for unit tests
#[cfg(test)]
pub(crate) mod dummy {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Load(String),
        PlayWhenReady(bool),
        Seek(Duration),
        Release,
    }

    #[derive(Clone, Default)]
    pub struct Recorder {
        pub calls: Arc<Mutex<Vec<Call>>>,
        pub senders: Arc<Mutex<Vec<EngineEventSender>>>,
    }

    impl Recorder {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn last_sender(&self) -> EngineEventSender {
            self.senders.lock().unwrap().last().cloned().unwrap()
        }

        pub fn created(&self) -> usize {
            self.senders.lock().unwrap().len()
        }
    }

    pub struct DummyEngine {
        recorder: Recorder,
        position: Duration,
    }

    impl PlaybackEngine for DummyEngine {
        fn load(&mut self, media: &MediaDescriptor) -> Result<()> {
            self.recorder
                .calls
                .lock()
                .unwrap()
                .push(Call::Load(media.id.clone()));
            self.position = Duration::ZERO;
            Ok(())
        }

        fn set_play_when_ready(&mut self, play_when_ready: bool) {
            self.recorder
                .calls
                .lock()
                .unwrap()
                .push(Call::PlayWhenReady(play_when_ready));
        }

        fn seek(&mut self, position: Duration) {
            self.recorder.calls.lock().unwrap().push(Call::Seek(position));
            self.position = position;
        }

        fn release(&mut self) {
            self.recorder.calls.lock().unwrap().push(Call::Release);
        }

        fn position(&self) -> Duration {
            self.position
        }

        fn buffered_position(&self) -> Duration {
            self.position + Duration::from_secs(5)
        }
    }

    pub fn factory(recorder: &Recorder) -> impl EngineFactory {
        let recorder = recorder.clone();
        move |events: EngineEventSender| -> Result<Box<dyn PlaybackEngine>> {
            recorder.senders.lock().unwrap().push(events);
            Ok(Box::new(DummyEngine {
                recorder: recorder.clone(),
                position: Duration::ZERO,
            }))
        }
    }
}
