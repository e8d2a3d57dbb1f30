//! Shared helpers for integration tests

#![allow(dead_code)]

use pxplayer_session::{
    DownloadStatus, DurationProbe, EngineEventSender, EngineFactory, EngineMessage,
    MediaDescriptor, MediaLibrary, NowPlayingNotification, PlaybackEngine,
    PlaybackEngineAdapter, PresentationHost, Result, SessionConfig, SessionError, SessionEvent,
    SessionEvents, SessionHandle, SessionService, SessionStateMachine,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

// ===== Media =====

pub fn media(id: &str, duration_ms: u64) -> MediaDescriptor {
    MediaDescriptor {
        id: id.to_string(),
        title: format!("Title {}", id),
        artist: "Test Artist".to_string(),
        art_uri: None,
        media_uri: format!("https://media.example.com/{}.mp3", id),
        duration: Duration::from_millis(duration_ms),
        download_status: DownloadStatus::NotDownloaded,
    }
}

pub fn media_json(id: &str, duration_ms: Option<u64>) -> Value {
    let mut value = json!({
        "id": id,
        "media_uri": format!("https://media.example.com/{}.mp3", id),
        "title": format!("Title {}", id),
        "artist": "Test Artist",
    });
    if let Some(duration_ms) = duration_ms {
        value["duration_ms"] = json!(duration_ms);
    }
    value
}

// ===== Fake engine =====

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Load(String),
    PlayWhenReady(bool),
    Seek(Duration),
    Release,
}

/// Shared record of every engine created by a factory
#[derive(Clone, Default)]
pub struct EngineLog {
    calls: Arc<Mutex<Vec<EngineCall>>>,
    senders: Arc<Mutex<Vec<EngineEventSender>>>,
    fail_loads: Arc<Mutex<bool>>,
}

impl EngineLog {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn loads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Load(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn created(&self) -> usize {
        self.senders.lock().unwrap().len()
    }

    /// Event sender of the most recently created engine
    pub fn last_sender(&self) -> EngineEventSender {
        self.senders.lock().unwrap().last().cloned().unwrap()
    }

    pub fn fail_loads(&self, fail: bool) {
        *self.fail_loads.lock().unwrap() = fail;
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

struct FakeEngine {
    log: EngineLog,
    position: Duration,
}

impl PlaybackEngine for FakeEngine {
    fn load(&mut self, media: &MediaDescriptor) -> Result<()> {
        if *self.log.fail_loads.lock().unwrap() {
            return Err(SessionError::Engine(format!("cannot open {}", media.media_uri)));
        }
        self.log.record(EngineCall::Load(media.id.clone()));
        self.position = Duration::ZERO;
        Ok(())
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        self.log.record(EngineCall::PlayWhenReady(play_when_ready));
    }

    fn seek(&mut self, position: Duration) {
        self.log.record(EngineCall::Seek(position));
        self.position = position;
    }

    fn release(&mut self) {
        self.log.record(EngineCall::Release);
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn buffered_position(&self) -> Duration {
        self.position + Duration::from_secs(10)
    }
}

pub fn engine_factory(log: &EngineLog) -> Box<dyn EngineFactory> {
    let log = log.clone();
    Box::new(move |events: EngineEventSender| -> Result<Box<dyn PlaybackEngine>> {
        log.senders.lock().unwrap().push(events);
        Ok(Box::new(FakeEngine {
            log: log.clone(),
            position: Duration::ZERO,
        }))
    })
}

// ===== State machine harness =====

pub struct Harness {
    pub machine: SessionStateMachine,
    pub library: Arc<MediaLibrary>,
    pub events: broadcast::Receiver<SessionEvent>,
    pub engine_rx: mpsc::UnboundedReceiver<EngineMessage>,
    pub log: EngineLog,
}

impl Harness {
    pub fn new() -> Self {
        let log = EngineLog::default();
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let bus = SessionEvents::new(256);
        let events = bus.subscribe();
        let library = Arc::new(MediaLibrary::new());
        let adapter = PlaybackEngineAdapter::new(engine_factory(&log), engine_tx, bus.clone());
        let machine = SessionStateMachine::new(adapter, library.clone(), bus);
        Self {
            machine,
            library,
            events,
            engine_rx,
            log,
        }
    }

    pub fn with_media(items: &[(&str, u64)]) -> Self {
        let mut harness = Self::new();
        harness.machine.enqueue(
            items
                .iter()
                .map(|(id, duration_ms)| media(id, *duration_ms))
                .collect(),
        );
        harness.drain_events();
        harness
    }

    /// Deliver every pending engine event to the machine
    pub fn pump_engine(&mut self) {
        while let Ok(message) = self.engine_rx.try_recv() {
            self.machine.handle_engine_event(message);
        }
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn published_states(&mut self) -> Vec<pxplayer_session::PlaybackState> {
        self.drain_events()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::PlaybackStateChanged(status) => Some(status.state),
                _ => None,
            })
            .collect()
    }
}

// ===== Running session =====

/// Probe that answers every source with `duration`
pub fn fixed_probe(duration: Duration) -> Arc<dyn DurationProbe> {
    Arc::new(move |_uri: &str| -> Result<Option<Duration>> { Ok(Some(duration)) })
}

pub fn start_session(log: &EngineLog, probe: Arc<dyn DurationProbe>) -> (SessionHandle, Arc<MediaLibrary>) {
    start_session_with(SessionConfig::default(), log, probe)
}

pub fn start_session_with(
    config: SessionConfig,
    log: &EngineLog,
    probe: Arc<dyn DurationProbe>,
) -> (SessionHandle, Arc<MediaLibrary>) {
    let library = Arc::new(MediaLibrary::new());
    let handle = SessionService::start(config, engine_factory(log), library.clone(), probe);
    (handle, library)
}

/// Wait for the first event matching `predicate`
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<SessionEvent>,
    mut predicate: F,
) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}

// ===== Presentation host =====

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    RegisterNoisy,
    UnregisterNoisy,
    Post(String),
    StartForeground,
    StopForeground(bool),
    StopHost,
}

#[derive(Clone, Default)]
pub struct RecordingHost {
    pub calls: Arc<Mutex<Vec<HostCall>>>,
}

impl RecordingHost {
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl PresentationHost for RecordingHost {
    fn register_noisy_receiver(&mut self) {
        self.calls.lock().unwrap().push(HostCall::RegisterNoisy);
    }

    fn unregister_noisy_receiver(&mut self) {
        self.calls.lock().unwrap().push(HostCall::UnregisterNoisy);
    }

    fn post_notification(&mut self, notification: &NowPlayingNotification) {
        self.calls
            .lock()
            .unwrap()
            .push(HostCall::Post(notification.title.clone()));
    }

    fn start_foreground(&mut self, _notification: &NowPlayingNotification) {
        self.calls.lock().unwrap().push(HostCall::StartForeground);
    }

    fn stop_foreground(&mut self, remove_notification: bool) {
        self.calls
            .lock()
            .unwrap()
            .push(HostCall::StopForeground(remove_notification));
    }

    fn stop_host(&mut self) {
        self.calls.lock().unwrap().push(HostCall::StopHost);
    }
}
