//! Observer-side session mirror
//!
//! [`SessionClient`] keeps a local copy of the session state, one `watch`
//! channel per field, fed only by the session's event stream. While the
//! mirrored state is `Playing` a poller extrapolates the position at the
//! configured cadence.

use crate::catalog::MediaItem;
use crate::command::{CommandCallback, TransportCommand};
use crate::error::{Result, SessionError};
use crate::events::SessionEvent;
use crate::service::SessionHandle;
use crate::types::{MediaDescriptor, PlaybackState, PlaybackStatus};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Aborts the wrapped task when dropped
#[derive(Debug)]
struct TaskGuard(JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Mirrored fields, written only from the event stream
#[derive(Debug)]
struct Mirror {
    connected: watch::Sender<bool>,
    now_playing: watch::Sender<Option<MediaDescriptor>>,
    playback_state: watch::Sender<PlaybackStatus>,
    position: watch::Sender<Duration>,
    buffered_position: watch::Sender<Duration>,
    loading: watch::Sender<bool>,
    polling: watch::Sender<bool>,
}

impl Mirror {
    fn new() -> Self {
        Self {
            connected: watch::channel(false).0,
            now_playing: watch::channel(None).0,
            playback_state: watch::channel(PlaybackStatus::empty()).0,
            position: watch::channel(Duration::ZERO).0,
            buffered_position: watch::channel(Duration::ZERO).0,
            loading: watch::channel(false).0,
            polling: watch::channel(false).0,
        }
    }

    fn apply_status(&self, status: &PlaybackStatus) {
        self.loading.send_replace(status.is_buffering());
        self.buffered_position.send_replace(status.buffered_position);
        let position = if status.state == PlaybackState::Stopped {
            Duration::ZERO
        } else {
            status.position
        };
        self.position.send_replace(position);
        self.playback_state.send_replace(status.clone());
    }
}

struct Connection {
    handle: SessionHandle,
    root_id: &'static str,

    /// Dropped with the connection; controls handed out for it go stale
    live: watch::Sender<bool>,
    _listener: TaskGuard,
}

/// Client mirror of a playback session
pub struct SessionClient {
    name: String,
    poll_interval: Duration,
    mirror: Arc<Mirror>,
    connection: Option<Connection>,
}

impl SessionClient {
    /// Create a disconnected client identified by `name`
    pub fn new(name: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            name: name.into(),
            poll_interval,
            mirror: Arc::new(Mirror::new()),
            connection: None,
        }
    }

    /// Connect to a session and start mirroring it
    ///
    /// An existing connection is dropped first.
    pub async fn connect(&mut self, handle: SessionHandle) -> Result<()> {
        self.disconnect();

        let connection = handle.connect(&self.name).await?;
        let snapshot = connection.snapshot;

        self.mirror.now_playing.send_replace(snapshot.now_playing);
        self.mirror.apply_status(&snapshot.status);

        self.mirror.connected.send_replace(true);
        let listener = tokio::spawn(listen(
            connection.events,
            self.mirror.clone(),
            self.poll_interval,
            snapshot.status.is_playing(),
        ));
        info!(client = %self.name, root_id = connection.root_id, "Connected to session");

        self.connection = Some(Connection {
            handle,
            root_id: connection.root_id,
            live: watch::channel(true).0,
            _listener: TaskGuard(listener),
        });
        Ok(())
    }

    /// Stop mirroring; accepted bus work keeps running in the session
    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            info!(client = %self.name, "Disconnected from session");
        }
        self.mirror.polling.send_replace(false);
        self.mirror.connected.send_replace(false);
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some() && *self.mirror.connected.borrow()
    }

    /// Browse root assigned at connect time
    pub fn root_id(&self) -> Option<&'static str> {
        self.connection.as_ref().map(|connection| connection.root_id)
    }

    /// Entries under the browse root; empty while disconnected
    pub fn children(&self) -> Vec<MediaItem> {
        match self.live_connection() {
            Some(connection) => connection.handle.children(connection.root_id),
            None => Vec::new(),
        }
    }

    /// Transport controls, only while connected
    pub fn transport_controls(&self) -> Option<TransportControls> {
        self.live_connection().map(|connection| TransportControls {
            handle: connection.handle.clone(),
            live: connection.live.subscribe(),
            connected: self.mirror.connected.subscribe(),
        })
    }

    /// Send a named command
    ///
    /// Returns `Ok(false)` when the command was dropped because no session
    /// is connected. Invalid commands are still reported as errors.
    pub fn send_command(
        &self,
        name: &str,
        params: &Value,
        callback: Option<CommandCallback>,
    ) -> Result<bool> {
        let Some(connection) = self.live_connection() else {
            debug!(command = name, "Dropping command, not connected");
            return Ok(false);
        };
        match connection.handle.send_command(name, params, callback) {
            Ok(()) => Ok(true),
            Err(SessionError::SessionClosed) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ===== Mirrored fields =====

    pub fn connected(&self) -> watch::Receiver<bool> {
        self.mirror.connected.subscribe()
    }

    pub fn now_playing(&self) -> watch::Receiver<Option<MediaDescriptor>> {
        self.mirror.now_playing.subscribe()
    }

    pub fn playback_state(&self) -> watch::Receiver<PlaybackStatus> {
        self.mirror.playback_state.subscribe()
    }

    pub fn position(&self) -> watch::Receiver<Duration> {
        self.mirror.position.subscribe()
    }

    pub fn buffered_position(&self) -> watch::Receiver<Duration> {
        self.mirror.buffered_position.subscribe()
    }

    pub fn loading(&self) -> watch::Receiver<bool> {
        self.mirror.loading.subscribe()
    }

    /// Whether the position poller is running
    pub fn is_polling(&self) -> bool {
        *self.mirror.polling.borrow()
    }

    fn live_connection(&self) -> Option<&Connection> {
        if *self.mirror.connected.borrow() {
            self.connection.as_ref()
        } else {
            None
        }
    }
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("name", &self.name)
            .field("connected", &self.is_connected())
            .field("root_id", &self.root_id())
            .finish()
    }
}

/// Transport commands bound to a connected session
///
/// Commands issued after the client disconnected, reconnected elsewhere or
/// saw the session go away are dropped with [`SessionError::NotConnected`].
#[derive(Debug, Clone)]
pub struct TransportControls {
    handle: SessionHandle,
    live: watch::Receiver<bool>,
    connected: watch::Receiver<bool>,
}

impl TransportControls {
    /// Whether commands still reach the session
    pub fn is_connected(&self) -> bool {
        self.live.has_changed().is_ok() && *self.connected.borrow()
    }

    pub fn prepare(&self) -> Result<()> {
        self.send(TransportCommand::Prepare)
    }

    pub fn play(&self) -> Result<()> {
        self.send(TransportCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(TransportCommand::Pause)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(TransportCommand::Stop)
    }

    pub fn skip_to_next(&self) -> Result<()> {
        self.send(TransportCommand::SkipToNext)
    }

    pub fn skip_to_previous(&self) -> Result<()> {
        self.send(TransportCommand::SkipToPrevious)
    }

    pub fn seek_to(&self, position_ms: i64) -> Result<()> {
        self.send(TransportCommand::SeekTo(position_ms))
    }

    pub fn add_queue_item(&self, media: MediaDescriptor) -> Result<()> {
        self.send(TransportCommand::AddQueueItem(media))
    }

    fn send(&self, command: TransportCommand) -> Result<()> {
        if !self.is_connected() {
            debug!(command = command.name(), "Dropping transport command, not connected");
            return Err(SessionError::NotConnected);
        }
        self.handle.send_transport(command)
    }
}

/// Event listener task: the only writer of the mirror while connected
async fn listen(
    mut events: broadcast::Receiver<SessionEvent>,
    mirror: Arc<Mirror>,
    poll_interval: Duration,
    playing: bool,
) {
    let mut poller = playing.then(|| start_poller(mirror.clone(), poll_interval));

    loop {
        match events.recv().await {
            Ok(SessionEvent::PlaybackStateChanged(status)) => {
                debug!(state = ?status.state, "Mirroring playback state");
                let playing = status.is_playing();
                mirror.apply_status(&status);
                if playing {
                    if poller.is_none() {
                        poller = Some(start_poller(mirror.clone(), poll_interval));
                    }
                } else if poller.take().is_some() {
                    mirror.polling.send_replace(false);
                }
            }
            Ok(SessionEvent::MetadataChanged(media)) => {
                mirror.now_playing.send_replace(media);
            }
            Ok(SessionEvent::QueueChanged(items)) => {
                debug!(len = items.len(), "Queue changed");
            }
            Ok(SessionEvent::BufferProgress(buffered)) => {
                mirror.buffered_position.send_replace(buffered);
            }
            Ok(SessionEvent::ActiveChanged(active)) => {
                debug!(active, "Session activation changed");
            }
            Ok(SessionEvent::Error { message }) => {
                warn!(error = %message, "Session reported an error");
            }
            Ok(SessionEvent::SessionDestroyed) => {
                info!("Session destroyed");
                break;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Client fell behind session events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    drop(poller);
    mirror.polling.send_replace(false);
    mirror.connected.send_replace(false);
}

fn start_poller(mirror: Arc<Mirror>, poll_interval: Duration) -> TaskGuard {
    mirror.polling.send_replace(true);
    TaskGuard(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let position = mirror.playback_state.borrow().current_position(Instant::now());
            mirror.position.send_replace(position);
        }
    }))
}
