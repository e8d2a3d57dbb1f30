//! Session service
//!
//! One tokio task owns the [`SessionStateMachine`] and processes commands
//! in arrival order. Engine events and buffer-progress ticks are folded
//! into the same loop, so every state mutation happens on this task.

use crate::adapter::PlaybackEngineAdapter;
use crate::bus::AsyncCommandBus;
use crate::catalog::{root_for, DurationProbe, MediaCatalog, MediaItem};
use crate::command::{failure, Command, CommandCallback, CommandStatus, CustomCommand, TransportCommand};
use crate::engine::{EngineFactory, EngineMessage};
use crate::error::{Result, SessionError};
use crate::events::{SessionEvent, SessionEvents};
use crate::machine::{SessionSnapshot, SessionStateMachine, SEEK_BACKWARD_STEP, SEEK_FORWARD_STEP};
use crate::types::{MediaDescriptor, SessionConfig};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Messages processed by the session loop
pub(crate) enum SessionMsg {
    Transport {
        command: TransportCommand,
        callback: Option<CommandCallback>,
    },
    Enqueue {
        items: Vec<MediaDescriptor>,
        callback: Option<CommandCallback>,
    },
    PlayAt {
        index: usize,
        callback: Option<CommandCallback>,
    },
    AudioNoisy,
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// What a client gets back when it connects
#[derive(Debug)]
pub struct SessionConnection {
    /// Browse root chosen for this client
    pub root_id: &'static str,

    /// Events published after the snapshot was taken
    pub events: broadcast::Receiver<SessionEvent>,

    /// Session state at connect time
    pub snapshot: SessionSnapshot,
}

/// Starts session tasks
pub struct SessionService;

impl SessionService {
    /// Spawn the session loop on the current runtime
    pub fn start(
        config: SessionConfig,
        factory: Box<dyn EngineFactory>,
        catalog: Arc<dyn MediaCatalog>,
        probe: Arc<dyn DurationProbe>,
    ) -> SessionHandle {
        let events = SessionEvents::new(config.event_capacity);
        let (tx, rx) = mpsc::unbounded_channel();
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();

        let adapter = PlaybackEngineAdapter::new(factory, engine_tx, events.clone());
        let machine = SessionStateMachine::new(adapter, catalog.clone(), events.clone());
        let bus = AsyncCommandBus::new(probe, &config, tx.clone());

        info!(
            poll_ms = config.position_poll_interval_ms,
            buffer_ms = config.buffer_progress_interval_ms,
            "Starting playback session"
        );
        tokio::spawn(run_session(
            machine,
            rx,
            engine_rx,
            config.buffer_progress_interval(),
        ));

        SessionHandle {
            tx,
            events,
            catalog,
            bus,
            config: Arc::new(config),
        }
    }
}

async fn run_session(
    mut machine: SessionStateMachine,
    mut rx: mpsc::UnboundedReceiver<SessionMsg>,
    mut engine_rx: mpsc::UnboundedReceiver<EngineMessage>,
    buffer_interval: Duration,
) {
    let mut buffer_ticker = tokio::time::interval(buffer_interval);
    buffer_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown_ack = None;

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(SessionMsg::Shutdown(done)) => {
                    machine.shutdown();
                    shutdown_ack = Some(done);
                    break;
                }
                Some(message) => handle_message(&mut machine, message),
                None => {
                    debug!("All session handles dropped");
                    machine.shutdown();
                    break;
                }
            },
            Some(message) = engine_rx.recv() => machine.handle_engine_event(message),
            _ = buffer_ticker.tick(), if machine.buffer_progress_active() => {
                machine.publish_buffer_progress();
            }
        }
    }

    // Refuse further commands, then fail whatever was already queued
    rx.close();
    while let Ok(message) = rx.try_recv() {
        reject(message);
    }
    info!("Playback session stopped");
    if let Some(done) = shutdown_ack {
        let _ = done.send(());
    }
}

fn reject(message: SessionMsg) {
    let closed = failure(&SessionError::SessionClosed);
    match message {
        SessionMsg::Transport { callback, .. }
        | SessionMsg::Enqueue { callback, .. }
        | SessionMsg::PlayAt { callback, .. } => complete(callback, CommandStatus::Failed, closed),
        SessionMsg::Shutdown(done) => {
            let _ = done.send(());
        }
        SessionMsg::AudioNoisy | SessionMsg::Snapshot(_) => {}
    }
}

fn handle_message(machine: &mut SessionStateMachine, message: SessionMsg) {
    match message {
        SessionMsg::Transport { command, callback } => {
            debug!(command = command.name(), "Transport command");
            apply_transport(machine, command);
            complete(callback, CommandStatus::Success, Value::Null);
        }
        SessionMsg::Enqueue { items, callback } => {
            machine.enqueue(items);
            complete(callback, CommandStatus::Success, Value::Null);
        }
        SessionMsg::PlayAt { index, callback } => match machine.play_at(index) {
            Ok(()) => complete(callback, CommandStatus::Success, Value::Null),
            Err(e) => {
                warn!(index, error = %e, "Cannot play queue item");
                complete(callback, CommandStatus::Failed, failure(&e));
            }
        },
        SessionMsg::AudioNoisy => machine.audio_becoming_noisy(),
        SessionMsg::Snapshot(reply) => {
            let _ = reply.send(machine.snapshot());
        }
        // Handled by the loop
        SessionMsg::Shutdown(_) => {}
    }
}

fn apply_transport(machine: &mut SessionStateMachine, command: TransportCommand) {
    match command {
        TransportCommand::Prepare => machine.prepare(),
        TransportCommand::Play => machine.play(),
        TransportCommand::Pause => machine.pause(),
        TransportCommand::Stop => machine.stop(),
        TransportCommand::SkipToNext => machine.skip_to_next(),
        TransportCommand::SkipToPrevious => machine.skip_to_previous(),
        TransportCommand::SeekTo(position_ms) => machine.seek_to(position_ms),
        TransportCommand::SeekForward => machine.seek_relative(true, SEEK_FORWARD_STEP),
        TransportCommand::SeekBackward => machine.seek_relative(false, SEEK_BACKWARD_STEP),
        TransportCommand::AddQueueItem(media) => machine.add_queue_item(media),
    }
}

fn complete(callback: Option<CommandCallback>, status: CommandStatus, result: Value) {
    if let Some(callback) = callback {
        callback(status, result);
    }
}

/// Cloneable handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionMsg>,
    events: SessionEvents,
    catalog: Arc<dyn MediaCatalog>,
    bus: AsyncCommandBus,
    config: Arc<SessionConfig>,
}

impl SessionHandle {
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether the session loop has exited
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Send a transport command without waiting for it
    pub fn send_transport(&self, command: TransportCommand) -> Result<()> {
        self.send(SessionMsg::Transport {
            command,
            callback: None,
        })
    }

    /// Send a named command with its parameter bag
    ///
    /// Unknown names and malformed parameters are rejected here and the
    /// callback is not invoked. Once accepted, the callback completes
    /// exactly once.
    pub fn send_command(
        &self,
        name: &str,
        params: &Value,
        callback: Option<CommandCallback>,
    ) -> Result<()> {
        let command = Command::parse(name, params)?;
        debug!(command = command.name(), "Accepted command");

        match command {
            Command::Transport(command) => self.send(SessionMsg::Transport { command, callback }),
            Command::Custom(CustomCommand::EnqueueOne(input)) => {
                self.ensure_open()?;
                self.bus.submit_enqueue(vec![input], callback);
                Ok(())
            }
            Command::Custom(CustomCommand::EnqueueBatch(items)) => {
                self.ensure_open()?;
                self.bus.submit_enqueue(items, callback);
                Ok(())
            }
            Command::Custom(CustomCommand::PlayAt(index)) => {
                self.send(SessionMsg::PlayAt { index, callback })
            }
        }
    }

    /// Forward an "audio becoming noisy" signal
    pub fn audio_becoming_noisy(&self) -> Result<()> {
        self.send(SessionMsg::AudioNoisy)
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Current session state
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionMsg::Snapshot(reply_tx))?;
        reply_rx.await.map_err(|_| SessionError::SessionClosed)
    }

    /// Connect a named client
    ///
    /// The event subscription is taken before the snapshot so no change
    /// between the two is lost.
    pub async fn connect(&self, client_name: &str) -> Result<SessionConnection> {
        let events = self.subscribe();
        let snapshot = self.snapshot().await?;
        let root_id = root_for(client_name, &self.config.trusted_client);
        info!(client = client_name, root_id, "Client connected");
        Ok(SessionConnection {
            root_id,
            events,
            snapshot,
        })
    }

    /// Catalog entries listed under `parent_id`
    pub fn children(&self, parent_id: &str) -> Vec<MediaItem> {
        self.catalog.children(parent_id)
    }

    /// Catalog descriptor for `id`
    pub fn item_metadata(&self, id: &str) -> Option<MediaDescriptor> {
        self.catalog.metadata(id)
    }

    /// Stop playback, publish teardown and wait for the loop to exit
    pub async fn shutdown(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(SessionMsg::Shutdown(done_tx))?;
        done_rx.await.map_err(|_| SessionError::SessionClosed)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.tx.is_closed() {
            return Err(SessionError::SessionClosed);
        }
        Ok(())
    }

    fn send(&self, message: SessionMsg) -> Result<()> {
        self.tx.send(message).map_err(|_| SessionError::SessionClosed)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("closed", &self.tx.is_closed())
            .field("bus", &self.bus)
            .finish()
    }
}
