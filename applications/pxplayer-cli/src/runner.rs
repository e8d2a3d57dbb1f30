//! Wires a session with the simulated platform and drives it

use crate::config::AppConfig;
use crate::engine;
use crate::presenter::LogPresenter;
use crate::probe::SimulatedProbe;
use crate::script::Step;
use anyhow::{bail, Context, Result};
use pxplayer_session::{
    CommandCallback, CommandStatus, MediaItem, MediaLibrary, PlaybackStatus,
    PresentationCoordinator, SessionClient, SessionEvent, SessionHandle, SessionService,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Longest a command may take to complete
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Session plus the simulated platform around it
pub struct Player {
    config: AppConfig,
    handle: SessionHandle,
    client: SessionClient,
    noisy: mpsc::UnboundedSender<()>,
    presenter: JoinHandle<PresentationCoordinator<LogPresenter>>,
    reporter: JoinHandle<()>,
}

impl Player {
    /// Start a session and connect `client_name` to it
    pub async fn start(config: AppConfig, client_name: &str) -> Result<Self> {
        let handle = SessionService::start(
            config.session.clone(),
            Box::new(engine::factory(config.engine.clone())),
            Arc::new(MediaLibrary::new()),
            Arc::new(SimulatedProbe::new(&config.probe)),
        );

        let (noisy, noisy_rx) = mpsc::unbounded_channel();
        let coordinator = PresentationCoordinator::new(LogPresenter::new());
        let presenter = tokio::spawn(coordinator.run(handle.subscribe(), handle.clone(), noisy_rx));
        let reporter = tokio::spawn(report(handle.subscribe()));

        let mut client = SessionClient::new(client_name, config.session.position_poll_interval());
        client
            .connect(handle.clone())
            .await
            .context("Failed to connect to session")?;

        Ok(Self {
            config,
            handle,
            client,
            noisy,
            presenter,
            reporter,
        })
    }

    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    /// Browse the catalog under the client's root
    pub fn catalog(&self) -> Vec<MediaItem> {
        self.client.children()
    }

    /// Run script steps in order
    pub async fn run(&self, steps: &[Step]) -> Result<()> {
        for step in steps {
            self.step(step).await?;
        }
        Ok(())
    }

    pub async fn step(&self, step: &Step) -> Result<()> {
        match step {
            Step::Wait(duration) => tokio::time::sleep(*duration).await,
            Step::Noisy => {
                // Coordinator gone means the session is gone too
                if self.noisy.send(()).is_err() {
                    warn!("Presentation stopped, noisy signal dropped");
                }
            }
            Step::Status => self.log_status().await?,
            Step::EnqueueConfigured => {
                if self.config.media.is_empty() {
                    warn!("No media configured, nothing to enqueue");
                    return Ok(());
                }
                let playlist = serde_json::to_value(&self.config.media)?;
                self.command("enqueue-batch", &json!({ "playlist": playlist }))
                    .await?;
            }
            Step::Command { name, params } => {
                self.command(name, params).await?;
            }
        }
        Ok(())
    }

    /// Send a command and wait for its completion
    pub async fn command(&self, name: &str, params: &Value) -> Result<CommandStatus> {
        let (tx, rx) = oneshot::channel();
        let callback: CommandCallback = Box::new(move |status, result| {
            let _ = tx.send((status, result));
        });

        if !self.client.send_command(name, params, Some(callback))? {
            bail!("{} dropped, session not connected", name);
        }

        let (status, result) = tokio::time::timeout(COMMAND_TIMEOUT, rx)
            .await
            .with_context(|| format!("{} timed out", name))?
            .with_context(|| format!("{} was never completed", name))?;

        match status {
            CommandStatus::Success => info!(command = name, "Command completed"),
            CommandStatus::Failed => warn!(command = name, result = %result, "Command failed"),
        }
        Ok(status)
    }

    async fn log_status(&self) -> Result<()> {
        let snapshot = self.handle.snapshot().await?;
        let position = *self.client.position().borrow();
        info!(
            state = ?snapshot.status.state,
            now_playing = snapshot.now_playing.as_ref().map(|media| media.title.as_str()),
            cursor = ?snapshot.cursor,
            queued = snapshot.queue.len(),
            position_ms = position.as_millis() as u64,
            active = snapshot.active,
            "Session status"
        );
        Ok(())
    }

    /// Tear the session down and wait for the presentation to settle
    pub async fn shutdown(mut self) -> Result<LogPresenter> {
        self.handle.shutdown().await?;
        self.client.disconnect();

        let coordinator = self.presenter.await.context("Presentation task failed")?;
        self.reporter.abort();

        let host = coordinator.into_host();
        info!(
            foreground = host.is_foreground(),
            stopped = host.is_stopped(),
            "Session finished"
        );
        Ok(host)
    }
}

/// Log every published state change
async fn report(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::PlaybackStateChanged(status)) => log_state(&status),
            Ok(SessionEvent::QueueChanged(queue)) => info!(queued = queue.len(), "Queue changed"),
            Ok(SessionEvent::Error { message }) => warn!(%message, "Playback error"),
            Ok(SessionEvent::SessionDestroyed) | Err(broadcast::error::RecvError::Closed) => break,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Reporter fell behind session events");
            }
        }
    }
}

fn log_state(status: &PlaybackStatus) {
    info!(
        state = ?status.state,
        position_ms = status.position.as_millis() as u64,
        buffered_ms = status.buffered_position.as_millis() as u64,
        "Playback state"
    );
}

/// Wait until the mirrored state satisfies `ready`
pub async fn wait_for_state(
    mut state: watch::Receiver<PlaybackStatus>,
    ready: impl FnMut(&PlaybackStatus) -> bool,
    timeout: Duration,
) -> Result<()> {
    tokio::time::timeout(timeout, state.wait_for(ready))
        .await
        .context("Timed out waiting for playback state")?
        .context("Session client closed")?;
    Ok(())
}
