//! Asynchronous command bus
//!
//! Runs the enqueue commands off the session context. Media submitted
//! without a duration is probed on the blocking pool; the resolved
//! descriptors are then handed back to the session, which applies them and
//! completes the callback.
//!
//! ```text
//! client ──submit──▶ bus task ──spawn_blocking──▶ probe
//!                       │
//!                       └──SessionMsg::Enqueue──▶ session loop ──▶ callback
//! ```

use crate::catalog::DurationProbe;
use crate::command::{failure, CommandCallback, CommandStatus};
use crate::error::SessionError;
use crate::service::SessionMsg;
use crate::types::{MediaDescriptor, MediaInput, SessionConfig};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

/// Executes queue commands that may need a duration probe
#[derive(Clone)]
pub struct AsyncCommandBus {
    probe: Arc<dyn DurationProbe>,

    /// Bounds probes running at once across every submitted command
    permits: Arc<Semaphore>,

    timeout: Option<Duration>,
    session_tx: mpsc::UnboundedSender<SessionMsg>,
}

impl AsyncCommandBus {
    pub(crate) fn new(
        probe: Arc<dyn DurationProbe>,
        config: &SessionConfig,
        session_tx: mpsc::UnboundedSender<SessionMsg>,
    ) -> Self {
        Self {
            probe,
            permits: Arc::new(Semaphore::new(config.max_concurrent_probes.max(1))),
            timeout: config.probe_timeout(),
            session_tx,
        }
    }

    /// Resolve `items` in the background and queue them in order
    ///
    /// The callback completes exactly once: with success after the session
    /// queued every item, or with a failure if the session went away first.
    pub fn submit_enqueue(&self, items: Vec<MediaInput>, callback: Option<CommandCallback>) {
        let bus = self.clone();
        tokio::spawn(async move {
            let count = items.len();
            let resolved = join_all(items.into_iter().map(|input| bus.resolve(input))).await;
            debug!(count, "Resolved media for enqueue");

            let message = SessionMsg::Enqueue {
                items: resolved,
                callback,
            };
            if let Err(mpsc::error::SendError(message)) = bus.session_tx.send(message) {
                warn!(count, "Session closed before media could be queued");
                if let SessionMsg::Enqueue {
                    callback: Some(callback),
                    ..
                } = message
                {
                    callback(CommandStatus::Failed, failure(&SessionError::SessionClosed));
                }
            }
        });
    }

    /// Settle the duration of one input and build its descriptor
    pub async fn resolve(&self, input: MediaInput) -> MediaDescriptor {
        let duration = match input.duration() {
            Some(duration) => duration,
            None => self.probe_duration(&input.id, input.media_uri.clone()).await,
        };
        input.into_descriptor(duration)
    }

    /// Probe on the blocking pool; any failure falls back to zero
    async fn probe_duration(&self, media_id: &str, media_uri: String) -> Duration {
        let Ok(permit) = self.permits.clone().acquire_owned().await else {
            return Duration::ZERO;
        };

        // The permit stays with the blocking job, which outlives a timeout
        let probe = self.probe.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            probe.probe_duration(&media_uri)
        });

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(media_id, timeout = ?limit, "Duration probe timed out, using zero");
                    return Duration::ZERO;
                }
            },
            None => task.await,
        };

        match joined {
            Ok(Ok(Some(duration))) => duration,
            Ok(Ok(None)) => {
                warn!(media_id, "Source has no duration, using zero");
                Duration::ZERO
            }
            Ok(Err(e)) => {
                warn!(media_id, error = %e, "Duration probe failed, using zero");
                Duration::ZERO
            }
            Err(e) => {
                warn!(media_id, error = %e, "Duration probe panicked, using zero");
                Duration::ZERO
            }
        }
    }
}

impl std::fmt::Debug for AsyncCommandBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncCommandBus")
            .field("available_permits", &self.permits.available_permits())
            .field("timeout", &self.timeout)
            .finish()
    }
}
