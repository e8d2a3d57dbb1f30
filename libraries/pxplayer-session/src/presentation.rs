//! Presentation coordinator
//!
//! Reacts to every published state with platform side effects:
//! - the "audio becoming noisy" receiver is registered only while
//!   buffering or playing
//! - the now-playing notification is posted and the host promoted to the
//!   foreground while buffering or playing
//! - leaving those states demotes the host but keeps the notification; a
//!   `None` state also tears the host down
//!
//! The foreground flag is a latch: promotion happens once per run of
//! active states and demotion once when it ends.

use crate::events::SessionEvent;
use crate::service::SessionHandle;
use crate::types::{Actions, MediaDescriptor, PlaybackState, PlaybackStatus};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Content of the now-playing notification
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingNotification {
    pub title: String,
    pub artist: String,
    pub art_uri: Option<String>,
    pub state: PlaybackState,
    pub actions: Actions,
}

impl NowPlayingNotification {
    fn build(media: &MediaDescriptor, status: &PlaybackStatus) -> Self {
        Self {
            title: media.title.clone(),
            artist: media.artist.clone(),
            art_uri: media.art_uri.clone(),
            state: status.state,
            actions: status.actions,
        }
    }
}

/// Platform side of the presentation layer
#[cfg_attr(test, mockall::automock)]
pub trait PresentationHost: Send {
    /// Start listening for "audio becoming noisy"
    fn register_noisy_receiver(&mut self);

    fn unregister_noisy_receiver(&mut self);

    /// Post or refresh the now-playing notification
    fn post_notification(&mut self, notification: &NowPlayingNotification);

    /// Promote the host to the foreground with `notification` attached
    fn start_foreground(&mut self, notification: &NowPlayingNotification);

    /// Leave the foreground, optionally removing the notification
    fn stop_foreground(&mut self, remove_notification: bool);

    /// Tear the hosting process down
    fn stop_host(&mut self);
}

/// Drives a [`PresentationHost`] from session state changes
pub struct PresentationCoordinator<H: PresentationHost> {
    host: H,
    status: PlaybackStatus,
    metadata: Option<MediaDescriptor>,
    foreground: bool,
    noisy_registered: bool,
}

impl<H: PresentationHost> PresentationCoordinator<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            status: PlaybackStatus::empty(),
            metadata: None,
            foreground: false,
            noisy_registered: false,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground
    }

    pub fn is_noisy_registered(&self) -> bool {
        self.noisy_registered
    }

    /// React to a published playback status
    pub fn on_state_changed(&mut self, status: PlaybackStatus) {
        self.status = status;
        self.update();
    }

    /// React to a now-playing change using the last known state
    pub fn on_metadata_changed(&mut self, metadata: Option<MediaDescriptor>) {
        self.metadata = metadata;
        self.update();
    }

    /// Release everything when the session goes away
    pub fn on_session_destroyed(&mut self) {
        if self.noisy_registered {
            self.host.unregister_noisy_receiver();
            self.noisy_registered = false;
        }
        if self.foreground {
            self.host.stop_foreground(true);
            self.foreground = false;
        }
        self.host.stop_host();
    }

    fn update(&mut self) {
        let state = self.status.state;
        let notification = match (&self.metadata, state) {
            (Some(media), state) if state != PlaybackState::None => {
                Some(NowPlayingNotification::build(media, &self.status))
            }
            _ => None,
        };

        match state {
            PlaybackState::Buffering | PlaybackState::Playing => {
                if !self.noisy_registered {
                    self.host.register_noisy_receiver();
                    self.noisy_registered = true;
                }

                if let Some(notification) = notification {
                    self.host.post_notification(&notification);
                    if !self.foreground {
                        debug!(?state, "Promoting to foreground");
                        self.host.start_foreground(&notification);
                        self.foreground = true;
                    }
                }
            }
            _ => {
                if self.noisy_registered {
                    self.host.unregister_noisy_receiver();
                    self.noisy_registered = false;
                }

                if self.foreground {
                    debug!(?state, "Leaving foreground");
                    self.host.stop_foreground(false);
                    self.foreground = false;

                    if state == PlaybackState::None {
                        self.host.stop_host();
                    }

                    match notification {
                        Some(notification) => self.host.post_notification(&notification),
                        None => self.host.stop_foreground(true),
                    }
                }
            }
        }
    }

    /// Follow session events until the session is destroyed
    ///
    /// Noisy signals from the platform are forwarded to the session only
    /// while the receiver is registered.
    pub async fn run(
        mut self,
        mut events: broadcast::Receiver<SessionEvent>,
        handle: SessionHandle,
        mut noisy: mpsc::UnboundedReceiver<()>,
    ) -> Self {
        let mut noisy_open = true;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(SessionEvent::PlaybackStateChanged(status)) => self.on_state_changed(status),
                    Ok(SessionEvent::MetadataChanged(metadata)) => self.on_metadata_changed(metadata),
                    Ok(SessionEvent::SessionDestroyed) => {
                        self.on_session_destroyed();
                        break;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Presentation fell behind session events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                signal = noisy.recv(), if noisy_open => match signal {
                    Some(()) if self.noisy_registered => {
                        info!("Audio becoming noisy");
                        if handle.audio_becoming_noisy().is_err() {
                            break;
                        }
                    }
                    Some(()) => debug!("Noisy signal ignored, receiver not registered"),
                    None => noisy_open = false,
                },
            }
        }

        self
    }
}
