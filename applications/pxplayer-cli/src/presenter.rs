//! Terminal presentation host
//!
//! Stands in for a platform notification area: every side effect the
//! coordinator requests is logged and its effect on the host is tracked.

use pxplayer_session::{NowPlayingNotification, PresentationHost};
use tracing::info;

#[derive(Debug, Default)]
pub struct LogPresenter {
    noisy_registered: bool,
    foreground: bool,
    notification: Option<NowPlayingNotification>,
    stopped: bool,
}

impl LogPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notification(&self) -> Option<&NowPlayingNotification> {
        self.notification.as_ref()
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl PresentationHost for LogPresenter {
    fn register_noisy_receiver(&mut self) {
        self.noisy_registered = true;
        info!("Listening for noisy audio");
    }

    fn unregister_noisy_receiver(&mut self) {
        if self.noisy_registered {
            info!("Stopped listening for noisy audio");
        }
        self.noisy_registered = false;
    }

    fn post_notification(&mut self, notification: &NowPlayingNotification) {
        info!(
            title = %notification.title,
            artist = %notification.artist,
            state = ?notification.state,
            "Now playing"
        );
        self.notification = Some(notification.clone());
    }

    fn start_foreground(&mut self, notification: &NowPlayingNotification) {
        info!(title = %notification.title, "Entering foreground");
        self.foreground = true;
        self.notification = Some(notification.clone());
    }

    fn stop_foreground(&mut self, remove_notification: bool) {
        info!(remove_notification, "Leaving foreground");
        self.foreground = false;
        if remove_notification {
            self.notification = None;
        }
    }

    fn stop_host(&mut self) {
        info!("Presentation host stopped");
        self.stopped = true;
    }
}
