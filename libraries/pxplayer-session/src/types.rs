//! Core types for the playback session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;
use tokio::time::Instant;

/// Media description resolved from the catalog
///
/// Contains everything the engine needs to load the source and everything
/// a presentation layer needs to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// Opaque media identifier (catalog key)
    pub id: String,

    /// Track title
    pub title: String,

    /// Artist name
    pub artist: String,

    /// Artwork reference (URI), if any
    pub art_uri: Option<String>,

    /// Source URI handed to the engine
    pub media_uri: String,

    /// Media duration (`Duration::ZERO` when unknown)
    pub duration: Duration,

    /// Download availability, owned by the download subsystem
    pub download_status: DownloadStatus,
}

/// Download availability flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadStatus {
    NotDownloaded,
    Downloading,
    Downloaded,
}

/// Media submitted through the enqueue commands
///
/// The duration is optional: when missing it is probed from the source
/// before the media is queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInput {
    pub id: String,
    pub media_uri: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub publish_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub art_uri: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub is_downloaded: bool,
}

impl MediaInput {
    /// Known duration, if the submitter supplied one
    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }

    /// Build the catalog descriptor once the duration is settled
    ///
    /// Freshly enqueued media always starts as not downloaded.
    pub fn into_descriptor(self, duration: Duration) -> MediaDescriptor {
        MediaDescriptor {
            id: self.id,
            title: self.title,
            artist: self.artist,
            art_uri: self.art_uri,
            media_uri: self.media_uri,
            duration,
            download_status: DownloadStatus::NotDownloaded,
        }
    }
}

/// Entry in the playback queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Queue-local identifier, unique per session
    pub queue_id: u64,

    /// Description of the queued media
    pub description: MediaDescriptor,
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing prepared yet
    None,

    /// Engine released
    Stopped,

    /// Paused mid-track
    Paused,

    /// Currently playing
    Playing,

    /// Engine is loading data
    Buffering,

    /// Moving the cursor forward
    SkippingToNext,

    /// Moving the cursor backward
    SkippingToPrevious,
}

/// Set of commands a presentation layer may offer
///
/// Advisory only: the session never rejects a command because its bit is
/// missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Actions(u64);

impl Actions {
    pub const STOP: Actions = Actions(1);
    pub const PAUSE: Actions = Actions(1 << 1);
    pub const PLAY: Actions = Actions(1 << 2);
    pub const SKIP_TO_PREVIOUS: Actions = Actions(1 << 4);
    pub const SKIP_TO_NEXT: Actions = Actions(1 << 5);
    pub const SEEK_TO: Actions = Actions(1 << 8);
    pub const PLAY_PAUSE: Actions = Actions(1 << 9);
    pub const PLAY_FROM_MEDIA_ID: Actions = Actions(1 << 10);
    pub const PREPARE_FROM_MEDIA_ID: Actions = Actions(1 << 15);

    /// Empty set
    pub const fn empty() -> Self {
        Actions(0)
    }

    /// Raw bit representation
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Check whether every bit of `other` is set
    pub const fn contains(self, other: Actions) -> bool {
        self.0 & other.0 == other.0
    }

    /// Affordances offered in every state
    const fn base() -> Self {
        Actions(
            Self::PREPARE_FROM_MEDIA_ID.0
                | Self::PLAY_FROM_MEDIA_ID.0
                | Self::SKIP_TO_NEXT.0
                | Self::SKIP_TO_PREVIOUS.0,
        )
    }

    /// Affordances for a playback state
    pub fn for_state(state: PlaybackState) -> Self {
        let extra = match state {
            PlaybackState::Stopped => Self::PLAY | Self::PAUSE,
            PlaybackState::Playing => Self::STOP | Self::PAUSE | Self::SEEK_TO,
            PlaybackState::Paused => Self::PLAY | Self::STOP,
            PlaybackState::None
            | PlaybackState::Buffering
            | PlaybackState::SkippingToNext
            | PlaybackState::SkippingToPrevious => {
                Self::PLAY | Self::PLAY_PAUSE | Self::STOP | Self::PAUSE
            }
        };
        Self::base() | extra
    }
}

impl BitOr for Actions {
    type Output = Actions;

    fn bitor(self, rhs: Actions) -> Actions {
        Actions(self.0 | rhs.0)
    }
}

impl BitOrAssign for Actions {
    fn bitor_assign(&mut self, rhs: Actions) {
        self.0 |= rhs.0;
    }
}

/// Published playback status
///
/// Snapshot of the engine at the moment a state was published. The
/// position keeps advancing while playing; use [`PlaybackStatus::current_position`]
/// to extrapolate it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub position: Duration,
    pub buffered_position: Duration,
    pub rate: f32,
    pub updated_at: Instant,
    pub actions: Actions,
}

impl PlaybackStatus {
    /// Status published before anything happened
    pub fn empty() -> Self {
        Self {
            state: PlaybackState::None,
            position: Duration::ZERO,
            buffered_position: Duration::ZERO,
            rate: 0.0,
            updated_at: Instant::now(),
            actions: Actions::empty(),
        }
    }

    /// Build a status for a freshly published state
    pub fn new(state: PlaybackState, position: Duration, buffered_position: Duration) -> Self {
        Self {
            state,
            position,
            buffered_position,
            rate: 1.0,
            updated_at: Instant::now(),
            actions: Actions::for_state(state),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    pub fn is_buffering(&self) -> bool {
        self.state == PlaybackState::Buffering
    }

    /// Position extrapolated to `now`
    ///
    /// Only `Playing` advances; every other state reports the published
    /// position unchanged.
    pub fn current_position(&self, now: Instant) -> Duration {
        if !self.is_playing() || self.rate <= 0.0 {
            return self.position;
        }
        let elapsed = now.saturating_duration_since(self.updated_at);
        self.position + elapsed.mul_f32(self.rate)
    }
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self::empty()
    }
}

/// Configuration for a playback session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Client position polling cadence (default: 100ms)
    pub position_poll_interval_ms: u64,

    /// Buffered-position push cadence (default: 1000ms)
    pub buffer_progress_interval_ms: u64,

    /// Deadline for a single duration probe, `None` waits forever (default: 10s)
    pub probe_timeout_ms: Option<u64>,

    /// Probes allowed to run at once across all commands (default: 4)
    pub max_concurrent_probes: usize,

    /// Event bus capacity per subscriber (default: 64)
    pub event_capacity: usize,

    /// Client name that gets the full catalog root (default: "pxplayer")
    pub trusted_client: String,
}

impl SessionConfig {
    pub fn position_poll_interval(&self) -> Duration {
        Duration::from_millis(self.position_poll_interval_ms)
    }

    pub fn buffer_progress_interval(&self) -> Duration {
        Duration::from_millis(self.buffer_progress_interval_ms)
    }

    pub fn probe_timeout(&self) -> Option<Duration> {
        self.probe_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            position_poll_interval_ms: 100,
            buffer_progress_interval_ms: 1000,
            probe_timeout_ms: Some(10_000),
            max_concurrent_probes: 4,
            event_capacity: 64,
            trusted_client: "pxplayer".to_string(),
        }
    }
}
