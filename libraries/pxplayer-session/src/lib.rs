//! pxplayer - Playback Session
//!
//! Media-playback session controller: owns a playback queue, drives a
//! play/pause/seek/skip state machine on top of an opaque playback engine
//! and keeps remote observers in sync with playback progress.
//!
//! This crate provides:
//! - Playback queue with wrap-around navigation
//! - Engine adapter translating engine lifecycle events into states
//! - Session state machine (prepare, play, pause, stop, seek, skip)
//! - Asynchronous command bus for enqueue commands needing a duration probe
//! - Client mirror with `watch` fields and position polling
//! - Presentation coordinator for notifications and noisy-audio handling
//!
//! # Architecture
//!
//! ```text
//! SessionClient ──commands──▶ SessionHandle ──▶ AsyncCommandBus (probe)
//!       ▲                          │                    │
//!       │                          ▼                    ▼
//!       │                   session task: SessionStateMachine
//!       │                          │   ├── PlaybackQueue
//!       │                          │   └── PlaybackEngineAdapter ──▶ engine
//!       └──── SessionEvent bus ◀───┘
//!                    │
//!                    └──▶ PresentationCoordinator ──▶ PresentationHost
//! ```
//!
//! The engine, the duration probe and the presentation host are platform
//! code supplied through traits.
//!
//! # Example
//!
//! ```rust,no_run
//! use pxplayer_session::{
//!     EngineEventSender, MediaLibrary, PlaybackEngine, Result, SessionClient, SessionConfig,
//!     SessionService,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn platform_engine(_events: EngineEventSender) -> Result<Box<dyn PlaybackEngine>> { unimplemented!() }
//! # async fn example() -> Result<()> {
//! let config = SessionConfig::default();
//! let probe = |_uri: &str| -> Result<Option<Duration>> { Ok(None) };
//! let handle = SessionService::start(
//!     config.clone(),
//!     Box::new(platform_engine),
//!     Arc::new(MediaLibrary::new()),
//!     Arc::new(probe),
//! );
//!
//! let mut client = SessionClient::new("pxplayer", config.position_poll_interval());
//! client.connect(handle.clone()).await?;
//!
//! client.send_command(
//!     "enqueue-one",
//!     &json!({ "media": {
//!         "id": "intro",
//!         "media_uri": "https://example.com/intro.mp3",
//!         "title": "Intro",
//!         "artist": "Band",
//!     }}),
//!     None,
//! )?;
//!
//! if let Some(controls) = client.transport_controls() {
//!     controls.play()?;
//! }
//! # Ok(())
//! # }
//! ```

mod adapter;
mod bus;
pub mod catalog;
mod client;
pub mod command;
mod engine;
mod error;
mod events;
mod machine;
mod presentation;
mod queue;
mod service;
pub mod types;

// Public exports
pub use adapter::{EngineOutcome, PlaybackEngineAdapter};
pub use bus::AsyncCommandBus;
pub use catalog::{
    DurationProbe, MediaCatalog, MediaItem, MediaLibrary, MEDIA_ROOT_ID, MEDIA_ROOT_ID_EMPTY,
};
pub use client::{SessionClient, TransportControls};
pub use command::{Command, CommandCallback, CommandStatus, CustomCommand, TransportCommand};
pub use engine::{EngineEvent, EngineEventSender, EngineFactory, EngineMessage, PlaybackEngine};
pub use error::{Result, SessionError};
pub use events::{SessionEvent, SessionEvents};
pub use machine::{SessionSnapshot, SessionStateMachine, SEEK_BACKWARD_STEP, SEEK_FORWARD_STEP};
pub use presentation::{NowPlayingNotification, PresentationCoordinator, PresentationHost};
pub use queue::PlaybackQueue;
pub use service::{SessionConnection, SessionHandle, SessionService};
pub use types::{
    Actions, DownloadStatus, MediaDescriptor, MediaInput, PlaybackState, PlaybackStatus,
    QueueItem, SessionConfig,
};
