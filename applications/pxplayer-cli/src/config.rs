/// Application configuration
use anyhow::{bail, Context, Result};
use pxplayer_session::{MediaInput, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file, read when present
pub const DEFAULT_CONFIG_FILE: &str = "pxplayer.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub engine: SimulatedEngineConfig,

    #[serde(default)]
    pub probe: SimulatedProbeConfig,

    /// Media enqueued at startup
    #[serde(default)]
    pub media: Vec<MediaInput>,
}

/// Timing of the simulated playback engine
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulatedEngineConfig {
    #[serde(default = "default_load_delay_ms")]
    pub load_delay_ms: u64,

    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// How far ahead of the position the engine pretends to have buffered
    #[serde(default = "default_buffer_ahead_ms")]
    pub buffer_ahead_ms: u64,

    /// Sources whose URI contains this text fail to load
    #[serde(default)]
    pub fail_uri_pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulatedProbeConfig {
    #[serde(default = "default_probe_latency_ms")]
    pub latency_ms: u64,

    /// Duration reported for every probed source; unset means unknown
    #[serde(default = "default_probe_duration_ms")]
    pub duration_ms: Option<u64>,
}

impl SimulatedEngineConfig {
    pub fn load_delay(&self) -> Duration {
        Duration::from_millis(self.load_delay_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn buffer_ahead(&self) -> Duration {
        Duration::from_millis(self.buffer_ahead_ms)
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `pxplayer.toml` is read
    /// when present. `PXPLAYER_SESSION__EVENT_CAPACITY=128` style
    /// variables override both.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("PXPLAYER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.session.position_poll_interval_ms == 0 {
            bail!("session.position_poll_interval_ms must be greater than zero");
        }

        if self.session.buffer_progress_interval_ms == 0 {
            bail!("session.buffer_progress_interval_ms must be greater than zero");
        }

        if self.session.max_concurrent_probes == 0 {
            bail!("session.max_concurrent_probes must be greater than zero");
        }

        if self.session.event_capacity == 0 {
            bail!("session.event_capacity must be greater than zero");
        }

        if self.engine.tick_ms == 0 {
            bail!("engine.tick_ms must be greater than zero");
        }

        if let Some(media) = self.media.iter().find(|media| media.id.is_empty()) {
            bail!("media entry {:?} has an empty id", media.title);
        }

        Ok(())
    }
}

// Default values
fn default_load_delay_ms() -> u64 {
    250
}

fn default_tick_ms() -> u64 {
    100
}

fn default_buffer_ahead_ms() -> u64 {
    15_000
}

fn default_probe_latency_ms() -> u64 {
    50
}

fn default_probe_duration_ms() -> Option<u64> {
    Some(180_000)
}

impl Default for SimulatedEngineConfig {
    fn default() -> Self {
        Self {
            load_delay_ms: default_load_delay_ms(),
            tick_ms: default_tick_ms(),
            buffer_ahead_ms: default_buffer_ahead_ms(),
            fail_uri_pattern: None,
        }
    }
}

impl Default for SimulatedProbeConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_probe_latency_ms(),
            duration_ms: default_probe_duration_ms(),
        }
    }
}
