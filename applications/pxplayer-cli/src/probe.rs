//! Simulated duration probe

use crate::config::SimulatedProbeConfig;
use pxplayer_session::{DurationProbe, Result, SessionError};
use std::time::Duration;
use tracing::debug;

/// Reports a fixed duration after a fixed latency
///
/// Runs on the blocking pool, so the latency is a plain thread sleep.
#[derive(Debug, Clone)]
pub struct SimulatedProbe {
    latency: Duration,
    duration: Option<Duration>,
}

impl SimulatedProbe {
    pub fn new(config: &SimulatedProbeConfig) -> Self {
        Self {
            latency: Duration::from_millis(config.latency_ms),
            duration: config.duration_ms.map(Duration::from_millis),
        }
    }
}

impl DurationProbe for SimulatedProbe {
    fn probe_duration(&self, media_uri: &str) -> Result<Option<Duration>> {
        if media_uri.is_empty() {
            return Err(SessionError::Probe("empty media URI".to_string()));
        }

        std::thread::sleep(self.latency);
        debug!(media_uri, duration = ?self.duration, "Probed duration");
        Ok(self.duration)
    }
}
