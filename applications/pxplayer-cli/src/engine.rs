//! Simulated playback engine
//!
//! Plays nothing. Each instance runs a tokio driver task that reports
//! `Buffering`, then `Ready` after the configured load delay, then `Ended`
//! once the playback clock reaches the media duration.

use crate::config::SimulatedEngineConfig;
use pxplayer_session::{
    EngineEvent, EngineEventSender, MediaDescriptor, PlaybackEngine, Result, SessionError,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Playback clock shared with the driver task
#[derive(Debug, Default)]
struct Clock {
    duration: Duration,
    base: Duration,
    started: Option<Instant>,
    play_when_ready: bool,
    ready: bool,
}

impl Clock {
    fn position(&self, now: Instant) -> Duration {
        let position = match self.started {
            Some(started) => self.base + now.saturating_duration_since(started),
            None => self.base,
        };
        if self.duration.is_zero() {
            position
        } else {
            position.min(self.duration)
        }
    }

    fn freeze(&mut self, now: Instant) {
        self.base = self.position(now);
        self.started = None;
    }

    fn run(&mut self, now: Instant) {
        if self.started.is_none() {
            self.started = Some(now);
        }
    }

    fn apply(&mut self, now: Instant) {
        if self.ready && self.play_when_ready {
            self.run(now);
        } else {
            self.freeze(now);
        }
    }

    fn finished(&self, now: Instant) -> bool {
        self.ready && !self.duration.is_zero() && self.position(now) >= self.duration
    }
}

pub struct SimulatedEngine {
    config: SimulatedEngineConfig,
    events: EngineEventSender,
    clock: Arc<Mutex<Clock>>,
    driver: Option<JoinHandle<()>>,
}

impl SimulatedEngine {
    pub fn new(config: SimulatedEngineConfig, events: EngineEventSender) -> Self {
        Self {
            config,
            events,
            clock: Arc::new(Mutex::new(Clock::default())),
            driver: None,
        }
    }

    fn clock(&self) -> MutexGuard<'_, Clock> {
        lock(&self.clock)
    }

    fn stop_driver(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

fn lock(clock: &Mutex<Clock>) -> MutexGuard<'_, Clock> {
    clock.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn drive(
    clock: Arc<Mutex<Clock>>,
    events: EngineEventSender,
    load_delay: Duration,
    tick: Duration,
) {
    if !events.send(EngineEvent::Buffering) {
        return;
    }
    tokio::time::sleep(load_delay).await;

    {
        let mut clock = lock(&clock);
        clock.ready = true;
        clock.apply(Instant::now());
    }
    if !events.send(EngineEvent::Ready) {
        return;
    }

    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let now = Instant::now();
        let ended = {
            let mut clock = lock(&clock);
            let ended = clock.finished(now);
            if ended {
                clock.freeze(now);
            }
            ended
        };
        if ended {
            debug!(generation = events.generation(), "Simulated media ended");
            events.send(EngineEvent::Ended);
            return;
        }
    }
}

impl PlaybackEngine for SimulatedEngine {
    fn load(&mut self, media: &MediaDescriptor) -> Result<()> {
        if let Some(pattern) = &self.config.fail_uri_pattern {
            if media.media_uri.contains(pattern.as_str()) {
                return Err(SessionError::Engine(format!(
                    "cannot open {}",
                    media.media_uri
                )));
            }
        }

        self.stop_driver();
        {
            let mut clock = self.clock();
            let play_when_ready = clock.play_when_ready;
            *clock = Clock {
                duration: media.duration,
                play_when_ready,
                ..Clock::default()
            };
        }

        debug!(
            generation = self.events.generation(),
            media_id = %media.id,
            "Simulated engine loading"
        );
        self.driver = Some(tokio::spawn(drive(
            self.clock.clone(),
            self.events.clone(),
            self.config.load_delay(),
            self.config.tick(),
        )));
        Ok(())
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        let mut clock = self.clock();
        clock.play_when_ready = play_when_ready;
        clock.apply(Instant::now());
    }

    fn seek(&mut self, position: Duration) {
        let now = Instant::now();
        let mut clock = self.clock();
        clock.base = if clock.duration.is_zero() {
            position
        } else {
            position.min(clock.duration)
        };
        if clock.started.is_some() {
            clock.started = Some(now);
        }
    }

    fn release(&mut self) {
        self.stop_driver();
        self.clock().freeze(Instant::now());
    }

    fn position(&self) -> Duration {
        self.clock().position(Instant::now())
    }

    fn buffered_position(&self) -> Duration {
        let clock = self.clock();
        let ahead = clock.position(Instant::now()) + self.config.buffer_ahead();
        if clock.duration.is_zero() {
            ahead
        } else {
            ahead.min(clock.duration)
        }
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        self.stop_driver();
    }
}

/// Engine factory handing out simulated engines
pub fn factory(
    config: SimulatedEngineConfig,
) -> impl FnMut(EngineEventSender) -> Result<Box<dyn PlaybackEngine>> + Send {
    move |events| Ok(Box::new(SimulatedEngine::new(config.clone(), events)) as Box<dyn PlaybackEngine>)
}
