//! pxplayer command-line driver
//!
//! Runs a playback session against a simulated engine, probe and
//! notification area, and drives it with a short script.

pub mod config;
pub mod engine;
pub mod presenter;
pub mod probe;
pub mod runner;
pub mod script;

pub use config::AppConfig;
pub use runner::Player;
