//! Error types for the playback session

use thiserror::Error;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// Command name not recognized by the session
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Command recognized but its parameter bag is malformed
    #[error("Invalid parameter for {command}: {reason}")]
    InvalidParameter { command: String, reason: String },

    /// Queue is empty
    #[error("Queue is empty")]
    QueueEmpty,

    /// Queue index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Client is not connected to a session, command dropped
    #[error("Not connected to a session")]
    NotConnected,

    /// Session task has shut down
    #[error("Session closed")]
    SessionClosed,

    /// Playback engine error
    #[error("Engine error: {0}")]
    Engine(String),

    /// Duration probe error
    #[error("Probe error: {0}")]
    Probe(String),
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
