//! Command protocol
//!
//! Commands arrive as a name plus a JSON parameter bag. Transport commands
//! are applied directly on the session context; queue commands go through
//! the [`AsyncCommandBus`](crate::bus::AsyncCommandBus) first.

use crate::error::{Result, SessionError};
use crate::types::{MediaDescriptor, MediaInput};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Completion status reported to a command callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Failed,
}

impl CommandStatus {
    /// Wire status code
    pub fn code(self) -> i32 {
        match self {
            CommandStatus::Success => 0,
            CommandStatus::Failed => 1,
        }
    }
}

/// Completion callback, invoked exactly once per accepted command
pub type CommandCallback = Box<dyn FnOnce(CommandStatus, Value) + Send>;

/// Result bag of a failed command
pub(crate) fn failure(error: &SessionError) -> Value {
    json!({ "error": error.to_string() })
}

/// Transport commands
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    Prepare,
    Play,
    Pause,
    Stop,
    SkipToNext,
    SkipToPrevious,
    /// Absolute position in milliseconds (may be negative)
    SeekTo(i64),
    SeekForward,
    SeekBackward,
    AddQueueItem(MediaDescriptor),
}

impl TransportCommand {
    pub fn name(&self) -> &'static str {
        match self {
            TransportCommand::Prepare => "prepare",
            TransportCommand::Play => "play",
            TransportCommand::Pause => "pause",
            TransportCommand::Stop => "stop",
            TransportCommand::SkipToNext => "skip-next",
            TransportCommand::SkipToPrevious => "skip-previous",
            TransportCommand::SeekTo(_) => "seek-to",
            TransportCommand::SeekForward => "seek-forward",
            TransportCommand::SeekBackward => "seek-backward",
            TransportCommand::AddQueueItem(_) => "add-queue-item",
        }
    }

    fn parse(name: &str, params: &Value) -> Result<Option<Self>> {
        let command = match name {
            "prepare" => TransportCommand::Prepare,
            "play" => TransportCommand::Play,
            "pause" => TransportCommand::Pause,
            "stop" => TransportCommand::Stop,
            "skip-next" => TransportCommand::SkipToNext,
            "skip-previous" => TransportCommand::SkipToPrevious,
            "seek-to" => {
                let position = param(name, params, "position_ms")?
                    .as_i64()
                    .ok_or_else(|| invalid(name, "`position_ms` must be an integer"))?;
                TransportCommand::SeekTo(position)
            }
            "seek-forward" => TransportCommand::SeekForward,
            "seek-backward" => TransportCommand::SeekBackward,
            "add-queue-item" => TransportCommand::AddQueueItem(decode(name, params, "media")?),
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

/// Queue commands executed through the command bus
#[derive(Debug, Clone, PartialEq)]
pub enum CustomCommand {
    /// Probe (if needed) and append one media
    EnqueueOne(MediaInput),

    /// Probe (if needed) and append a playlist, preserving its order
    EnqueueBatch(Vec<MediaInput>),

    /// Jump to a queue index and play it from the start
    PlayAt(usize),
}

impl CustomCommand {
    pub const ENQUEUE_ONE: &'static str = "enqueue-one";
    pub const ENQUEUE_BATCH: &'static str = "enqueue-batch";
    pub const PLAY_AT: &'static str = "play-at";

    pub fn name(&self) -> &'static str {
        match self {
            CustomCommand::EnqueueOne(_) => Self::ENQUEUE_ONE,
            CustomCommand::EnqueueBatch(_) => Self::ENQUEUE_BATCH,
            CustomCommand::PlayAt(_) => Self::PLAY_AT,
        }
    }

    fn parse(name: &str, params: &Value) -> Result<Option<Self>> {
        let command = match name {
            Self::ENQUEUE_ONE => CustomCommand::EnqueueOne(decode(name, params, "media")?),
            Self::ENQUEUE_BATCH => CustomCommand::EnqueueBatch(decode(name, params, "playlist")?),
            Self::PLAY_AT => {
                let index = param(name, params, "queue_index")?
                    .as_u64()
                    .and_then(|index| usize::try_from(index).ok())
                    .ok_or_else(|| invalid(name, "`queue_index` must be a non-negative integer"))?;
                CustomCommand::PlayAt(index)
            }
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

/// Any command accepted by the session
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Transport(TransportCommand),
    Custom(CustomCommand),
}

impl Command {
    /// Decode a named command and its parameter bag
    ///
    /// Unknown names fail with [`SessionError::InvalidCommand`].
    pub fn parse(name: &str, params: &Value) -> Result<Self> {
        if let Some(command) = TransportCommand::parse(name, params)? {
            return Ok(Command::Transport(command));
        }
        if let Some(command) = CustomCommand::parse(name, params)? {
            return Ok(Command::Custom(command));
        }
        Err(SessionError::InvalidCommand(name.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Transport(command) => command.name(),
            Command::Custom(command) => command.name(),
        }
    }
}

fn invalid(command: &str, reason: impl Into<String>) -> SessionError {
    SessionError::InvalidParameter {
        command: command.to_string(),
        reason: reason.into(),
    }
}

fn param<'a>(command: &str, params: &'a Value, key: &str) -> Result<&'a Value> {
    params
        .get(key)
        .ok_or_else(|| invalid(command, format!("missing `{}`", key)))
}

fn decode<T: DeserializeOwned>(command: &str, params: &Value, key: &str) -> Result<T> {
    let value = param(command, params, key)?;
    serde_json::from_value(value.clone()).map_err(|e| invalid(command, e.to_string()))
}
