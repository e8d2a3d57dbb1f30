//! Session scripts
//!
//! A script is a comma-separated list of steps:
//!
//! - `wait:<ms>` sleeps
//! - `noisy` simulates headphones being unplugged
//! - `status` logs a session snapshot
//! - `enqueue` submits the configured media as one batch
//! - anything else is a session command, e.g. `play`, `seek-to:5000`,
//!   `play-at:1`

use anyhow::{anyhow, bail, Context, Result};
use pxplayer_session::Command;
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;

/// Script used when none is given on the command line
pub const DEFAULT_SCRIPT: &str = "enqueue,play,wait:3000,status,seek-forward,wait:1000,\
    noisy,wait:500,skip-next,play,wait:2000,play-at:0,wait:1000,status,stop";

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Wait(Duration),
    Noisy,
    Status,
    EnqueueConfigured,
    Command { name: String, params: Value },
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(step: &str) -> Result<Self> {
        let step = step.trim();
        let (name, arg) = match step.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (step, None),
        };

        match (name, arg) {
            ("", _) => bail!("empty step"),
            ("wait", Some(ms)) => {
                let ms = ms.parse().with_context(|| format!("bad wait: {}", ms))?;
                Ok(Step::Wait(Duration::from_millis(ms)))
            }
            ("wait", None) => bail!("wait needs a duration, e.g. wait:500"),
            ("noisy", None) => Ok(Step::Noisy),
            ("status", None) => Ok(Step::Status),
            ("enqueue", None) => Ok(Step::EnqueueConfigured),
            (name, arg) => {
                let params = command_params(name, arg)?;
                // Reject unknown names before anything runs
                Command::parse(name, &params)?;
                Ok(Step::Command {
                    name: name.to_string(),
                    params,
                })
            }
        }
    }
}

fn command_params(name: &str, arg: Option<&str>) -> Result<Value> {
    let Some(arg) = arg else {
        return Ok(Value::Null);
    };

    match name {
        "seek-to" => {
            let position_ms: i64 = arg
                .parse()
                .with_context(|| format!("bad seek position: {}", arg))?;
            Ok(json!({ "position_ms": position_ms }))
        }
        "play-at" => {
            let queue_index: u64 = arg
                .parse()
                .with_context(|| format!("bad queue index: {}", arg))?;
            Ok(json!({ "queue_index": queue_index }))
        }
        _ => Err(anyhow!("{} takes no argument", name)),
    }
}

/// Parse a comma-separated script
pub fn parse(script: &str) -> Result<Vec<Step>> {
    script
        .split(',')
        .filter(|step| !step.trim().is_empty())
        .map(|step| step.parse().with_context(|| format!("invalid step {:?}", step.trim())))
        .collect()
}
