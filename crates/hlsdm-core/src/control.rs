//! Queue control commands exchanged over the control socket.
//!
//! A running `hlsdm batch` listens on a Unix socket; `hlsdm pause|resume|cancel`
//! connect and write one line per command: `pause <queue-id>`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ids::QueueId;
use crate::queue::{QueueError, QueueScheduler};

/// One control-socket line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Pause(QueueId),
    Resume(QueueId),
    Cancel(QueueId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed control line: {0:?}")]
pub struct BadControlLine(pub String);

impl ControlCommand {
    pub fn queue_id(self) -> QueueId {
        match self {
            ControlCommand::Pause(id) | ControlCommand::Resume(id) | ControlCommand::Cancel(id) => id,
        }
    }

    /// Run the command against `scheduler`.
    pub fn apply(self, scheduler: &QueueScheduler) -> Result<(), QueueError> {
        match self {
            ControlCommand::Pause(id) => scheduler.pause(id),
            ControlCommand::Resume(id) => scheduler.resume(id),
            ControlCommand::Cancel(id) => scheduler.cancel(id),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            ControlCommand::Pause(_) => "pause",
            ControlCommand::Resume(_) => "resume",
            ControlCommand::Cancel(_) => "cancel",
        };
        write!(f, "{} {}", verb, self.queue_id())
    }
}

impl FromStr for ControlCommand {
    type Err = BadControlLine;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let bad = || BadControlLine(line.to_string());
        let (verb, arg) = line.trim().split_once(char::is_whitespace).ok_or_else(bad)?;
        let id: QueueId = arg.trim().parse().map_err(|_| bad())?;
        match verb {
            "pause" => Ok(ControlCommand::Pause(id)),
            "resume" => Ok(ControlCommand::Resume(id)),
            "cancel" => Ok(ControlCommand::Cancel(id)),
            _ => Err(bad()),
        }
    }
}

/// Default path for the control socket (same XDG state dir as the history DB).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("hlsdm")?.get_state_home();
    Ok(dir.join("hlsdm").join("control.sock"))
}
