use crate::task_manager::Visibility;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::sync::oneshot;

/// Commands sent from CLI client to daemon
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IpcCommand {
    /// Show the card view
    Show,
    /// Hide the card view onto the active window
    Hide,
    /// Pan to the next card
    Next,
    /// Pan to the previous card
    Prev,
    /// Close the current card
    Close,
    /// Use screenshots on cards
    ScreenshotsOn,
    /// Stop using screenshots on cards
    ScreenshotsOff,
    /// Query daemon status (for debugging)
    Status,
    /// Shutdown the daemon gracefully
    Shutdown,
}

/// Response from daemon to CLI client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpcResponse {
    /// Command executed successfully
    Ok,
    /// Error occurred
    Error(String),
    /// Status response
    Status {
        visibility: Visibility,
        card_count: usize,
        current_index: Option<usize>,
    },
}

/// A command together with the channel its response goes back on
#[derive(Debug)]
pub struct IpcRequest {
    pub command: IpcCommand,
    pub reply: oneshot::Sender<IpcResponse>,
}

/// Get the path to the Unix socket
pub fn get_socket_path() -> Result<PathBuf> {
    let runtime_dir = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine runtime directory")?;

    Ok(runtime_dir.join("cardview.sock"))
}

/// A line on the socket that names no command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIpcCommandError(pub String);

impl fmt::Display for ParseIpcCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command `{}`", self.0)
    }
}

impl std::error::Error for ParseIpcCommandError {}

impl IpcCommand {
    pub const ALL: [IpcCommand; 9] = [
        IpcCommand::Show,
        IpcCommand::Hide,
        IpcCommand::Next,
        IpcCommand::Prev,
        IpcCommand::Close,
        IpcCommand::ScreenshotsOn,
        IpcCommand::ScreenshotsOff,
        IpcCommand::Status,
        IpcCommand::Shutdown,
    ];

    /// Wire name, one per line on the socket.
    pub fn as_str(self) -> &'static str {
        match self {
            IpcCommand::Show => "show",
            IpcCommand::Hide => "hide",
            IpcCommand::Next => "next",
            IpcCommand::Prev => "prev",
            IpcCommand::Close => "close",
            IpcCommand::ScreenshotsOn => "screenshots-on",
            IpcCommand::ScreenshotsOff => "screenshots-off",
            IpcCommand::Status => "status",
            IpcCommand::Shutdown => "shutdown",
        }
    }
}

impl FromStr for IpcCommand {
    type Err = ParseIpcCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        IpcCommand::ALL
            .into_iter()
            .find(|command| command.as_str() == name)
            .ok_or(ParseIpcCommandError(name))
    }
}

impl fmt::Display for IpcCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
