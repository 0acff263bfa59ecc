use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ipc::IpcCommand;
use crate::stack::StackFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
pub enum FilterMode {
    /// Show a card for every window in the stack
    #[default]
    All,
    /// Show browser windows only
    Browser,
}

impl From<FilterMode> for StackFilter {
    fn from(mode: FilterMode) -> Self {
        match mode {
            FilterMode::All => StackFilter::All,
            FilterMode::Browser => StackFilter::Browser,
        }
    }
}

/// Layout and timing policy.
///
/// The settle delays stand in for visual transition durations. They are
/// not measured, just waited out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Space between neighbouring cards
    pub gutter: f64,
    /// How long a pan is given to finish scrolling
    pub pan_settle_ms: u64,
    /// Upper bound on waiting for a dropped card to settle
    pub drop_settle_ms: u64,
    /// Upper bound on waiting for a window to acknowledge open/close
    pub open_timeout_ms: u64,
    /// Initial value of the screenshot preference
    pub screenshots_enabled: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            gutter: 25.0,
            pan_settle_ms: 200,
            drop_settle_ms: 400,
            open_timeout_ms: 1000,
            screenshots_enabled: true,
        }
    }
}

impl Policy {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read policy file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid policy file {}", path.display()))
    }

    pub fn pan_settle(&self) -> Duration {
        Duration::from_millis(self.pan_settle_ms)
    }

    pub fn drop_settle(&self) -> Duration {
        Duration::from_millis(self.drop_settle_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run as daemon (default if no command specified)
    Daemon,
    /// Show the card view
    Show,
    /// Hide the card view
    Hide,
    /// Pan to the next card
    Next,
    /// Pan to the previous card
    Prev,
    /// Close the current card
    Close,
    /// Turn card screenshots on or off
    Screenshots {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Query daemon status
    Status,
    /// Shutdown the daemon
    Shutdown,
}

impl Command {
    /// The socket command a client invocation sends, `None` for daemon mode.
    pub fn ipc_command(&self) -> Option<IpcCommand> {
        Some(match self {
            Command::Daemon => return None,
            Command::Show => IpcCommand::Show,
            Command::Hide => IpcCommand::Hide,
            Command::Next => IpcCommand::Next,
            Command::Prev => IpcCommand::Prev,
            Command::Close => IpcCommand::Close,
            Command::Screenshots { enabled: true } => IpcCommand::ScreenshotsOn,
            Command::Screenshots { enabled: false } => IpcCommand::ScreenshotsOff,
            Command::Status => IpcCommand::Status,
            Command::Shutdown => IpcCommand::Shutdown,
        })
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "cardview")]
#[command(about = "Card-view task switcher over a simulated window stack", long_about = None)]
pub struct Config {
    /// Which windows get a card (only applies to daemon mode)
    #[arg(short, long, value_enum, default_value = "all")]
    pub filter: FilterMode,

    /// JSON file describing the simulated window stack (daemon mode)
    #[arg(short, long)]
    pub scenario: Option<PathBuf>,

    /// JSON file overriding layout and timing policy (daemon mode)
    #[arg(short, long)]
    pub policy: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Config {
    pub fn parse() -> Self {
        <Config as Parser>::parse()
    }

    /// Get the command, defaulting to Daemon if none specified
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Daemon)
    }

    pub fn policy(&self) -> Result<Policy> {
        match &self.policy {
            Some(path) => Policy::load(path),
            None => Ok(Policy::default()),
        }
    }
}
