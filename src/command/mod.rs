//! Drone command vocabulary and its JSON wire form
//!
//! Every datagram carries exactly one UTF-8 JSON object tagged by `cmd`:
//!
//! ```text
//! {"cmd":"move","forward_back":0.05,"left_right":-0.03}
//! {"cmd":"up"}  {"cmd":"down"}  {"cmd":"start"}  {"cmd":"stop"}  {"cmd":"emergency"}
//! ```

pub mod encoder;

pub use encoder::{CommandEncoder, PowerState, MOVE_SCALE};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A single command as it goes over the wire
///
/// `Move` carries the already attenuated axis values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    Move { forward_back: f32, left_right: f32 },
    Up,
    Down,
    Start,
    Stop,
    Emergency,
}

impl Command {
    /// Wire name found in the `cmd` field
    pub fn name(&self) -> &'static str {
        match self {
            Command::Move { .. } => "move",
            Command::Up => "up",
            Command::Down => "down",
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Emergency => "emergency",
        }
    }

    /// Serializes the command into one datagram payload
    pub fn to_payload(&self) -> Result<Vec<u8>, CommandError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses a received datagram payload
    pub fn from_payload(payload: &[u8]) -> Result<Self, CommandError> {
        serde_json::from_slice(payload).map_err(CommandError::Decode)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Move {
                forward_back,
                left_right,
            } => write!(f, "move(fb={:.3}, lr={:.3})", forward_back, left_right),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Discrete operator actions (button presses)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Up,
    Down,
    /// Toggles the motors; encoded as `start` or `stop` depending on power state
    Power,
    Emergency,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Up => write!(f, "up"),
            Action::Down => write!(f, "down"),
            Action::Power => write!(f, "power"),
            Action::Emergency => write!(f, "emergency"),
        }
    }
}

impl FromStr for Action {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Action::Up),
            "down" => Ok(Action::Down),
            "power" => Ok(Action::Power),
            "emergency" | "estop" => Ok(Action::Emergency),
            other => Err(CommandError::UnknownAction(other.to_string())),
        }
    }
}

/// Receives discrete actions from the UI
pub trait ActionObserver: Send + Sync {
    fn on_action(&self, action: Action);
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to decode command payload: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Unknown action: {0}")]
    UnknownAction(String),
}
