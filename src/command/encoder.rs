use super::{Action, Command, CommandError};
use crate::input::ControlVector;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Fixed attenuation applied to both axes of every `move` command
///
/// Full stick deflection goes out as ±0.1.
pub const MOVE_SCALE: f32 = 0.1;

/// Motor power flag toggled by the Power action
///
/// Starts off and only flips on Power presses; it lives as long as the session that
/// owns it.
#[derive(Debug, Default)]
pub struct PowerState {
    on: AtomicBool,
}

impl PowerState {
    pub fn new(on: bool) -> Self {
        Self {
            on: AtomicBool::new(on),
        }
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    /// Flips the flag and returns the new state
    pub fn toggle(&self) -> bool {
        !self.on.fetch_xor(true, Ordering::SeqCst)
    }
}

/// Maps operator input onto wire commands
#[derive(Debug, Default)]
pub struct CommandEncoder {
    power: PowerState,
}

impl CommandEncoder {
    pub fn new(power: PowerState) -> Self {
        Self { power }
    }

    pub fn power(&self) -> &PowerState {
        &self.power
    }

    /// `move` command for the given stick state, attenuated by [`MOVE_SCALE`]
    pub fn command_for_vector(&self, vector: ControlVector) -> Command {
        Command::Move {
            forward_back: vector.forward_back * MOVE_SCALE,
            left_right: vector.left_right * MOVE_SCALE,
        }
    }

    /// Command for a button press
    ///
    /// `Power` toggles the power state first; the new state picks `start` or `stop`.
    pub fn command_for_action(&self, action: Action) -> Command {
        match action {
            Action::Up => Command::Up,
            Action::Down => Command::Down,
            Action::Emergency => Command::Emergency,
            Action::Power => {
                let on = self.power.toggle();
                info!("Power toggled {}", if on { "on" } else { "off" });
                if on {
                    Command::Start
                } else {
                    Command::Stop
                }
            }
        }
    }

    pub fn encode(&self, command: &Command) -> Result<Vec<u8>, CommandError> {
        let payload = command.to_payload()?;
        debug!("Encoded {} into {} bytes", command, payload.len());
        Ok(payload)
    }

    pub fn encode_vector(&self, vector: ControlVector) -> Result<Vec<u8>, CommandError> {
        self.encode(&self.command_for_vector(vector))
    }

    pub fn encode_action(&self, action: Action) -> Result<Vec<u8>, CommandError> {
        self.encode(&self.command_for_action(action))
    }
}
