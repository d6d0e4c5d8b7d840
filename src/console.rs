//! Line based operator console
//!
//! Stands in for the touch surface: every stdin line is one operator gesture or button
//! press. The session stays attached until `quit` or end of input.

use crate::command::Action;
use crate::input::{ControlVector, JoystickRole, PointerEvent};
use crate::session::{Attached, ControlSession, Detached, Notice};
use std::str::FromStr;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const HELP: &str = "\
commands:
  up | down | power | emergency     button presses
  touch <v|h> <x> <y>               drag a stick to view coordinates
  release <v|h>                     let go of a stick
  stick <forward_back> <left_right> set both axes directly (-1..1)
  status                            show control vector, power and stats
  quit                              detach and exit";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    Press(Action),
    Touch { role: JoystickRole, x: f32, y: f32 },
    Release(JoystickRole),
    Stick(ControlVector),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConsoleError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Unknown stick '{0}', expected v or h")]
    UnknownStick(String),

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid number '{0}'")]
    InvalidNumber(String),
}

impl FromStr for ConsoleCommand {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(ConsoleCommand::Help);
        };

        let command = match head.to_ascii_lowercase().as_str() {
            "touch" => {
                let role = parse_role(words.next())?;
                let x = parse_number(words.next(), "x")?;
                let y = parse_number(words.next(), "y")?;
                ConsoleCommand::Touch { role, x, y }
            }
            "release" => ConsoleCommand::Release(parse_role(words.next())?),
            "stick" => {
                let forward_back = parse_number(words.next(), "forward_back")?;
                let left_right = parse_number(words.next(), "left_right")?;
                ConsoleCommand::Stick(ControlVector::new(forward_back, left_right))
            }
            "status" => ConsoleCommand::Status,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => Action::from_str(other)
                .map(ConsoleCommand::Press)
                .map_err(|_| ConsoleError::UnknownCommand(other.to_string()))?,
        };
        Ok(command)
    }
}

fn parse_role(word: Option<&str>) -> Result<JoystickRole, ConsoleError> {
    match word.map(|w| w.to_ascii_lowercase()) {
        Some(w) if w == "v" || w == "vertical" => Ok(JoystickRole::Vertical),
        Some(w) if w == "h" || w == "horizontal" => Ok(JoystickRole::Horizontal),
        Some(w) => Err(ConsoleError::UnknownStick(w)),
        None => Err(ConsoleError::MissingArgument("stick")),
    }
}

fn parse_number(word: Option<&str>, name: &'static str) -> Result<f32, ConsoleError> {
    let word = word.ok_or(ConsoleError::MissingArgument(name))?;
    word.parse::<f32>()
        .map_err(|_| ConsoleError::InvalidNumber(word.to_string()))
}

/// Drives an attached session from `input` until quit or end of input
///
/// Replies and notices go to `output`. The session is detached before returning.
pub async fn run<R, W>(
    mut session: ControlSession<Attached>,
    input: R,
    mut output: W,
    mut notices: Option<mpsc::Receiver<Notice>>,
) -> std::io::Result<ControlSession<Detached>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    output
        .write_all(
            format!("connected to {}, type 'help' for commands\n", session.endpoint()).as_bytes(),
        )
        .await?;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            Some(notice) = next_notice(&mut notices) => {
                let text = format!("[{}] {}\n", notice.issued_at.format("%H:%M:%S"), notice.message);
                output.write_all(text.as_bytes()).await?;
                continue;
            }
        };

        let Some(line) = line else {
            info!("Console input closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(e) => {
                debug!("Rejected console line '{}': {}", line, e);
                output.write_all(format!("{}\n{}\n", e, HELP).as_bytes()).await?;
                continue;
            }
        };

        if command == ConsoleCommand::Quit {
            break;
        }
        let reply = execute(&mut session, command);
        output.write_all(reply.as_bytes()).await?;
        output.write_all(b"\n").await?;
    }

    output.flush().await?;
    Ok(session.detach().await)
}

async fn next_notice(notices: &mut Option<mpsc::Receiver<Notice>>) -> Option<Notice> {
    match notices {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn execute(session: &mut ControlSession<Attached>, command: ConsoleCommand) -> String {
    match command {
        ConsoleCommand::Press(action) => match session.press(action) {
            Ok(sent) => format!("sent {}", sent),
            Err(e) => {
                warn!("Press {} rejected: {}", action, e);
                format!("could not send {}: {}", action, e)
            }
        },
        ConsoleCommand::Touch { role, x, y } => {
            let event = if session.is_touching(role) {
                PointerEvent::Move { x, y }
            } else {
                PointerEvent::Down { x, y }
            };
            let (nx, ny) = session.pointer(role, event);
            let (hx, hy) = session.hat_position(role);
            format!(
                "{} stick ({:.3}, {:.3}), knob at ({:.1}, {:.1})",
                role, nx, ny, hx, hy
            )
        }
        ConsoleCommand::Release(role) => {
            session.pointer(role, PointerEvent::Up);
            format!("{} stick released", role)
        }
        ConsoleCommand::Stick(vector) => {
            session.set_control_vector(vector);
            format!(
                "control vector set to ({:.3}, {:.3})",
                vector.forward_back, vector.left_right
            )
        }
        ConsoleCommand::Status => {
            let vector = session.control_vector();
            let stats = session.stats();
            format!(
                "forward_back {:.3} left_right {:.3} | motors {} | {} ticks, {} sent, {} failed",
                vector.forward_back,
                vector.left_right,
                if session.power_on() { "on" } else { "off" },
                stats.ticks,
                stats.total_sent(),
                stats.failed
            )
        }
        ConsoleCommand::Help => HELP.to_string(),
        ConsoleCommand::Quit => String::new(),
    }
}
