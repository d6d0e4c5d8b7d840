//! Command transmission core for a WiFi quadcopter remote
//!
//! Joystick samples and button presses become small JSON commands that are pushed to
//! the drone as single UDP datagrams, best effort.

pub mod command;
pub mod config;
pub mod console;
pub mod input;
pub mod scheduler;
pub mod session;
pub mod transport;
