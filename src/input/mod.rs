//! Touch input subsystem
//!
//! Turns raw pointer coordinates from the on-screen joysticks into the normalized
//! control vector the transmission core sends to the drone.
//!
//! 1. [`sampler`] - Circular joystick sampling and clamping
//! 2. [`control_vector`] - Latest-value-wins storage shared with the periodic sender
//!
//! # Architecture
//!
//! ```text
//! PointerEvent ──► InputSampler ──► InputObserver ──► SharedControlVector
//!                  (clamp/normalize)  (per role)       (read every tick)
//! ```
//!
//! The operator surface carries two sticks. The vertical stick feeds `forward_back`
//! from its y output, the horizontal stick feeds `left_right` from its x output.

pub mod control_vector;
pub mod sampler;

pub use control_vector::{ControlVector, SharedControlVector};
pub use sampler::{InputSampler, JoystickGeometry, PointerEvent};

/// Receives the normalized control pair produced on every sampler update
///
/// The UI owns registration; the core never depends on UI types. Any
/// `Fn(f32, f32)` closure can be used as an observer.
pub trait InputObserver: Send + Sync {
    fn on_control(&self, x: f32, y: f32);
}

impl<F> InputObserver for F
where
    F: Fn(f32, f32) + Send + Sync,
{
    fn on_control(&self, x: f32, y: f32) {
        self(x, y)
    }
}

/// Which of the two on-screen joysticks an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoystickRole {
    /// Y output drives `forward_back`
    Vertical,
    /// X output drives `left_right`
    Horizontal,
}

impl JoystickRole {
    /// Picks the component of a sampled pair this stick is responsible for
    pub fn axis_value(self, x: f32, y: f32) -> f32 {
        match self {
            JoystickRole::Vertical => y,
            JoystickRole::Horizontal => x,
        }
    }
}

impl std::fmt::Display for JoystickRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoystickRole::Vertical => write!(f, "vertical"),
            JoystickRole::Horizontal => write!(f, "horizontal"),
        }
    }
}

/// Observer that writes one stick's axis into the shared control vector
pub struct AxisWriter {
    role: JoystickRole,
    target: std::sync::Arc<SharedControlVector>,
}

impl AxisWriter {
    pub fn new(role: JoystickRole, target: std::sync::Arc<SharedControlVector>) -> Self {
        Self { role, target }
    }
}

impl InputObserver for AxisWriter {
    fn on_control(&self, x: f32, y: f32) {
        let value = self.role.axis_value(x, y);
        match self.role {
            JoystickRole::Vertical => self.target.set_forward_back(value),
            JoystickRole::Horizontal => self.target.set_left_right(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn vertical_stick_only_touches_forward_back() {
        let shared = Arc::new(SharedControlVector::default());
        shared.set_left_right(0.25);

        let writer = AxisWriter::new(JoystickRole::Vertical, shared.clone());
        writer.on_control(0.9, -0.4);

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.forward_back, -0.4);
        assert_eq!(snapshot.left_right, 0.25);
    }

    #[test]
    fn horizontal_stick_only_touches_left_right() {
        let shared = Arc::new(SharedControlVector::default());
        shared.set_forward_back(-0.5);

        let writer = AxisWriter::new(JoystickRole::Horizontal, shared.clone());
        writer.on_control(0.7, 0.2);

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.forward_back, -0.5);
        assert_eq!(snapshot.left_right, 0.7);
    }

    #[test]
    fn closures_act_as_observers() {
        let seen = std::sync::Mutex::new(Vec::new());
        let observer = |x: f32, y: f32| seen.lock().unwrap().push((x, y));
        observer.on_control(0.1, 0.2);
        assert_eq!(*seen.lock().unwrap(), vec![(0.1, 0.2)]);
    }
}
