//! Circular joystick sampling
//!
//! Maps a pointer position inside a joystick view to a control pair in
//! [-1, 1]×[-1, 1]. Points outside the base circle are projected back onto it along
//! the pointer's angle, so a full deflection always has magnitude 1.0.

use super::InputObserver;
use tracing::{debug, trace};

/// Pointer events delivered by the touch surface, in view-local coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
}

/// Geometry of one joystick view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoystickGeometry {
    pub center_x: f32,
    pub center_y: f32,
    /// Radius of the base circle; deflection is normalized by this value
    pub base_radius: f32,
    /// Radius of the knob drawn under the finger
    pub hat_radius: f32,
}

impl JoystickGeometry {
    pub fn new(center_x: f32, center_y: f32, base_radius: f32) -> Self {
        Self {
            center_x,
            center_y,
            base_radius,
            hat_radius: base_radius * 3.0 / 5.0,
        }
    }

    /// Layout used by the touch surface: centred base with a third of the short side as
    /// radius and a fifth of it for the knob
    pub fn from_view_size(width: f32, height: f32) -> Self {
        let short_side = width.min(height);
        Self {
            center_x: width / 2.0,
            center_y: height / 2.0,
            base_radius: short_side / 3.0,
            hat_radius: short_side / 5.0,
        }
    }
}

/// Samples one on-screen joystick
///
/// Holds the current knob position for visual feedback and notifies the registered
/// observer with the normalized pair on every update, release included.
pub struct InputSampler {
    geometry: JoystickGeometry,
    hat_x: f32,
    hat_y: f32,
    touching: bool,
    observer: Option<Box<dyn InputObserver>>,
}

impl InputSampler {
    pub fn new(geometry: JoystickGeometry) -> Self {
        Self {
            geometry,
            hat_x: geometry.center_x,
            hat_y: geometry.center_y,
            touching: false,
            observer: None,
        }
    }

    pub fn with_observer(geometry: JoystickGeometry, observer: Box<dyn InputObserver>) -> Self {
        let mut sampler = Self::new(geometry);
        sampler.observer = Some(observer);
        sampler
    }

    pub fn geometry(&self) -> &JoystickGeometry {
        &self.geometry
    }

    /// Updates the geometry after the view was resized
    ///
    /// Any drag in progress ends: the knob snaps back to centre and the observer sees
    /// (0, 0).
    pub fn set_geometry(&mut self, geometry: JoystickGeometry) -> (f32, f32) {
        self.geometry = geometry;
        self.handle(PointerEvent::Up)
    }

    /// Knob position in view coordinates (centre while released)
    pub fn hat_position(&self) -> (f32, f32) {
        (self.hat_x, self.hat_y)
    }

    pub fn is_touching(&self) -> bool {
        self.touching
    }

    /// Feeds one pointer event and returns the resulting normalized pair
    pub fn handle(&mut self, event: PointerEvent) -> (f32, f32) {
        let output = match event {
            PointerEvent::Down { x, y } | PointerEvent::Move { x, y } => self.sample(x, y),
            PointerEvent::Up => self.release(),
        };

        trace!("Joystick output: ({:.3}, {:.3})", output.0, output.1);
        if let Some(observer) = &self.observer {
            observer.on_control(output.0, output.1);
        }
        output
    }

    fn sample(&mut self, x: f32, y: f32) -> (f32, f32) {
        let radius = self.geometry.base_radius;
        if !x.is_finite() || !y.is_finite() || radius.is_nan() || radius <= 0.0 {
            debug!("Ignoring unusable pointer sample ({}, {}) with radius {}", x, y, radius);
            return self.release();
        }

        let (nx, ny) = normalize(x - self.geometry.center_x, y - self.geometry.center_y, radius);
        self.hat_x = self.geometry.center_x + nx * radius;
        self.hat_y = self.geometry.center_y + ny * radius;
        self.touching = true;
        (nx, ny)
    }

    fn release(&mut self) -> (f32, f32) {
        self.hat_x = self.geometry.center_x;
        self.hat_y = self.geometry.center_y;
        self.touching = false;
        (0.0, 0.0)
    }
}

/// Normalizes an offset from the joystick centre by `radius`
///
/// Offsets strictly inside the circle are divided through; anything on or past the
/// boundary is projected onto it along `atan2(dy, dx)` first.
pub fn normalize(dx: f32, dy: f32, radius: f32) -> (f32, f32) {
    let distance = (dx * dx + dy * dy).sqrt();
    if distance < radius {
        (dx / radius, dy / radius)
    } else {
        let angle = dy.atan2(dx);
        (angle.cos(), angle.sin())
    }
}
