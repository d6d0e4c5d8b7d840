use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// Continuous control input, each axis in [-1.0, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlVector {
    pub forward_back: f32,
    pub left_right: f32,
}

impl ControlVector {
    /// Builds a vector with both axes clamped into range
    pub fn new(forward_back: f32, left_right: f32) -> Self {
        Self {
            forward_back: clamp_axis(forward_back),
            left_right: clamp_axis(left_right),
        }
    }

    pub fn centered() -> Self {
        Self::default()
    }
}

/// Latest-value-wins cell shared between the input path and the periodic sender
///
/// Each axis lives in its own atomic as raw `f32` bits, so a reader never sees a torn
/// scalar. The two axes are independent; a snapshot may combine values from two
/// different writes.
#[derive(Debug)]
pub struct SharedControlVector {
    forward_back: AtomicU32,
    left_right: AtomicU32,
}

impl Default for SharedControlVector {
    fn default() -> Self {
        Self::new(ControlVector::default())
    }
}

impl SharedControlVector {
    pub fn new(initial: ControlVector) -> Self {
        Self {
            forward_back: AtomicU32::new(clamp_axis(initial.forward_back).to_bits()),
            left_right: AtomicU32::new(clamp_axis(initial.left_right).to_bits()),
        }
    }

    pub fn set_forward_back(&self, value: f32) {
        self.forward_back
            .store(clamp_axis(value).to_bits(), Ordering::Relaxed);
    }

    pub fn set_left_right(&self, value: f32) {
        self.left_right
            .store(clamp_axis(value).to_bits(), Ordering::Relaxed);
    }

    /// Overwrites both axes
    pub fn store(&self, vector: ControlVector) {
        self.set_forward_back(vector.forward_back);
        self.set_left_right(vector.left_right);
    }

    pub fn reset(&self) {
        self.store(ControlVector::centered());
    }

    pub fn snapshot(&self) -> ControlVector {
        ControlVector {
            forward_back: f32::from_bits(self.forward_back.load(Ordering::Relaxed)),
            left_right: f32::from_bits(self.left_right.load(Ordering::Relaxed)),
        }
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}
