//! Orientation reporting.
//!
//! The Mona board has an optional 9-axis IMU. The core does not drive it; the
//! host supplies whatever fused readings it has through `OrientationSource`, and
//! the full state report carries them through unchanged.

use serde::Serialize;

/// Heading, pitch and roll derived from one sensor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Attitude {
    pub heading: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// One snapshot of the IMU.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Orientation {
    pub accel: Attitude,
    pub mag: Attitude,
    pub gyro: Attitude,
    /// Die temperature in degrees Celsius.
    pub temperature: f32,
}

/// Provider of orientation snapshots. `None` means no IMU or a failed read.
pub trait OrientationSource {
    fn orientation(&mut self) -> Option<Orientation>;
}

impl<F: FnMut() -> Option<Orientation>> OrientationSource for F {
    fn orientation(&mut self) -> Option<Orientation> {
        self()
    }
}

/// Source for boards without an IMU.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOrientation;

impl OrientationSource for NoOrientation {
    fn orientation(&mut self) -> Option<Orientation> {
        None
    }
}
