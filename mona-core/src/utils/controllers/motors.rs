//! Motor actuation for the two-wheeled base.
//!
//! Each wheel is an H-bridge fed by two PWM outputs, one per direction. A signed
//! speed request is split into a magnitude on one output and zero on the other.
//! The inactive output is always written first, so a wheel never sees both
//! directions driven at once.

use embedded_hal::pwm::SetDutyCycle;
use serde::{Deserialize, Serialize};

/// Full-scale duty cycle request.
pub const MAX_SPEED: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// A per-wheel speed request after saturation.
///
/// Positive is forward, negative backward, zero stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelCommand {
    pub side: Side,
    pub signed_speed: i16,
}

impl WheelCommand {
    /// Saturate `signed_speed` into `-255..=255`.
    pub fn new(
        side: Side,
        signed_speed: i32,
    ) -> Self {
        let max = i32::from(MAX_SPEED);
        Self {
            side,
            signed_speed: signed_speed.clamp(-max, max) as i16,
        }
    }

    /// Duty cycle magnitude.
    #[inline]
    pub fn magnitude(&self) -> u8 {
        self.signed_speed.unsigned_abs() as u8
    }

    /// `(forward, backward)` duty pair; at most one is non-zero.
    #[inline]
    pub fn duties(&self) -> (u8, u8) {
        if self.signed_speed >= 0 {
            (self.magnitude(), 0)
        } else {
            (0, self.magnitude())
        }
    }
}

/// Anything that can move the two wheels.
///
/// Only `drive` is required; every other motion is a composition of it.
pub trait Drive {
    type Error: core::fmt::Debug;

    /// Apply a signed speed to one wheel. Out-of-range input is saturated.
    fn drive(
        &mut self,
        side: Side,
        signed_speed: i32,
    ) -> Result<WheelCommand, Self::Error>;

    fn stop(
        &mut self,
        side: Side,
    ) -> Result<(), Self::Error> {
        self.drive(side, 0).map(|_| ())
    }

    fn forward(
        &mut self,
        speed: u8,
    ) -> Result<(), Self::Error> {
        self.drive(Side::Left, i32::from(speed))?;
        self.drive(Side::Right, i32::from(speed))?;
        Ok(())
    }

    fn backward(
        &mut self,
        speed: u8,
    ) -> Result<(), Self::Error> {
        self.drive(Side::Left, -i32::from(speed))?;
        self.drive(Side::Right, -i32::from(speed))?;
        Ok(())
    }

    /// Turn counter-clockwise in place: left wheel back, right wheel forward.
    fn spin_left(
        &mut self,
        speed: u8,
    ) -> Result<(), Self::Error> {
        self.drive(Side::Left, -i32::from(speed))?;
        self.drive(Side::Right, i32::from(speed))?;
        Ok(())
    }

    /// Turn clockwise in place: left wheel forward, right wheel back.
    fn spin_right(
        &mut self,
        speed: u8,
    ) -> Result<(), Self::Error> {
        self.drive(Side::Left, i32::from(speed))?;
        self.drive(Side::Right, -i32::from(speed))?;
        Ok(())
    }

    fn stop_all(&mut self) -> Result<(), Self::Error> {
        self.stop(Side::Left)?;
        self.stop(Side::Right)
    }
}

/// The forward/backward output pair of one H-bridge.
pub struct Wheel<P> {
    forward: P,
    backward: P,
}

impl<P: SetDutyCycle> Wheel<P> {
    pub fn new(
        forward: P,
        backward: P,
    ) -> Self {
        Self { forward, backward }
    }

    fn apply(
        &mut self,
        command: &WheelCommand,
    ) -> Result<(), P::Error> {
        let (fwd, bwd) = command.duties();
        let max = u16::from(MAX_SPEED);
        if fwd > 0 {
            self.backward.set_duty_cycle_fully_off()?;
            self.forward.set_duty_cycle_fraction(u16::from(fwd), max)
        } else {
            self.forward.set_duty_cycle_fully_off()?;
            self.backward.set_duty_cycle_fraction(u16::from(bwd), max)
        }
    }
}

/// PWM-backed differential drive.
pub struct Drivetrain<P> {
    left: Wheel<P>,
    right: Wheel<P>,
}

impl<P: SetDutyCycle> Drivetrain<P> {
    pub fn new(
        left: Wheel<P>,
        right: Wheel<P>,
    ) -> Self {
        Self { left, right }
    }
}

impl<P: SetDutyCycle> Drive for Drivetrain<P> {
    type Error = P::Error;

    fn drive(
        &mut self,
        side: Side,
        signed_speed: i32,
    ) -> Result<WheelCommand, Self::Error> {
        let command = WheelCommand::new(side, signed_speed);
        let wheel = match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        };
        wheel.apply(&command)?;
        tracing::trace!(?side, speed = command.signed_speed, "wheel driven");
        Ok(command)
    }
}
