//! Obstacle avoidance state machine.
//!
//! Runs once per control tick. In `Autonomous` mode a tick is:
//!
//! 1. apply the action of the current state to the motors,
//! 2. sample all five proximity channels,
//! 3. pick the next state from the detections.
//!
//! Motors therefore always reflect the decision of the previous tick, and the
//! robot is never stopped to take a reading.
//!
//! | detections (first match wins)     | next state  |
//! |-----------------------------------|-------------|
//! | any channel in the front group    | `SpinLeft`  |
//! | left boundary channel             | `SpinRight` |
//! | right boundary channel            | `SpinLeft`  |
//! | none                              | `Forward`   |
//!
//! | state       | action                               |
//! |-------------|--------------------------------------|
//! | `Forward`   | both wheels forward at cruise speed  |
//! | `SpinLeft`  | `spin_left` at rotate speed          |
//! | `SpinRight` | `spin_right` at rotate speed         |

use serde::{Deserialize, Serialize};

use crate::utils::{
    config::AvoidanceConfig,
    controllers::{
        motors::Drive,
        proximity::{Channel, ChannelSet, ProximityArray, CHANNEL_COUNT},
    },
};

/// What the control tick does.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Full state machine drives the motors.
    Autonomous,
    /// External commands drive; the front sensors can only force a stop.
    GuardedTeleop,
    /// Tick is a no-op.
    #[default]
    Disabled,
}

/// Numeric mode as used by the stock firmware's `set-mode` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidMode(pub u8);

impl TryFrom<u8> for Mode {
    type Error = InvalidMode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Mode::Disabled),
            1 => Ok(Mode::Autonomous),
            2 => Ok(Mode::GuardedTeleop),
            other => Err(InvalidMode(other)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocomotionState {
    #[default]
    Forward,
    SpinLeft,
    SpinRight,
}

/// Per-channel detection flags for one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Detections([bool; CHANNEL_COUNT]);

impl Detections {
    pub const NONE: Detections = Detections([false; CHANNEL_COUNT]);

    #[inline]
    pub fn get(
        &self,
        channel: Channel,
    ) -> bool {
        self.0[usize::from(channel.index() - 1)]
    }

    pub fn set(
        &mut self,
        channel: Channel,
        detected: bool,
    ) {
        self.0[usize::from(channel.index() - 1)] = detected;
    }

    /// Whether any channel in `set` detected.
    pub fn any_in(
        &self,
        set: ChannelSet,
    ) -> bool {
        set.iter().any(|c| self.get(c))
    }

    pub fn flags(&self) -> [bool; CHANNEL_COUNT] {
        self.0
    }
}

/// Result of one control tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// State the machine moved to; its action is applied next tick.
    Autonomous(LocomotionState),
    /// `checked` is false on ticks between guard polls.
    Guarded { checked: bool, tripped: bool },
    Idle,
}

#[derive(Debug)]
pub enum TickError<ME, SE> {
    Motor(ME),
    Sensor(SE),
}

pub struct AvoidanceController {
    state: LocomotionState,
    guard_counter: u16,
}

impl Default for AvoidanceController {
    fn default() -> Self {
        Self::new()
    }
}

impl AvoidanceController {
    pub const fn new() -> Self {
        Self {
            state: LocomotionState::Forward,
            guard_counter: 0,
        }
    }

    /// State whose action the next tick applies.
    pub fn state(&self) -> LocomotionState {
        self.state
    }

    /// Back to `Forward` with the guard counter cleared.
    pub fn reset(&mut self) {
        self.state = LocomotionState::Forward;
        self.guard_counter = 0;
    }

    /// Transition rule; see the module table.
    pub fn decide(
        detections: &Detections,
        config: &AvoidanceConfig,
    ) -> LocomotionState {
        if detections.any_in(config.front) {
            LocomotionState::SpinLeft
        } else if detections.get(config.left_boundary) {
            LocomotionState::SpinRight
        } else if detections.get(config.right_boundary) {
            LocomotionState::SpinLeft
        } else {
            LocomotionState::Forward
        }
    }

    /// Drive the motors for `state`.
    pub fn apply<M: Drive>(
        state: LocomotionState,
        config: &AvoidanceConfig,
        motors: &mut M,
    ) -> Result<(), M::Error> {
        match state {
            LocomotionState::Forward => motors.forward(config.cruise_speed),
            LocomotionState::SpinLeft => motors.spin_left(config.rotate_speed),
            LocomotionState::SpinRight => motors.spin_right(config.rotate_speed),
        }
    }

    /// Sample every channel against the configured threshold.
    pub fn sense<S: ProximityArray>(
        config: &AvoidanceConfig,
        sensors: &mut S,
    ) -> Result<Detections, S::Error> {
        let mut detections = Detections::NONE;
        for channel in Channel::ALL {
            detections.set(channel, sensors.detect(channel, config.threshold)?);
        }
        Ok(detections)
    }

    /// Run one control tick in the configured mode.
    pub fn tick<M: Drive, S: ProximityArray>(
        &mut self,
        config: &AvoidanceConfig,
        motors: &mut M,
        sensors: &mut S,
    ) -> Result<TickOutcome, TickError<M::Error, S::Error>> {
        match config.mode {
            Mode::Autonomous => self.step(config, motors, sensors).map(TickOutcome::Autonomous),
            Mode::GuardedTeleop => self.guard(config, motors, sensors),
            Mode::Disabled => Ok(TickOutcome::Idle),
        }
    }

    fn step<M: Drive, S: ProximityArray>(
        &mut self,
        config: &AvoidanceConfig,
        motors: &mut M,
        sensors: &mut S,
    ) -> Result<LocomotionState, TickError<M::Error, S::Error>> {
        Self::apply(self.state, config, motors).map_err(TickError::Motor)?;
        let detections = Self::sense(config, sensors).map_err(TickError::Sensor)?;
        let next = Self::decide(&detections, config);
        if next != self.state {
            tracing::debug!(from = ?self.state, to = ?next, flags = ?detections.flags(), "avoidance transition");
        }
        self.state = next;
        Ok(next)
    }

    fn guard<M: Drive, S: ProximityArray>(
        &mut self,
        config: &AvoidanceConfig,
        motors: &mut M,
        sensors: &mut S,
    ) -> Result<TickOutcome, TickError<M::Error, S::Error>> {
        self.guard_counter += 1;
        if self.guard_counter < config.guard_period() {
            return Ok(TickOutcome::Guarded {
                checked: false,
                tripped: false,
            });
        }
        self.guard_counter = 0;

        let mut tripped = false;
        for channel in config.front.iter() {
            if sensors
                .detect(channel, config.threshold)
                .map_err(TickError::Sensor)?
            {
                tripped = true;
                break;
            }
        }
        if tripped {
            motors.stop_all().map_err(TickError::Motor)?;
            tracing::info!("Obstacle ahead, guard stopped motors");
        }
        Ok(TickOutcome::Guarded {
            checked: true,
            tripped,
        })
    }
}
