//! Runtime configuration for the control layer.
//!
//! Every field has a default matching the stock Mona firmware, and every struct is
//! `#[serde(default)]`, so a host can deserialize a partial document (for example
//! only `{"avoidance": {"threshold": 50}}`) and get sensible values for the rest.

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::utils::controllers::{
    avoidance::Mode,
    proximity::{Channel, ChannelSet},
};

/// Detection threshold applied to the differential response.
pub const DEFAULT_THRESHOLD: u8 = 35;
/// Duty cycle for straight-line cruising.
pub const DEFAULT_CRUISE_SPEED: u8 = 150;
/// Duty cycle for in-place spins.
pub const DEFAULT_ROTATE_SPEED: u8 = 100;
/// Lower bound on the control period; keeps sensor polling off the bus.
pub const MIN_TICK_INTERVAL_MS: u64 = 5;
/// Upper bound on the control period.
pub const MAX_TICK_INTERVAL_MS: u64 = 60_000;
/// Emitter settle time before the illuminated sample.
pub const DEFAULT_SETTLE_US: u32 = 1_000;
/// In guarded teleop, the front sensors are polled once every this many ticks.
pub const DEFAULT_GUARD_PERIOD_TICKS: u16 = 4;

/// Top-level configuration handed to the `SystemController`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub avoidance: AvoidanceConfig,
    pub sensor: SensorConfig,
    /// Key used in the liveness reply. Firmware variants disagree on the name.
    pub liveness_key: LivenessKey,
}

/// Avoidance state machine tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidanceConfig {
    pub mode: Mode,
    pub threshold: u8,
    /// Channels whose detection turns the robot left. Variants ship either
    /// `[2, 3, 4]` (default) or `[3, 4, 5]`.
    pub front: ChannelSet,
    pub left_boundary: Channel,
    pub right_boundary: Channel,
    pub cruise_speed: u8,
    pub rotate_speed: u8,
    pub tick_interval_ms: u64,
    pub guard_period_ticks: u16,
}

impl Default for AvoidanceConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Disabled,
            threshold: DEFAULT_THRESHOLD,
            front: ChannelSet::FRONT,
            left_boundary: Channel::LEFT,
            right_boundary: Channel::RIGHT,
            cruise_speed: DEFAULT_CRUISE_SPEED,
            rotate_speed: DEFAULT_ROTATE_SPEED,
            tick_interval_ms: MIN_TICK_INTERVAL_MS,
            guard_period_ticks: DEFAULT_GUARD_PERIOD_TICKS,
        }
    }
}

impl AvoidanceConfig {
    /// Control period, clamped to `MIN_TICK_INTERVAL_MS..=MAX_TICK_INTERVAL_MS`.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(
            self.tick_interval_ms
                .clamp(MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS),
        )
    }

    /// Guard polling period in ticks; zero is treated as every tick.
    pub fn guard_period(&self) -> u16 {
        self.guard_period_ticks.max(1)
    }
}

/// Proximity sensor tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub settle_us: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            settle_us: DEFAULT_SETTLE_US,
        }
    }
}

/// Name of the boolean field in the liveness reply.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessKey {
    #[default]
    Awake,
    Reply,
}

impl LivenessKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            LivenessKey::Awake => "awake",
            LivenessKey::Reply => "reply",
        }
    }
}
