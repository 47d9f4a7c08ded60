//! Module Exports
//!
//! This file exports the controllers of the sensing-and-actuation layer and the
//! `SystemController` that owns them.
//!
//! - `motors`: differential drive over four PWM outputs.
//! - `proximity`: ambient-cancelled IR proximity ring.
//! - `power`: battery percentage from a raw ADC sample.
//! - `leds`: the two RGB indicator units.
//! - `orientation`: optional IMU snapshot for the state report.
//! - `avoidance`: the obstacle avoidance state machine.

pub mod avoidance;
pub mod leds;
pub mod motors;
pub mod orientation;
pub mod power;
pub mod proximity;

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use smart_leds_trait::{SmartLedsWrite, RGB8};

pub use avoidance::{AvoidanceController, LocomotionState, Mode, TickError, TickOutcome};
pub use leds::{Indicator, IndicatorError};
pub use motors::{Drive, Drivetrain, Side, Wheel, WheelCommand};
pub use orientation::{NoOrientation, Orientation, OrientationSource};
pub use power::{battery_percentage, BatteryReport, BatterySource, PowerMonitor};
pub use proximity::{ChannelSet, ProximityArray, ProximitySensor, SensorError, CHANNEL_COUNT};

use crate::utils::config::{Config, LivenessKey};

/// Channel used to receive host commands (`SystemCommand` messages).
pub static COMMAND_CHANNEL: Channel<CriticalSectionRawMutex, SystemCommand, 16> = Channel::new();

/// Channel carrying replies to query commands back to the host.
pub static REPLY_CHANNEL: Channel<CriticalSectionRawMutex, Reply, 4> = Channel::new();

/// Host command variants.
///
/// Serialized with tag `"ct"` (command type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ct", rename_all = "snake_case")]
pub enum SystemCommand {
    /// Signed per-wheel speeds; an absent side is left untouched.
    Motors { left: Option<i32>, right: Option<i32> },
    /// Stop both wheels.
    Stop,
    /// Colour one indicator unit.
    Led { unit: u8, r: i32, g: i32, b: i32 },
    /// Colour both indicator units.
    Leds { r: i32, g: i32, b: i32 },
    SetMode { mode: Mode },
    SetThreshold { threshold: u8 },
    SetFrontGroup { front: ChannelSet },
    /// IR levels plus battery and orientation.
    GetState,
    /// IR levels only.
    GetIr,
    CheckAwake,
}

/// Replies to query commands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    State(StateReport),
    Liveness(LivenessReply),
}

/// Snapshot of the sensing layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StateReport {
    /// Differential response per channel, left to right; failed reads are 0.
    pub ir: [u8; CHANNEL_COUNT],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<BatteryReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    pub mode: Mode,
    pub state: LocomotionState,
}

/// `{"<key>": true}`, with the key chosen by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessReply {
    pub key: LivenessKey,
}

impl Serialize for LivenessReply {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.key.as_str(), &true)?;
        map.end()
    }
}

/// Sole owner of the robot's actuators and sensors.
///
/// Host commands and the avoidance tick both write the motors through this type,
/// so it is the one arbitration point: whichever write came last is what the
/// wheels do. In `Autonomous` mode a `Motors` command therefore only lasts until
/// the next tick re-applies the current state.
pub struct SystemController<M, S, L, B, O = NoOrientation> {
    pub motors: M,
    pub sensors: S,
    pub indicator: Indicator<L>,
    pub battery: PowerMonitor<B>,
    pub orientation: O,
    avoidance: AvoidanceController,
    config: Config,
}

impl<M, S, L, B> SystemController<M, S, L, B>
where
    M: Drive,
    S: ProximityArray,
    L: SmartLedsWrite<Color = RGB8>,
    L::Error: core::fmt::Debug,
    B: BatterySource,
{
    /// Take ownership of the hardware, stop the wheels and blank the indicators.
    ///
    /// The sensor settle time is taken from `config`. Attach an IMU with
    /// `with_orientation`.
    pub fn new(
        motors: M,
        sensors: S,
        indicator: Indicator<L>,
        battery: PowerMonitor<B>,
        config: Option<Config>,
    ) -> Self {
        let mut ctrl = SystemController {
            motors,
            sensors,
            indicator,
            battery,
            orientation: NoOrientation,
            avoidance: AvoidanceController::new(),
            config: config.unwrap_or_default(),
        };

        ctrl.sensors.set_settle_us(ctrl.config.sensor.settle_us);
        if let Err(e) = ctrl.motors.stop_all() {
            tracing::warn!("Motor stop at startup failed: {:?}", e);
        }
        if let Err(e) = ctrl.indicator.clear() {
            tracing::warn!("Indicator clear at startup failed: {:?}", e);
        }
        tracing::info!(mode = ?ctrl.config.avoidance.mode, "System controller ready");
        ctrl
    }
}

impl<M, S, L, B, O> SystemController<M, S, L, B, O>
where
    M: Drive,
    S: ProximityArray,
    L: SmartLedsWrite<Color = RGB8>,
    L::Error: core::fmt::Debug,
    B: BatterySource,
    O: OrientationSource,
{
    /// Replace the orientation source used by the full state report.
    pub fn with_orientation<O2: OrientationSource>(
        self,
        orientation: O2,
    ) -> SystemController<M, S, L, B, O2> {
        SystemController {
            motors: self.motors,
            sensors: self.sensors,
            indicator: self.indicator,
            battery: self.battery,
            orientation,
            avoidance: self.avoidance,
            config: self.config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the configuration, resetting the state machine if the mode changed.
    pub fn set_config(
        &mut self,
        config: Config,
    ) {
        let mode = config.avoidance.mode;
        self.sensors.set_settle_us(config.sensor.settle_us);
        self.config = Config {
            avoidance: crate::utils::config::AvoidanceConfig {
                mode: self.config.avoidance.mode,
                ..config.avoidance
            },
            ..config
        };
        self.set_mode(mode);
    }

    pub fn mode(&self) -> Mode {
        self.config.avoidance.mode
    }

    /// Switch mode. A change resets the state machine and stops the wheels.
    pub fn set_mode(
        &mut self,
        mode: Mode,
    ) {
        if mode == self.config.avoidance.mode {
            return;
        }
        tracing::info!(from = ?self.config.avoidance.mode, to = ?mode, "Mode change");
        self.config.avoidance.mode = mode;
        self.avoidance.reset();
        if let Err(e) = self.motors.stop_all() {
            tracing::error!("Motor stop on mode change failed: {:?}", e);
        }
    }

    pub fn set_threshold(
        &mut self,
        threshold: u8,
    ) {
        self.config.avoidance.threshold = threshold;
    }

    pub fn set_front_group(
        &mut self,
        front: ChannelSet,
    ) {
        if front.is_empty() {
            tracing::warn!("Empty front group: only boundary channels will steer");
        }
        self.config.avoidance.front = front;
    }

    /// State whose action the next autonomous tick applies.
    pub fn locomotion_state(&self) -> LocomotionState {
        self.avoidance.state()
    }

    /// Run one control tick.
    ///
    /// On a hardware fault the wheels are stopped before the error is returned.
    pub fn tick(&mut self) -> Result<TickOutcome, TickError<M::Error, S::Error>> {
        let result = self
            .avoidance
            .tick(&self.config.avoidance, &mut self.motors, &mut self.sensors);
        if result.is_err() {
            if let Err(e) = self.motors.stop_all() {
                tracing::error!("Failsafe motor stop failed: {:?}", e);
            }
        }
        result
    }

    /// Differential response of every channel; failed reads report 0.
    pub fn ir_levels(&mut self) -> [u8; CHANNEL_COUNT] {
        proximity::Channel::ALL.map(|channel| {
            self.sensors
                .read_differential(channel)
                .unwrap_or_else(|e| {
                    tracing::warn!(channel = channel.index(), "IR read failed: {:?}", e);
                    0
                })
        })
    }

    /// IR levels, plus battery and orientation when `full`.
    pub fn state_report(
        &mut self,
        full: bool,
    ) -> StateReport {
        StateReport {
            ir: self.ir_levels(),
            battery: full.then(|| self.battery.report()),
            orientation: if full {
                self.orientation.orientation()
            } else {
                None
            },
            mode: self.config.avoidance.mode,
            state: self.avoidance.state(),
        }
    }

    pub fn liveness(&self) -> LivenessReply {
        LivenessReply {
            key: self.config.liveness_key,
        }
    }

    /// Apply a host command. Queries produce a reply.
    pub fn handle_command(
        &mut self,
        command: SystemCommand,
    ) -> Option<Reply> {
        tracing::info!("Received command: {:?}", command);
        match command {
            SystemCommand::Motors { left, right } => {
                for (side, speed) in [(Side::Left, left), (Side::Right, right)] {
                    if let Some(speed) = speed {
                        if let Err(e) = self.motors.drive(side, speed) {
                            tracing::error!(?side, "Motor command failed: {:?}", e);
                        }
                    }
                }
                None
            }
            SystemCommand::Stop => {
                if let Err(e) = self.motors.stop_all() {
                    tracing::error!("Motor stop failed: {:?}", e);
                }
                None
            }
            SystemCommand::Led { unit, r, g, b } => {
                if let Err(e) = self.indicator.set_color(unit, r, g, b) {
                    tracing::warn!("LED command failed: {:?}", e);
                }
                None
            }
            SystemCommand::Leds { r, g, b } => {
                if let Err(e) = self.indicator.set_all(r, g, b) {
                    tracing::warn!("LED command failed: {:?}", e);
                }
                None
            }
            SystemCommand::SetMode { mode } => {
                self.set_mode(mode);
                None
            }
            SystemCommand::SetThreshold { threshold } => {
                self.set_threshold(threshold);
                None
            }
            SystemCommand::SetFrontGroup { front } => {
                self.set_front_group(front);
                None
            }
            SystemCommand::GetState => Some(Reply::State(self.state_report(true))),
            SystemCommand::GetIr => Some(Reply::State(self.state_report(false))),
            SystemCommand::CheckAwake => Some(Reply::Liveness(self.liveness())),
        }
    }

    /// Control task body: drain pending commands, tick, sleep for the tick
    /// interval, forever.
    pub async fn control_loop(&mut self) -> ! {
        loop {
            while let Ok(command) = COMMAND_CHANNEL.try_receive() {
                if let Some(reply) = self.handle_command(command) {
                    if REPLY_CHANNEL.try_send(reply).is_err() {
                        tracing::warn!("Reply channel full, dropping reply");
                    }
                }
            }

            match self.tick() {
                Ok(TickOutcome::Guarded { tripped: true, .. }) => {
                    tracing::warn!("Guard tripped");
                }
                Ok(outcome) => tracing::trace!(?outcome, "tick"),
                Err(e) => tracing::error!("Control tick failed, motors stopped: {:?}", e),
            }

            embassy_time::Timer::after(self.config.avoidance.tick_interval()).await;
        }
    }
}
