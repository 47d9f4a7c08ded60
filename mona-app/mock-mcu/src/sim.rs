//! Simulated board peripherals for running the core on a host.

use std::convert::Infallible;

use embedded_hal::{
    i2c::{self, ErrorKind, NoAcknowledgeSource, Operation},
    pwm,
};
use mona_core::utils::{
    controllers::{
        orientation::{Attitude, Orientation, OrientationSource},
        power::BatterySource,
        proximity::Channel,
    },
    drivers::{ads7830, mcp23008},
    Instant,
};
use smart_leds_trait::{SmartLedsWrite, RGB8};
use tracing::{debug, info, trace};

/// A window during which an object sits in front of one sensor.
#[derive(Debug, Clone, Copy)]
pub struct Obstacle {
    pub channel: Channel,
    pub from_ms: u64,
    pub to_ms: u64,
}

impl Obstacle {
    /// Parse `CHANNEL:FROM-TO`, times in milliseconds since start.
    pub fn parse(s: &str) -> Result<Self, String> {
        let (channel, window) = s
            .split_once(':')
            .ok_or_else(|| format!("expected CHANNEL:FROM-TO, got {s:?}"))?;
        let (from, to) = window
            .split_once('-')
            .ok_or_else(|| format!("expected FROM-TO window, got {window:?}"))?;
        let index: u8 = channel.parse().map_err(|e| format!("channel: {e}"))?;
        let channel = Channel::new(index).map_err(|e| e.to_string())?;
        let from_ms = from.parse().map_err(|e| format!("from: {e}"))?;
        let to_ms = to.parse().map_err(|e| format!("to: {e}"))?;
        if to_ms < from_ms {
            return Err(format!("window ends before it starts: {window}"));
        }
        Ok(Obstacle {
            channel,
            from_ms,
            to_ms,
        })
    }

    fn active(
        &self,
        at_ms: u64,
    ) -> bool {
        (self.from_ms..=self.to_ms).contains(&at_ms)
    }
}

/// Baseline ambient level on every receiver.
const AMBIENT: u8 = 60;
/// Extra counts returned by a lit emitter with nothing in front.
const OPEN_REFLECTION: u8 = 10;
/// Extra counts returned by a lit emitter facing an obstacle.
const OBSTACLE_REFLECTION: u8 = 90;

/// I2C bus with an MCP23008 and an ADS7830 behind it.
pub struct SimBus {
    start: Instant,
    obstacles: Vec<Obstacle>,
    iodir: u8,
    latch: u8,
    adc_input: Option<u8>,
}

impl SimBus {
    pub fn new(obstacles: Vec<Obstacle>) -> Self {
        Self {
            start: Instant::now(),
            obstacles,
            iodir: 0xFF,
            latch: 0,
            adc_input: None,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        Instant::now().duration_since(self.start).as_millis()
    }

    fn sample(
        &self,
        input: u8,
    ) -> u8 {
        let now = self.elapsed_ms();
        // A little flicker so ambient cancellation has something to cancel.
        let ambient = AMBIENT + (now % 7) as u8;
        let Some(channel) = Channel::ALL.into_iter().find(|c| c.adc_input() == input) else {
            return ambient;
        };
        let lit = self.latch & !self.iodir & (1 << channel.enable_pin()) != 0;
        if !lit {
            return ambient;
        }
        let blocked = self
            .obstacles
            .iter()
            .any(|o| o.channel == channel && o.active(now));
        ambient + if blocked { OBSTACLE_REFLECTION } else { OPEN_REFLECTION }
    }

    fn expander(
        &mut self,
        operations: &mut [Operation<'_>],
    ) -> Result<(), ErrorKind> {
        let mut register = None;
        for op in operations {
            match op {
                Operation::Write([reg, value, ..]) => {
                    match *reg {
                        mcp23008::reg::IODIR => self.iodir = *value,
                        mcp23008::reg::OLAT | mcp23008::reg::GPIO => {
                            self.latch = *value;
                            trace!("emitter latch {:#010b}", self.latch);
                        }
                        _ => {}
                    }
                }
                Operation::Write([reg]) => register = Some(*reg),
                Operation::Write([]) => {}
                Operation::Read(buf) => {
                    let value = match register {
                        Some(mcp23008::reg::IODIR) => self.iodir,
                        _ => self.latch,
                    };
                    buf.fill(value);
                }
            }
        }
        Ok(())
    }

    fn adc(
        &mut self,
        operations: &mut [Operation<'_>],
    ) -> Result<(), ErrorKind> {
        for op in operations {
            match op {
                Operation::Write([cmd, ..]) => {
                    let select = (*cmd >> 4) & 0x07;
                    self.adc_input = Some(((select & 0x03) << 1) | (select >> 2));
                }
                Operation::Write([]) => {}
                Operation::Read(buf) => {
                    let input = self.adc_input.ok_or(ErrorKind::Other)?;
                    let value = self.sample(input);
                    buf.fill(value);
                }
            }
        }
        Ok(())
    }
}

impl i2c::ErrorType for SimBus {
    type Error = ErrorKind;
}

impl i2c::I2c for SimBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        match address {
            mcp23008::DEFAULT_ADDRESS => self.expander(operations),
            ads7830::DEFAULT_ADDRESS => self.adc(operations),
            _ => Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)),
        }
    }
}

/// One motor PWM output that logs duty changes.
pub struct SimPwm {
    name: &'static str,
    duty: u16,
}

impl SimPwm {
    pub fn new(name: &'static str) -> Self {
        Self { name, duty: 0 }
    }
}

impl pwm::ErrorType for SimPwm {
    type Error = Infallible;
}

impl pwm::SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        // 8-bit LEDC resolution on the real board.
        255
    }

    fn set_duty_cycle(
        &mut self,
        duty: u16,
    ) -> Result<(), Self::Error> {
        if duty != self.duty {
            debug!(pin = self.name, duty, "PWM");
            self.duty = duty;
        }
        Ok(())
    }
}

/// Single WS2812 that prints its colour.
pub struct SimLed(pub u8);

impl SmartLedsWrite for SimLed {
    type Error = Infallible;
    type Color = RGB8;

    fn write<T, I>(
        &mut self,
        iterator: T,
    ) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        for c in iterator {
            let c: RGB8 = c.into();
            info!("LED {}: ({}, {}, {})", self.0, c.r, c.g, c.b);
        }
        Ok(())
    }
}

/// Battery divider reading a fixed raw value.
pub struct SimBattery(pub u16);

impl BatterySource for SimBattery {
    fn raw_sample(&mut self) -> u16 {
        self.0
    }
}

/// IMU sitting level on the bench, slowly drifting in heading.
#[derive(Default)]
pub struct SimImu {
    heading: f32,
}

impl OrientationSource for SimImu {
    fn orientation(&mut self) -> Option<Orientation> {
        self.heading = (self.heading + 0.5) % 360.0;
        let level = Attitude {
            heading: self.heading,
            pitch: 0.0,
            roll: 0.0,
        };
        Some(Orientation {
            accel: level,
            mag: level,
            gyro: Attitude::default(),
            temperature: 24.5,
        })
    }
}
