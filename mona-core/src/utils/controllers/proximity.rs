//! Reflective proximity sensing.
//!
//! Five IR emitter/receiver pairs sit around the front half of the robot. Emitters
//! are switched through the MCP23008 expander and receivers are sampled by the
//! ADS7830. A reading takes one sample with the emitter dark and one lit; the
//! difference cancels ambient light and is what the avoidance logic thresholds.

use core::{cell::RefCell, fmt};

use embedded_hal::{delay::DelayNs, i2c::I2c};
use embedded_hal_bus::i2c::RefCellDevice;
use serde::{
    de::{self, SeqAccess, Visitor},
    ser::SerializeSeq,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::utils::{
    config::DEFAULT_SETTLE_US,
    drivers::{ads7830, mcp23008, Ads7830, Mcp23008},
};

/// Number of proximity channels.
pub const CHANNEL_COUNT: usize = 5;

/// `(expander pin, ADC input)` for channels 1..=5.
const CHANNEL_MAP: [(u8, u8); CHANNEL_COUNT] = [(4, 7), (3, 6), (2, 5), (1, 4), (0, 0)];

/// Expander pins wired to emitters.
const EMITTER_PINS: u8 = 0b0001_1111;

/// Channel index outside `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidChannel(pub u8);

impl fmt::Display for InvalidChannel {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "invalid proximity channel {}", self.0)
    }
}

/// One of the five proximity sensors, numbered left to right from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Channel(u8);

impl Channel {
    pub const LEFT: Channel = Channel(1);
    pub const LEFT_DIAGONAL: Channel = Channel(2);
    pub const FRONT: Channel = Channel(3);
    pub const RIGHT_DIAGONAL: Channel = Channel(4);
    pub const RIGHT: Channel = Channel(5);

    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::LEFT,
        Channel::LEFT_DIAGONAL,
        Channel::FRONT,
        Channel::RIGHT_DIAGONAL,
        Channel::RIGHT,
    ];

    pub const fn new(index: u8) -> Result<Self, InvalidChannel> {
        if index >= 1 && index as usize <= CHANNEL_COUNT {
            Ok(Channel(index))
        } else {
            Err(InvalidChannel(index))
        }
    }

    /// 1-based channel number.
    #[inline]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Expander pin driving this channel's emitter.
    #[inline]
    pub const fn enable_pin(self) -> u8 {
        CHANNEL_MAP[self.slot()].0
    }

    /// ADC input sampling this channel's receiver.
    #[inline]
    pub const fn adc_input(self) -> u8 {
        CHANNEL_MAP[self.slot()].1
    }

    #[inline]
    const fn slot(self) -> usize {
        self.0 as usize - 1
    }
}

impl TryFrom<u8> for Channel {
    type Error = InvalidChannel;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Channel::new(index)
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> u8 {
        channel.0
    }
}

/// A set of channels, serialized as a list of channel numbers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSet(u8);

impl ChannelSet {
    pub const EMPTY: ChannelSet = ChannelSet(0);
    /// Left diagonal, front and right diagonal.
    pub const FRONT: ChannelSet = ChannelSet(0b01110);
    /// Front, right diagonal and right; the alternate firmware grouping.
    pub const FRONT_RIGHT: ChannelSet = ChannelSet(0b11100);

    pub const fn with(
        self,
        channel: Channel,
    ) -> Self {
        ChannelSet(self.0 | (1 << channel.slot()))
    }

    #[inline]
    pub const fn contains(
        self,
        channel: Channel,
    ) -> bool {
        self.0 & (1 << channel.slot()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Members in ascending channel order.
    pub fn iter(self) -> impl Iterator<Item = Channel> {
        Channel::ALL.into_iter().filter(move |&c| self.contains(c))
    }
}

impl FromIterator<Channel> for ChannelSet {
    fn from_iter<T: IntoIterator<Item = Channel>>(iter: T) -> Self {
        iter.into_iter().fold(ChannelSet::EMPTY, ChannelSet::with)
    }
}

impl Serialize for ChannelSet {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let members = self.iter().count();
        let mut seq = serializer.serialize_seq(Some(members))?;
        for channel in self.iter() {
            seq.serialize_element(&channel)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ChannelSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SetVisitor;

        impl<'de> Visitor<'de> for SetVisitor {
            type Value = ChannelSet;

            fn expecting(
                &self,
                f: &mut fmt::Formatter<'_>,
            ) -> fmt::Result {
                f.write_str("a list of proximity channel numbers 1..=5")
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> Result<Self::Value, A::Error> {
                let mut set = ChannelSet::EMPTY;
                while let Some(index) = seq.next_element::<u8>()? {
                    let channel = Channel::new(index).map_err(de::Error::custom)?;
                    set = set.with(channel);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_seq(SetVisitor)
    }
}

/// Both samples of one differential reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProximityReading {
    pub channel: Channel,
    pub ambient: u8,
    pub illuminated: u8,
    /// `|illuminated - ambient|`; larger means a closer or brighter object.
    pub response: u8,
}

impl ProximityReading {
    pub fn new(
        channel: Channel,
        ambient: u8,
        illuminated: u8,
    ) -> Self {
        Self {
            channel,
            ambient,
            illuminated,
            response: illuminated.abs_diff(ambient),
        }
    }
}

/// The proximity sensor ring as seen by the avoidance controller.
pub trait ProximityArray {
    type Error: core::fmt::Debug;

    /// One sample with the emitter off.
    fn read_ambient(
        &mut self,
        channel: Channel,
    ) -> Result<u8, Self::Error>;

    /// Ambient-cancelled response.
    fn read_differential(
        &mut self,
        channel: Channel,
    ) -> Result<u8, Self::Error>;

    /// Change the emitter settle time. Arrays without an emitter delay ignore it.
    fn set_settle_us(
        &mut self,
        _settle_us: u32,
    ) {
    }

    /// Whether the response exceeds `threshold`.
    fn detect(
        &mut self,
        channel: Channel,
        threshold: u8,
    ) -> Result<bool, Self::Error> {
        Ok(self.read_differential(channel)? > threshold)
    }
}

/// Errors from the I2C-backed sensor ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError<E: core::fmt::Debug> {
    /// Channel index outside `1..=5`; nothing was sampled.
    InvalidChannel(u8),
    Bus(E),
}

impl<E: core::fmt::Debug> From<InvalidChannel> for SensorError<E> {
    fn from(err: InvalidChannel) -> Self {
        SensorError::InvalidChannel(err.0)
    }
}

/// Sensor ring built from the expander and ADC on a shared I2C bus.
pub struct ProximitySensor<'a, I2C: 'static, D> {
    expander: Mcp23008<RefCellDevice<'a, I2C>>,
    adc: Ads7830<RefCellDevice<'a, I2C>>,
    delay: D,
    settle_us: u32,
}

impl<'a, I2C, E, D> ProximitySensor<'a, I2C, D>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
    D: DelayNs,
{
    /// Create the sensor ring on the default expander and ADC addresses.
    pub fn new(
        i2c_bus: &'a RefCell<I2C>,
        delay: D,
    ) -> Self {
        ProximitySensor {
            expander: Mcp23008::new(RefCellDevice::new(i2c_bus), mcp23008::DEFAULT_ADDRESS),
            adc: Ads7830::new(RefCellDevice::new(i2c_bus), ads7830::DEFAULT_ADDRESS),
            delay,
            settle_us: DEFAULT_SETTLE_US,
        }
    }

    /// Override the emitter settle time.
    pub fn with_settle_us(
        mut self,
        settle_us: u32,
    ) -> Self {
        self.settle_us = settle_us;
        self
    }

    pub fn settle_us(&self) -> u32 {
        self.settle_us
    }

    /// Configure the emitter pins as outputs and switch every emitter off.
    pub fn init(&mut self) -> Result<(), SensorError<E>> {
        self.expander
            .init(EMITTER_PINS)
            .map_err(SensorError::Bus)?;
        tracing::info!("Proximity emitters configured");
        Ok(())
    }

    pub fn enable_emitter(
        &mut self,
        channel: Channel,
    ) -> Result<(), SensorError<E>> {
        self.expander
            .set_pin(channel.enable_pin(), true)
            .map_err(SensorError::Bus)
    }

    pub fn disable_emitter(
        &mut self,
        channel: Channel,
    ) -> Result<(), SensorError<E>> {
        self.expander
            .set_pin(channel.enable_pin(), false)
            .map_err(SensorError::Bus)
    }

    fn sample(
        &mut self,
        channel: Channel,
    ) -> Result<u8, SensorError<E>> {
        self.adc
            .read_single_ended(channel.adc_input())
            .map_err(SensorError::Bus)
    }

    /// Take a full dark/lit reading on `channel`.
    ///
    /// The emitter is switched off again even if the lit sample fails, and the
    /// sample error is the one returned.
    pub fn read(
        &mut self,
        channel: Channel,
    ) -> Result<ProximityReading, SensorError<E>> {
        let ambient = self.sample(channel)?;
        self.enable_emitter(channel)?;
        self.delay.delay_us(self.settle_us);
        let illuminated = self.sample(channel);
        let disabled = self.disable_emitter(channel);
        match (illuminated, disabled) {
            (Ok(illuminated), Ok(())) => Ok(ProximityReading::new(channel, ambient, illuminated)),
            (Err(e), Ok(())) | (Ok(_), Err(e)) => Err(e),
            (Err(e), Err(stuck)) => {
                tracing::error!(channel = channel.index(), "Emitter left on: {:?}", stuck);
                Err(e)
            }
        }
    }

    /// `read` addressed by raw channel number.
    ///
    /// Numbers outside `1..=5` yield `SensorError::InvalidChannel` without
    /// touching the bus.
    pub fn read_index(
        &mut self,
        index: u8,
    ) -> Result<ProximityReading, SensorError<E>> {
        let channel = Channel::new(index)?;
        self.read(channel)
    }
}

impl<'a, I2C, E, D> ProximityArray for ProximitySensor<'a, I2C, D>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
    D: DelayNs,
{
    type Error = SensorError<E>;

    fn read_ambient(
        &mut self,
        channel: Channel,
    ) -> Result<u8, Self::Error> {
        self.sample(channel)
    }

    fn read_differential(
        &mut self,
        channel: Channel,
    ) -> Result<u8, Self::Error> {
        Ok(self.read(channel)?.response)
    }

    fn set_settle_us(
        &mut self,
        settle_us: u32,
    ) {
        self.settle_us = settle_us;
    }
}
