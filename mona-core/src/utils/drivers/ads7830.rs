//! ADS7830 8-channel, 8-bit I2C ADC.
//!
//! Conversions are single-ended with the internal reference off and the converter
//! left powered between samples.

use embedded_hal::i2c::I2c;

/// Address with A0/A1 tied low.
pub const DEFAULT_ADDRESS: u8 = 0x48;

/// Command byte fields.
pub mod cmd {
    /// SD = 1: single-ended inputs.
    pub const SINGLE_ENDED: u8 = 1 << 7;
    /// PD1:PD0 = 01: internal reference off, converter on.
    pub const REF_OFF_ADC_ON: u8 = 0b01 << 2;
}

/// Build the command byte selecting single-ended `input` (0..=7).
///
/// The channel-select bits are not in input order: C2 carries the input's low
/// bit, C1:C0 its upper two bits.
#[inline]
pub const fn command(input: u8) -> u8 {
    let input = input & 0x07;
    let select = (input >> 1) | ((input & 0x01) << 2);
    cmd::SINGLE_ENDED | (select << 4) | cmd::REF_OFF_ADC_ON
}

pub struct Ads7830<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Ads7830<I2C> {
    pub fn new(
        i2c: I2C,
        address: u8,
    ) -> Self {
        Self { i2c, address }
    }

    /// Run one single-ended conversion on `input` and return the 8-bit result.
    pub fn read_single_ended(
        &mut self,
        input: u8,
    ) -> Result<u8, I2C::Error> {
        let mut buf = [0u8];
        self.i2c
            .write_read(self.address, &[command(input)], &mut buf)?;
        Ok(buf[0])
    }
}
