//! MCP23008 8-bit I2C GPIO expander.
//!
//! Only the output path is used: the proximity emitters hang off pins 0..=4. The
//! driver keeps a shadow copy of the output latch so single pins can be toggled
//! without a read-modify-write on the bus.

use embedded_hal::i2c::I2c;

/// Address with A0..A2 tied low.
pub const DEFAULT_ADDRESS: u8 = 0x20;

// Register addresses (IOCON.BANK = 0)
pub mod reg {
    pub const IODIR: u8 = 0x00;
    pub const GPIO: u8 = 0x09;
    pub const OLAT: u8 = 0x0A;
}

pub struct Mcp23008<I2C> {
    i2c: I2C,
    address: u8,
    olat: u8,
}

impl<I2C: I2c> Mcp23008<I2C> {
    pub fn new(
        i2c: I2C,
        address: u8,
    ) -> Self {
        Self {
            i2c,
            address,
            olat: 0,
        }
    }

    /// Configure the pins in `outputs` as outputs (the rest as inputs) and drive
    /// every output low.
    pub fn init(
        &mut self,
        outputs: u8,
    ) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[reg::IODIR, !outputs])?;
        self.write_latch(0)
    }

    /// Drive a single output pin high or low.
    pub fn set_pin(
        &mut self,
        pin: u8,
        high: bool,
    ) -> Result<(), I2C::Error> {
        let mask = 1u8 << (pin & 0x07);
        let latch = if high {
            self.olat | mask
        } else {
            self.olat & !mask
        };
        self.write_latch(latch)
    }

    /// Last value written to the output latch.
    #[inline]
    pub fn latch(&self) -> u8 {
        self.olat
    }

    fn write_latch(
        &mut self,
        value: u8,
    ) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[reg::OLAT, value])?;
        self.olat = value;
        Ok(())
    }
}
