//! Register-level drivers for the I2C peripherals on the Mona board.
//!
//! - `mcp23008`: GPIO expander switching the proximity emitters.
//! - `ads7830`: 8-bit ADC sampling the proximity receivers.
//!
//! Both share one bus; wrap it in `embedded_hal_bus::i2c::RefCellDevice` per driver.

pub mod ads7830;
pub mod mcp23008;

pub use ads7830::Ads7830;
pub use mcp23008::Mcp23008;
