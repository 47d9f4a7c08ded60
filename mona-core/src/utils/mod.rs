//! Utility re-exports and helper macros for the Mona robot.
//!
//! This module re-exports the core components and timing, and provides a helper
//! macro for static initialization:
//!
//! - `config`: runtime-tunable avoidance, sensor and reply settings
//! - `controllers`: motors, proximity sensors, battery, indicators and the
//!   avoidance state machine
//! - `drivers`: register-level drivers for the I2C GPIO expander and ADC
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod config;
pub mod controllers;
pub mod drivers;

pub use config::Config;
pub use controllers::SystemController;
pub use embassy_time::{Delay, Duration, Instant, Timer};

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: $crate::static_cell::StaticCell<$t> =
            $crate::static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
