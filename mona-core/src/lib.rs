//! Sensing and actuation core for the Mona two-wheeled robot on no-std embedded platforms.
//!
//! For a runnable host simulation, see `mona-app/mock-mcu`.
#![no_std]

pub mod utils;

#[doc(hidden)]
pub use static_cell;
