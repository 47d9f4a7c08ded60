//! Battery level estimation.
//!
//! The cell runs from 4.2 V full down to about 3.3 V, where the on-board regulator
//! drops out. A divider scales that window to roughly 0.87 V to 0.63 V, which the MCU
//! ADC (0 dB attenuation, 12 bit) reads as about 3550 to 2750 counts. The mapping
//! here is linear across that window and saturates outside it.
//!
//! Integrator note: when the robot is powered over USB the same ADC path sees the
//! supply rail, not the cell. The reading then says nothing about charge and the
//! monitor has no way to tell the two cases apart.

use serde::Serialize;

/// Raw count corresponding to an empty battery.
pub const RAW_EMPTY: u16 = 2750;
/// Raw counts per percentage point.
pub const RAW_PER_PERCENT: i32 = 8;

/// Map a raw ADC count to a charge percentage in `0..=100`.
pub fn battery_percentage(raw_sample: u16) -> u8 {
    let percent = (i32::from(raw_sample) - i32::from(RAW_EMPTY)) / RAW_PER_PERCENT;
    percent.clamp(0, 100) as u8
}

/// Source of raw battery samples, provided by the host.
pub trait BatterySource {
    fn raw_sample(&mut self) -> u16;
}

impl<F: FnMut() -> u16> BatterySource for F {
    fn raw_sample(&mut self) -> u16 {
        self()
    }
}

/// Raw sample alongside the derived level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatteryReport {
    pub raw: u16,
    pub percentage: u8,
}

pub struct PowerMonitor<B> {
    source: B,
}

impl<B: BatterySource> PowerMonitor<B> {
    pub fn new(source: B) -> Self {
        Self { source }
    }

    pub fn report(&mut self) -> BatteryReport {
        let raw = self.source.raw_sample();
        BatteryReport {
            raw,
            percentage: battery_percentage(raw),
        }
    }

    pub fn percentage(&mut self) -> u8 {
        self.report().percentage
    }
}
