//! Indicator LED control for the Mona robot.
//!
//! The board carries two single-pixel WS2812 LEDs on separate data lines, so each
//! unit gets its own `SmartLedsWrite` driver. Colours are written and latched
//! immediately; there is no blending or animation.

use smart_leds_trait::{SmartLedsWrite, RGB8};

/// Number of indicator units on the board.
pub const UNIT_COUNT: usize = 2;

/// Errors raised while updating an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorError<E> {
    /// Unit number outside `1..=2`; nothing was written.
    InvalidUnit(u8),
    Driver(E),
}

/// Saturate an integer colour component into `0..=255`.
#[inline]
pub fn saturate(component: i32) -> u8 {
    component.clamp(0, 255) as u8
}

/// Build a colour from unchecked integer components, saturating each one.
pub fn color(
    red: i32,
    green: i32,
    blue: i32,
) -> RGB8 {
    RGB8 {
        r: saturate(red),
        g: saturate(green),
        b: saturate(blue),
    }
}

/// Both indicator units, addressed as 1 and 2.
///
/// Remembers the last colour committed to each unit.
pub struct Indicator<Driver> {
    units: [Driver; UNIT_COUNT],
    colors: [RGB8; UNIT_COUNT],
}

impl<Driver, E> Indicator<Driver>
where
    Driver: SmartLedsWrite<Color = RGB8, Error = E>,
{
    /// Wrap the drivers for unit 1 and unit 2.
    ///
    /// Colours are assumed off until the first write.
    pub fn new(
        unit1: Driver,
        unit2: Driver,
    ) -> Self {
        Self {
            units: [unit1, unit2],
            colors: [RGB8::default(); UNIT_COUNT],
        }
    }

    /// Set `unit` to the given colour; out-of-range components saturate.
    pub fn set_color(
        &mut self,
        unit: u8,
        red: i32,
        green: i32,
        blue: i32,
    ) -> Result<RGB8, IndicatorError<E>> {
        let slot = match unit {
            1..=2 => usize::from(unit - 1),
            _ => return Err(IndicatorError::InvalidUnit(unit)),
        };
        let rgb = color(red, green, blue);
        self.units[slot]
            .write(core::iter::once(rgb))
            .map_err(IndicatorError::Driver)?;
        self.colors[slot] = rgb;
        Ok(rgb)
    }

    /// Set both units to the same colour.
    pub fn set_all(
        &mut self,
        red: i32,
        green: i32,
        blue: i32,
    ) -> Result<RGB8, IndicatorError<E>> {
        self.set_color(1, red, green, blue)?;
        self.set_color(2, red, green, blue)
    }

    /// Switch both units off.
    pub fn clear(&mut self) -> Result<(), IndicatorError<E>> {
        self.set_all(0, 0, 0).map(|_| ())
    }

    /// Last colour committed to `unit`, if the unit exists.
    pub fn color(
        &self,
        unit: u8,
    ) -> Option<RGB8> {
        match unit {
            1..=2 => Some(self.colors[usize::from(unit - 1)]),
            _ => None,
        }
    }
}
