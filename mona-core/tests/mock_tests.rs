use core::cell::{Cell, RefCell};
use std::rc::Rc;

use embedded_hal::{delay::DelayNs, i2c::ErrorKind};
use embedded_hal_bus::i2c::RefCellDevice;
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};
use mona_core::utils::controllers::proximity::{
    Channel, ProximityArray, ProximitySensor, SensorError,
};
use mona_core::utils::drivers::{ads7830, Mcp23008};

/// Default I2C address for the emitter GPIO expander.
pub const EXPANDER_ADDRESS: u8 = 0x20;
/// Default I2C address for the sensor ADC.
pub const ADC_ADDRESS: u8 = 0x48;
/// Expander output latch register.
pub const OLAT: u8 = 0x0A;

/// Create a write transaction for the given I2C address and data payload.
pub fn write(
    addr: u8,
    data: Vec<u8>,
) -> I2cTrans {
    I2cTrans::write(addr, data)
}
/// Create a write_read transaction for the given I2C address/payloads.
pub fn write_read(
    addr: u8,
    write: Vec<u8>,
    read: Vec<u8>,
) -> I2cTrans {
    I2cTrans::write_read(addr, write, read)
}

/// Transactions for one complete dark/lit reading.
fn reading(
    pin_mask: u8,
    adc_cmd: u8,
    ambient: u8,
    illuminated: u8,
) -> [I2cTrans; 4] {
    [
        write_read(ADC_ADDRESS, vec![adc_cmd], vec![ambient]),
        write(EXPANDER_ADDRESS, vec![OLAT, pin_mask]),
        write_read(ADC_ADDRESS, vec![adc_cmd], vec![illuminated]),
        write(EXPANDER_ADDRESS, vec![OLAT, 0x00]),
    ]
}

/// Delay that only adds up what it was asked to wait.
#[derive(Clone, Default)]
struct RecordingDelay(Rc<Cell<u64>>);

impl DelayNs for RecordingDelay {
    fn delay_ns(
        &mut self,
        ns: u32,
    ) {
        self.0.set(self.0.get() + u64::from(ns));
    }
}

#[test]
fn adc_command_bytes_follow_channel_select_table() {
    let expected = [0x84, 0xC4, 0x94, 0xD4, 0xA4, 0xE4, 0xB4, 0xF4];
    for (input, &cmd) in expected.iter().enumerate() {
        assert_eq!(ads7830::command(input as u8), cmd, "input {input}");
    }
}

#[test]
fn test_init_emitters() {
    let expectations = [
        write(EXPANDER_ADDRESS, vec![0x00, 0xE0]),
        write(EXPANDER_ADDRESS, vec![OLAT, 0x00]),
    ];

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut sensor = ProximitySensor::new(&i2c_bus, RecordingDelay::default());
    sensor.init().unwrap();
    i2c_bus.borrow_mut().done();
}

#[test]
fn expander_tracks_output_latch() {
    let expectations = [
        write(EXPANDER_ADDRESS, vec![OLAT, 0x10]),
        write(EXPANDER_ADDRESS, vec![OLAT, 0x11]),
        write(EXPANDER_ADDRESS, vec![OLAT, 0x01]),
    ];

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut expander = Mcp23008::new(RefCellDevice::new(&i2c_bus), EXPANDER_ADDRESS);
    expander.set_pin(4, true).unwrap();
    expander.set_pin(0, true).unwrap();
    expander.set_pin(4, false).unwrap();
    assert_eq!(expander.latch(), 0x01);
    i2c_bus.borrow_mut().done();
}

#[test]
fn differential_reading_brackets_emitter_with_settle_delay() {
    // Channel 1: emitter on expander pin 4, receiver on ADC input 7.
    let expectations = reading(0x10, 0xF4, 40, 120);

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let delay = RecordingDelay::default();
    let waited = delay.0.clone();
    let mut sensor = ProximitySensor::new(&i2c_bus, delay);

    let r = sensor.read(Channel::LEFT).unwrap();
    assert_eq!((r.ambient, r.illuminated, r.response), (40, 120, 80));
    assert_eq!(waited.get(), 1_000_000);
    i2c_bus.borrow_mut().done();
}

#[test]
fn differential_is_absolute_difference() {
    // Channel 5 (pin 0, input 0) darker when lit, channel 3 (pin 2, input 5) brighter.
    let mut expectations = Vec::new();
    expectations.extend(reading(0x01, 0x84, 200, 150));
    expectations.extend(reading(0x04, 0xE4, 150, 200));

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut sensor = ProximitySensor::new(&i2c_bus, RecordingDelay::default());

    assert_eq!(sensor.read_differential(Channel::RIGHT).unwrap(), 50);
    assert_eq!(sensor.read_differential(Channel::FRONT).unwrap(), 50);
    i2c_bus.borrow_mut().done();
}

#[test]
fn detect_is_strictly_above_threshold() {
    let mut expectations = Vec::new();
    expectations.extend(reading(0x08, 0xB4, 10, 45));
    expectations.extend(reading(0x08, 0xB4, 10, 46));

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut sensor = ProximitySensor::new(&i2c_bus, RecordingDelay::default());

    assert!(!sensor.detect(Channel::LEFT_DIAGONAL, 35).unwrap());
    assert!(sensor.detect(Channel::LEFT_DIAGONAL, 35).unwrap());
    i2c_bus.borrow_mut().done();
}

#[test]
fn ambient_read_leaves_emitter_alone() {
    let expectations = [write_read(ADC_ADDRESS, vec![0xA4], vec![77])];

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut sensor = ProximitySensor::new(&i2c_bus, RecordingDelay::default());

    assert_eq!(sensor.read_ambient(Channel::RIGHT_DIAGONAL).unwrap(), 77);
    i2c_bus.borrow_mut().done();
}

#[test]
fn invalid_channel_is_reported_without_bus_traffic() {
    let expectations: [I2cTrans; 0] = [];
    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut sensor = ProximitySensor::new(&i2c_bus, RecordingDelay::default());

    assert_eq!(sensor.read_index(0), Err(SensorError::InvalidChannel(0)));
    assert_eq!(sensor.read_index(6), Err(SensorError::InvalidChannel(6)));
    i2c_bus.borrow_mut().done();
}

#[test]
fn emitter_is_disabled_when_lit_sample_fails() {
    let expectations = [
        write_read(ADC_ADDRESS, vec![0xF4], vec![40]),
        write(EXPANDER_ADDRESS, vec![OLAT, 0x10]),
        write_read(ADC_ADDRESS, vec![0xF4], vec![0]).with_error(ErrorKind::Other),
        write(EXPANDER_ADDRESS, vec![OLAT, 0x00]),
    ];

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut sensor = ProximitySensor::new(&i2c_bus, RecordingDelay::default());

    assert_eq!(
        sensor.read(Channel::LEFT),
        Err(SensorError::Bus(ErrorKind::Other))
    );
    i2c_bus.borrow_mut().done();
}

#[test]
fn sample_error_wins_when_emitter_also_sticks() {
    let expectations = [
        write_read(ADC_ADDRESS, vec![0x84], vec![40]),
        write(EXPANDER_ADDRESS, vec![OLAT, 0x01]),
        write_read(ADC_ADDRESS, vec![0x84], vec![0]).with_error(ErrorKind::Other),
        write(EXPANDER_ADDRESS, vec![OLAT, 0x00]).with_error(ErrorKind::Bus),
    ];

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let mut sensor = ProximitySensor::new(&i2c_bus, RecordingDelay::default());

    assert_eq!(
        sensor.read(Channel::RIGHT),
        Err(SensorError::Bus(ErrorKind::Other))
    );
    i2c_bus.borrow_mut().done();
}

#[test]
fn custom_settle_time_is_honoured() {
    let expectations = reading(0x04, 0xE4, 0, 0);

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let delay = RecordingDelay::default();
    let waited = delay.0.clone();
    let mut sensor = ProximitySensor::new(&i2c_bus, delay).with_settle_us(250);

    sensor.read(Channel::FRONT).unwrap();
    assert_eq!(waited.get(), 250_000);
    i2c_bus.borrow_mut().done();
}

#[test]
fn settle_time_can_change_at_runtime() {
    let mut expectations = Vec::new();
    expectations.extend(reading(0x02, 0xA4, 0, 0));
    expectations.extend(reading(0x02, 0xA4, 0, 0));

    let mock = I2cMock::new(&expectations);
    let i2c_bus = RefCell::new(mock);
    let delay = RecordingDelay::default();
    let waited = delay.0.clone();
    let mut sensor = ProximitySensor::new(&i2c_bus, delay);

    sensor.read(Channel::RIGHT_DIAGONAL).unwrap();
    assert_eq!(waited.get(), 1_000_000);

    ProximityArray::set_settle_us(&mut sensor, 50);
    assert_eq!(sensor.settle_us(), 50);
    sensor.read(Channel::RIGHT_DIAGONAL).unwrap();
    assert_eq!(waited.get(), 1_050_000);
    i2c_bus.borrow_mut().done();
}
