//! queue items and change notifications

use serde_derive::Serialize;
use crate::driver::DeviceId;

/// digital output ports 1..=8
pub const DIGITAL_OUTPUT_PORTS: std::ops::RangeInclusive<i32> = 1..=8;
/// digital inputs sampled per poll, reported as ports 1..=5
pub const DIGITAL_INPUT_NUM: u8 = 5;
/// analog ports 0..=1, hardware channel = port + 1
pub const ANALOG_PORTS: std::ops::RangeInclusive<i32> = 0..=1;
/// analog values the hardware accepts
pub const ANALOG_VALUES: std::ops::RangeInclusive<i32> = 0..=255;

/// pending digital write, validated when queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DigitalIo {
    pub device: i32,
    pub port: i32,
    pub value: bool,
}

/// pending analog write; the value is only range checked at dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalogIo {
    pub device: i32,
    pub port: i32,
    pub value: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DigitalInputChangeEvent {
    pub device: DeviceId,
    pub port: u8,
    pub value: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalogInputChangeEvent {
    pub device: DeviceId,
    pub port: u8,
    pub value: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionErrorEvent {
    pub device: DeviceId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum CommunicatorEvent {
    DigitalInput(DigitalInputChangeEvent),
    AnalogInput(AnalogInputChangeEvent),
    ConnectionError(ConnectionErrorEvent),
}

impl CommunicatorEvent {
    pub fn device(&self) -> DeviceId {
        match self {
            CommunicatorEvent::DigitalInput(e) => e.device,
            CommunicatorEvent::AnalogInput(e) => e.device,
            CommunicatorEvent::ConnectionError(e) => e.device,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            CommunicatorEvent::DigitalInput(_) => EventKind::DigitalInput,
            CommunicatorEvent::AnalogInput(_) => EventKind::AnalogInput,
            CommunicatorEvent::ConnectionError(_) => EventKind::ConnectionError,
        }
    }
}

/// which stream a subscriber listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    DigitalInput,
    AnalogInput,
    ConnectionError,
    All,
}

impl EventKind {
    pub fn matches(&self, event: &CommunicatorEvent) -> bool {
        *self == EventKind::All || *self == event.kind()
    }
}
