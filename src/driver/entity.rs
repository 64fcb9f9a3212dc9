//! device addressing and channel ranges shared by every hardware port

use std::fmt;
use serde_derive::Serialize;
use crate::common::error::{DriverError, ValidationError};

/// number of addressable cards
pub const DEVICE_NUM: usize = 4;
/// digital output channels 1..=8
pub const DIGITAL_CHANNEL_NUM: u8 = 8;
/// analog channels 1..=2 on the hardware side
pub const ANALOG_CHANNEL_NUM: u8 = 2;
/// counters 1..=2
pub const COUNTER_NUM: u8 = 2;
/// longest debounce time accepted by the counters
pub const MAX_DEBOUNCE_MS: u16 = 5000;

/// card address in 0..=3, one poll loop per id at a time
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeviceId(u8);

impl DeviceId {
    pub fn all() -> impl Iterator<Item = DeviceId> {
        (0..DEVICE_NUM as u8).map(DeviceId)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// bit of this card in a search bitmask
    pub fn mask(&self) -> u8 {
        1 << self.0
    }
}

impl TryFrom<i32> for DeviceId {
    type Error = ValidationError;

    fn try_from(device: i32) -> Result<Self, Self::Error> {
        if (0..DEVICE_NUM as i32).contains(&device) {
            Ok(DeviceId(device as u8))
        } else {
            Err(ValidationError::new(
                "device",
                format!("device channel {} is not valid, only channel 0, 1, 2 and 3 are available", device),
            ))
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// board address selected by the SK5/SK6 jumpers
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CardAddress {
    Card0,
    Card1,
    Card2,
    Card3,
}

/// what a port needs to know to reach one card
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CardConfig {
    pub device: DeviceId,
    // jumper fitted
    pub sk5: bool,
    pub sk6: bool,
    /// vendor library serving this address
    pub library: &'static str,
}

impl From<DeviceId> for CardAddress {
    fn from(device: DeviceId) -> Self {
        match device.0 {
            0 => CardAddress::Card0,
            1 => CardAddress::Card1,
            2 => CardAddress::Card2,
            _ => CardAddress::Card3,
        }
    }
}

impl CardAddress {
    pub fn config(&self) -> CardConfig {
        let (device, sk5, sk6, library) = match self {
            CardAddress::Card0 => (0, true, true, "K8055-4"),
            CardAddress::Card1 => (1, false, true, "K8055-1"),
            CardAddress::Card2 => (2, true, false, "K8055-2"),
            CardAddress::Card3 => (3, false, false, "K8055-3"),
        };
        CardConfig { device: DeviceId(device), sk5, sk6, library }
    }
}

pub fn check_digital_channel(channel: u8) -> Result<(), DriverError> {
    if (1..=DIGITAL_CHANNEL_NUM).contains(&channel) {
        Ok(())
    } else {
        Err(DriverError(format!("digital channel {} out of range 1..={}", channel, DIGITAL_CHANNEL_NUM)))
    }
}

pub fn check_analog_channel(channel: u8) -> Result<(), DriverError> {
    if (1..=ANALOG_CHANNEL_NUM).contains(&channel) {
        Ok(())
    } else {
        Err(DriverError(format!("analog channel {} out of range 1..={}", channel, ANALOG_CHANNEL_NUM)))
    }
}

pub fn check_counter(counter: u8) -> Result<(), DriverError> {
    if (1..=COUNTER_NUM).contains(&counter) {
        Ok(())
    } else {
        Err(DriverError(format!("counter {} out of range 1..={}", counter, COUNTER_NUM)))
    }
}

pub fn check_debounce_time(millis: u16) -> Result<(), DriverError> {
    if millis <= MAX_DEBOUNCE_MS {
        Ok(())
    } else {
        Err(DriverError(format!("debounce time {}ms exceeds {}ms", millis, MAX_DEBOUNCE_MS)))
    }
}
