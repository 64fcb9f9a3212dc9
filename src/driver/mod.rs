//! hardware access layer
//! one `HardwarePort` per card, built by a `PortFactory` keyed on the device id

pub mod entity;
pub mod traits;
pub mod dummy_card;

#[cfg(test)]
pub mod mock;

pub use entity::{CardAddress, CardConfig, DeviceId};
pub use traits::{HardwarePort, PortFactory};
