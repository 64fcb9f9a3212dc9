use crate::common::error::DriverError;
use super::entity::DeviceId;

/// Blocking access to one card. One call in flight per card at a time.
///
/// Analog channels are numbered 1..=2, digital channels 1..=8, counters 1..=2.
pub trait HardwarePort {
    /// `None` means the card was not found
    fn open_device(&mut self, card: DeviceId) -> Result<Option<DeviceId>, DriverError>;

    /// bit i set means card i answered
    fn search_devices(&mut self) -> Result<u8, DriverError>;

    /// `None` means the card is not open
    fn set_current_device(&mut self, card: DeviceId) -> Result<Option<DeviceId>, DriverError>;

    fn close_device(&mut self) -> Result<(), DriverError>;

    // analog

    fn read_analog_channel(&mut self, channel: u8) -> Result<u8, DriverError>;

    fn read_all_analog(&mut self) -> Result<(u8, u8), DriverError>;

    fn output_analog_channel(&mut self, channel: u8, data: u8) -> Result<(), DriverError>;

    fn output_all_analog(&mut self, data1: u8, data2: u8) -> Result<(), DriverError>;

    fn clear_analog_channel(&mut self, channel: u8) -> Result<(), DriverError>;

    fn clear_all_analog(&mut self) -> Result<(), DriverError>;

    fn set_analog_channel(&mut self, channel: u8) -> Result<(), DriverError>;

    fn set_all_analog(&mut self) -> Result<(), DriverError>;

    // digital

    fn write_all_digital(&mut self, data: u8) -> Result<(), DriverError>;

    fn clear_digital_channel(&mut self, channel: u8) -> Result<(), DriverError>;

    fn clear_all_digital(&mut self) -> Result<(), DriverError>;

    fn set_digital_channel(&mut self, channel: u8) -> Result<(), DriverError>;

    fn set_all_digital(&mut self) -> Result<(), DriverError>;

    fn read_digital_channel(&mut self, channel: u8) -> Result<bool, DriverError>;

    fn read_all_digital(&mut self) -> Result<u8, DriverError>;

    // counters

    fn reset_counter(&mut self, counter: u8) -> Result<(), DriverError>;

    fn read_counter(&mut self, counter: u8) -> Result<u16, DriverError>;

    fn set_counter_debounce_time(&mut self, counter: u8, millis: u16) -> Result<(), DriverError>;
}

/// Builds the port a poll loop talks through for one card
pub trait PortFactory: Send + Sync {
    fn make_port(&self, device: DeviceId) -> Result<Box<dyn HardwarePort + Send>, DriverError>;
}
