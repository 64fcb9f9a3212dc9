//! scripted port for tests, records every call in order

use std::collections::VecDeque;
use std::sync::{mpsc, Arc, Mutex};
use super::entity::DeviceId;
use super::traits::{HardwarePort, PortFactory};
use crate::common::error::DriverError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(u8),
    Close,
    ReadAllDigital,
    ReadAllAnalog,
    SetDigital(u8),
    ClearDigital(u8),
    OutputAnalog(u8, u8),
    Other(&'static str),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub struct MockPort {
    pub calls: CallLog,
    pub found: bool,
    pub digital_script: VecDeque<u8>,
    pub analog_script: VecDeque<(u8, u8)>,
    /// fail the n-th digital dispatch, 1-based
    pub fail_on_dispatch: Option<usize>,
    /// runs once the digital script is empty, the last value keeps being read
    pub on_exhausted: Option<Box<dyn FnMut() + Send>>,
    /// the n-th digital read, 1-based, blocks until a bitfield arrives on the receiver
    pub digital_gate: Option<(usize, mpsc::Receiver<u8>)>,
    digital_reads: usize,
    last_digital: u8,
    last_analog: (u8, u8),
    dispatched: usize,
}

impl MockPort {
    pub fn new(calls: CallLog) -> Self {
        Self {
            calls,
            found: true,
            digital_script: VecDeque::new(),
            analog_script: VecDeque::new(),
            fail_on_dispatch: None,
            on_exhausted: None,
            digital_gate: None,
            digital_reads: 0,
            last_digital: 0,
            last_analog: (0, 0),
            dispatched: 0,
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn dispatch(&mut self, call: Call) -> Result<(), DriverError> {
        self.dispatched += 1;
        if self.fail_on_dispatch == Some(self.dispatched) {
            return Err(DriverError("mock write failed".to_string()));
        }
        self.record(call);
        Ok(())
    }
}

impl HardwarePort for MockPort {
    fn open_device(&mut self, card: DeviceId) -> Result<Option<DeviceId>, DriverError> {
        self.record(Call::Open(card.value()));
        Ok(if self.found { Some(card) } else { None })
    }

    fn search_devices(&mut self) -> Result<u8, DriverError> {
        self.record(Call::Other("search_devices"));
        Ok(0)
    }

    fn set_current_device(&mut self, card: DeviceId) -> Result<Option<DeviceId>, DriverError> {
        self.record(Call::Other("set_current_device"));
        Ok(Some(card))
    }

    fn close_device(&mut self) -> Result<(), DriverError> {
        self.record(Call::Close);
        Ok(())
    }

    fn read_analog_channel(&mut self, _channel: u8) -> Result<u8, DriverError> {
        self.record(Call::Other("read_analog_channel"));
        Ok(0)
    }

    fn read_all_analog(&mut self) -> Result<(u8, u8), DriverError> {
        self.record(Call::ReadAllAnalog);
        if let Some(values) = self.analog_script.pop_front() {
            self.last_analog = values;
        }
        Ok(self.last_analog)
    }

    fn output_analog_channel(&mut self, channel: u8, data: u8) -> Result<(), DriverError> {
        self.dispatch(Call::OutputAnalog(channel, data))
    }

    fn output_all_analog(&mut self, _data1: u8, _data2: u8) -> Result<(), DriverError> {
        self.record(Call::Other("output_all_analog"));
        Ok(())
    }

    fn clear_analog_channel(&mut self, _channel: u8) -> Result<(), DriverError> {
        self.record(Call::Other("clear_analog_channel"));
        Ok(())
    }

    fn clear_all_analog(&mut self) -> Result<(), DriverError> {
        self.record(Call::Other("clear_all_analog"));
        Ok(())
    }

    fn set_analog_channel(&mut self, _channel: u8) -> Result<(), DriverError> {
        self.record(Call::Other("set_analog_channel"));
        Ok(())
    }

    fn set_all_analog(&mut self) -> Result<(), DriverError> {
        self.record(Call::Other("set_all_analog"));
        Ok(())
    }

    fn write_all_digital(&mut self, _data: u8) -> Result<(), DriverError> {
        self.record(Call::Other("write_all_digital"));
        Ok(())
    }

    fn clear_digital_channel(&mut self, channel: u8) -> Result<(), DriverError> {
        self.dispatch(Call::ClearDigital(channel))
    }

    fn clear_all_digital(&mut self) -> Result<(), DriverError> {
        self.record(Call::Other("clear_all_digital"));
        Ok(())
    }

    fn set_digital_channel(&mut self, channel: u8) -> Result<(), DriverError> {
        self.dispatch(Call::SetDigital(channel))
    }

    fn set_all_digital(&mut self) -> Result<(), DriverError> {
        self.record(Call::Other("set_all_digital"));
        Ok(())
    }

    fn read_digital_channel(&mut self, _channel: u8) -> Result<bool, DriverError> {
        self.record(Call::Other("read_digital_channel"));
        Ok(false)
    }

    fn read_all_digital(&mut self) -> Result<u8, DriverError> {
        self.record(Call::ReadAllDigital);
        self.digital_reads += 1;
        if let Some((read, gate)) = self.digital_gate.as_ref() {
            if *read == self.digital_reads {
                self.last_digital = gate.recv().unwrap_or(self.last_digital);
                return Ok(self.last_digital);
            }
        }
        match self.digital_script.pop_front() {
            Some(bits) => self.last_digital = bits,
            None => {
                if let Some(hook) = self.on_exhausted.as_mut() {
                    hook();
                }
            }
        }
        Ok(self.last_digital)
    }

    fn reset_counter(&mut self, _counter: u8) -> Result<(), DriverError> {
        self.record(Call::Other("reset_counter"));
        Ok(())
    }

    fn read_counter(&mut self, _counter: u8) -> Result<u16, DriverError> {
        self.record(Call::Other("read_counter"));
        Ok(0)
    }

    fn set_counter_debounce_time(&mut self, _counter: u8, _millis: u16) -> Result<(), DriverError> {
        self.record(Call::Other("set_counter_debounce_time"));
        Ok(())
    }
}

/// hands out one prepared port, later requests get a not-found port
pub struct MockPortFactory {
    calls: CallLog,
    port: Mutex<Option<MockPort>>,
}

impl MockPortFactory {
    pub fn new(port: MockPort) -> Self {
        Self { calls: Arc::clone(&port.calls), port: Mutex::new(Some(port)) }
    }
}

impl PortFactory for MockPortFactory {
    fn make_port(&self, _device: DeviceId) -> Result<Box<dyn HardwarePort + Send>, DriverError> {
        let port = self.port.lock().unwrap().take().unwrap_or_else(|| {
            let mut port = MockPort::new(Arc::clone(&self.calls));
            port.found = false;
            port
        });
        Ok(Box::new(port))
    }
}
