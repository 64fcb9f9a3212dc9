//! in-memory simulated card
//! - used when the communicator runs in dummy mode and by tests
//! - inputs are driven from the outside through `CardHandle`
//! - inputs 1 and 2 feed counters 1 and 2 on rising edges, like the board

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use super::entity::*;
use super::traits::{HardwarePort, PortFactory};
use crate::common::error::DriverError;
use crate::{debug, trace};

const LOG_TAG: &str = "dummy_card";
const DIGITAL_INPUT_MASK: u8 = 0b1_1111;

#[derive(Debug, Default, Clone)]
struct CardState {
    open: bool,
    digital_in: u8,
    analog_in: [u8; 2],
    digital_out: u8,
    analog_out: [u8; 2],
    counters: [u16; 2],
    debounce_ms: [u16; 2],
}

/// shared view of one simulated card
#[derive(Debug, Default, Clone)]
pub struct CardHandle {
    state: Arc<Mutex<CardState>>,
}

impl CardHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// set inputs 1..=5 at once, higher bits are ignored
    pub fn set_digital_inputs(&self, bits: u8) {
        let mut state = self.lock();
        let bits = bits & DIGITAL_INPUT_MASK;
        let rising = bits & !state.digital_in;
        for counter in 0..COUNTER_NUM as usize {
            if rising & (1 << counter) != 0 {
                state.counters[counter] = state.counters[counter].wrapping_add(1);
            }
        }
        state.digital_in = bits;
    }

    /// set a single input, channel 1..=5
    pub fn set_digital_input(&self, channel: u8, on: bool) {
        if !(1..=5).contains(&channel) {
            return;
        }
        let current = self.lock().digital_in;
        let bit = 1 << (channel - 1);
        self.set_digital_inputs(if on { current | bit } else { current & !bit });
    }

    /// analog channel 1..=2
    pub fn set_analog_input(&self, channel: u8, value: u8) {
        if check_analog_channel(channel).is_ok() {
            self.lock().analog_in[channel as usize - 1] = value;
        }
    }

    pub fn digital_outputs(&self) -> u8 {
        self.lock().digital_out
    }

    pub fn analog_outputs(&self) -> [u8; 2] {
        self.lock().analog_out
    }

    pub fn debounce_time(&self, counter: u8) -> Option<u16> {
        check_counter(counter).ok()?;
        Some(self.lock().debounce_ms[counter as usize - 1])
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }
}

/// Simulated port for one card address. Every port sees the same bus of cards.
pub struct DummyCard {
    device: DeviceId,
    config: CardConfig,
    bus: Arc<[Option<CardHandle>; DEVICE_NUM]>,
    current: Option<DeviceId>,
}

impl DummyCard {
    pub fn new(config: CardConfig, bus: Arc<[Option<CardHandle>; DEVICE_NUM]>) -> Self {
        Self { device: config.device, config, bus, current: None }
    }

    pub fn config(&self) -> &CardConfig {
        &self.config
    }

    fn card(&self) -> Result<&CardHandle, DriverError> {
        self.current
            .and_then(|current| self.bus[current.index()].as_ref())
            .ok_or_else(|| DriverError(format!("dummy port {}: no card open", self.device)))
    }
}

impl HardwarePort for DummyCard {
    fn open_device(&mut self, card: DeviceId) -> Result<Option<DeviceId>, DriverError> {
        match self.bus[card.index()].as_ref() {
            Some(handle) => {
                handle.lock().open = true;
                self.current = Some(card);
                debug!(LOG_TAG, "card {} opened through port {} ({})", card, self.device, self.config.library);
                Ok(Some(card))
            }
            None => {
                debug!(LOG_TAG, "card {} not found", card);
                Ok(None)
            }
        }
    }

    fn search_devices(&mut self) -> Result<u8, DriverError> {
        Ok(DeviceId::all()
            .filter(|d| self.bus[d.index()].is_some())
            .fold(0, |mask, d| mask | d.mask()))
    }

    fn set_current_device(&mut self, card: DeviceId) -> Result<Option<DeviceId>, DriverError> {
        match self.bus[card.index()].as_ref() {
            Some(handle) if handle.is_open() => {
                self.current = Some(card);
                Ok(Some(card))
            }
            _ => Ok(None),
        }
    }

    fn close_device(&mut self) -> Result<(), DriverError> {
        if let Some(handle) = self.current.take().and_then(|c| self.bus[c.index()].as_ref()) {
            handle.lock().open = false;
            debug!(LOG_TAG, "port {} closed", self.device);
        }
        Ok(())
    }

    fn read_analog_channel(&mut self, channel: u8) -> Result<u8, DriverError> {
        check_analog_channel(channel)?;
        Ok(self.card()?.lock().analog_in[channel as usize - 1])
    }

    fn read_all_analog(&mut self) -> Result<(u8, u8), DriverError> {
        let values = self.card()?.lock().analog_in;
        Ok((values[0], values[1]))
    }

    fn output_analog_channel(&mut self, channel: u8, data: u8) -> Result<(), DriverError> {
        check_analog_channel(channel)?;
        trace!(LOG_TAG, "card {:?} analog out {} = {}", self.current, channel, data);
        self.card()?.lock().analog_out[channel as usize - 1] = data;
        Ok(())
    }

    fn output_all_analog(&mut self, data1: u8, data2: u8) -> Result<(), DriverError> {
        self.card()?.lock().analog_out = [data1, data2];
        Ok(())
    }

    fn clear_analog_channel(&mut self, channel: u8) -> Result<(), DriverError> {
        self.output_analog_channel(channel, u8::MIN)
    }

    fn clear_all_analog(&mut self) -> Result<(), DriverError> {
        self.output_all_analog(u8::MIN, u8::MIN)
    }

    fn set_analog_channel(&mut self, channel: u8) -> Result<(), DriverError> {
        self.output_analog_channel(channel, u8::MAX)
    }

    fn set_all_analog(&mut self) -> Result<(), DriverError> {
        self.output_all_analog(u8::MAX, u8::MAX)
    }

    fn write_all_digital(&mut self, data: u8) -> Result<(), DriverError> {
        self.card()?.lock().digital_out = data;
        Ok(())
    }

    fn clear_digital_channel(&mut self, channel: u8) -> Result<(), DriverError> {
        check_digital_channel(channel)?;
        trace!(LOG_TAG, "card {:?} digital out {} off", self.current, channel);
        self.card()?.lock().digital_out &= !(1 << (channel - 1));
        Ok(())
    }

    fn clear_all_digital(&mut self) -> Result<(), DriverError> {
        self.write_all_digital(u8::MIN)
    }

    fn set_digital_channel(&mut self, channel: u8) -> Result<(), DriverError> {
        check_digital_channel(channel)?;
        trace!(LOG_TAG, "card {:?} digital out {} on", self.current, channel);
        self.card()?.lock().digital_out |= 1 << (channel - 1);
        Ok(())
    }

    fn set_all_digital(&mut self) -> Result<(), DriverError> {
        self.write_all_digital(u8::MAX)
    }

    fn read_digital_channel(&mut self, channel: u8) -> Result<bool, DriverError> {
        check_digital_channel(channel)?;
        Ok(self.card()?.lock().digital_in & (1 << (channel - 1)) != 0)
    }

    fn read_all_digital(&mut self) -> Result<u8, DriverError> {
        Ok(self.card()?.lock().digital_in)
    }

    fn reset_counter(&mut self, counter: u8) -> Result<(), DriverError> {
        check_counter(counter)?;
        self.card()?.lock().counters[counter as usize - 1] = 0;
        Ok(())
    }

    fn read_counter(&mut self, counter: u8) -> Result<u16, DriverError> {
        check_counter(counter)?;
        Ok(self.card()?.lock().counters[counter as usize - 1])
    }

    fn set_counter_debounce_time(&mut self, counter: u8, millis: u16) -> Result<(), DriverError> {
        check_counter(counter)?;
        check_debounce_time(millis)?;
        self.card()?.lock().debounce_ms[counter as usize - 1] = millis;
        Ok(())
    }
}

/// Builds `DummyCard` ports over a fixed bus of simulated cards
pub struct DummyPortFactory {
    bus: Arc<[Option<CardHandle>; DEVICE_NUM]>,
}

impl DummyPortFactory {
    /// bit i of `present_cards` attaches simulated card i
    pub fn new(present_cards: u8) -> Self {
        let bus = [0u8, 1, 2, 3].map(|i| {
            if present_cards & (1 << i) != 0 {
                Some(CardHandle::new())
            } else {
                None
            }
        });
        Self { bus: Arc::new(bus) }
    }

    /// handle of an attached card, `None` when the card is absent
    pub fn card(&self, device: DeviceId) -> Option<CardHandle> {
        self.bus[device.index()].clone()
    }
}

impl PortFactory for DummyPortFactory {
    fn make_port(&self, device: DeviceId) -> Result<Box<dyn HardwarePort + Send>, DriverError> {
        let config = CardAddress::from(device).config();
        Ok(Box::new(DummyCard::new(config, Arc::clone(&self.bus))))
    }
}
