//! pending output requests
//! - one ordered list per request kind, shared by every device loop
//! - each loop drains only the requests of its own device
//! - batch adds are not transactional: items added before a failing item stay queued

use std::sync::{Mutex, MutexGuard, PoisonError};
use super::entity::*;
use crate::common::error::ValidationError;
use crate::driver::DeviceId;
use crate::trace;

const LOG_TAG: &str = "output_queue";

#[derive(Debug, Default)]
pub struct OutputQueue {
    digital: Mutex<Vec<DigitalIo>>,
    analog: Mutex<Vec<AnalogIo>>,
}

fn lock<T>(list: &Mutex<Vec<T>>) -> MutexGuard<'_, Vec<T>> {
    list.lock().unwrap_or_else(PoisonError::into_inner)
}

/// take every item of `device` out of `list`, keeping insertion order for both parts
fn take_device<T, F>(list: &Mutex<Vec<T>>, device: DeviceId, device_of: F) -> Vec<T>
where
    F: Fn(&T) -> i32,
{
    let mut list = lock(list);
    let (taken, kept): (Vec<T>, Vec<T>) = list
        .drain(..)
        .partition(|item| device_of(item) == device.value() as i32);
    *list = kept;
    taken
}

pub fn check_digital(output: &DigitalIo) -> Result<(), ValidationError> {
    DeviceId::try_from(output.device)?;
    if !DIGITAL_OUTPUT_PORTS.contains(&output.port) {
        return Err(ValidationError::new(
            "port",
            format!("digital output port {} out of range 1..=8", output.port),
        ));
    }
    Ok(())
}

pub fn check_analog(output: &AnalogIo) -> Result<(), ValidationError> {
    DeviceId::try_from(output.device)?;
    if !ANALOG_PORTS.contains(&output.port) {
        return Err(ValidationError::new(
            "port",
            format!("analog output port {} has to be 0 or 1", output.port),
        ));
    }
    Ok(())
}

impl OutputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_digital(&self, output: DigitalIo) -> Result<(), ValidationError> {
        check_digital(&output)?;
        trace!(LOG_TAG, "queue digital output {:?}", output);
        lock(&self.digital).push(output);
        Ok(())
    }

    pub fn enqueue_analog(&self, output: AnalogIo) -> Result<(), ValidationError> {
        check_analog(&output)?;
        trace!(LOG_TAG, "queue analog output {:?}", output);
        lock(&self.analog).push(output);
        Ok(())
    }

    /// stops at the first invalid item, earlier items stay queued
    pub fn add_many_digital(&self, outputs: &[DigitalIo]) -> Result<(), ValidationError> {
        for output in outputs {
            self.enqueue_digital(*output)?;
        }
        Ok(())
    }

    /// stops at the first invalid item, earlier items stay queued
    pub fn add_many_analog(&self, outputs: &[AnalogIo]) -> Result<(), ValidationError> {
        for output in outputs {
            self.enqueue_analog(*output)?;
        }
        Ok(())
    }

    pub fn drain_digital(&self, device: DeviceId) -> Vec<DigitalIo> {
        take_device(&self.digital, device, |o| o.device)
    }

    pub fn drain_analog(&self, device: DeviceId) -> Vec<AnalogIo> {
        take_device(&self.analog, device, |o| o.device)
    }

    /// put undispatched requests back in front of anything queued since the drain
    pub fn restore_digital(&self, outputs: Vec<DigitalIo>) {
        if outputs.is_empty() {
            return;
        }
        let mut list = lock(&self.digital);
        let queued_since = std::mem::replace(&mut *list, outputs);
        list.extend(queued_since);
    }

    pub fn restore_analog(&self, outputs: Vec<AnalogIo>) {
        if outputs.is_empty() {
            return;
        }
        let mut list = lock(&self.analog);
        let queued_since = std::mem::replace(&mut *list, outputs);
        list.extend(queued_since);
    }

    /// (digital, analog) requests waiting for `device`
    pub fn pending(&self, device: DeviceId) -> (usize, usize) {
        let id = device.value() as i32;
        let digital = lock(&self.digital).iter().filter(|o| o.device == id).count();
        let analog = lock(&self.analog).iter().filter(|o| o.device == id).count();
        (digital, analog)
    }
}
