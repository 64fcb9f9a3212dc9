//! Communicator
//! - starts and stops one poll loop per card
//! - queues outputs for the loops to write
//! - routes change and connection notifications to subscribers

use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use super::device_thread::spawn_loop;
use super::dispatcher::Dispatcher;
use super::entity::*;
use super::flags::CommunicationFlags;
use super::notifier::{Notifier, SubscriptionId};
use super::output_queue::OutputQueue;
use crate::common::error::ValidationError;
use crate::driver::entity::{DeviceId, DEVICE_NUM};
use crate::driver::PortFactory;
use crate::{error, info, warn};

const LOG_TAG: &str = "communicator";
const MAX_DIGITAL_VALUES: usize = 8;
const ANALOG_VALUE_NUM: usize = 2;

/// poll loop thread of one device
#[derive(Debug, Default)]
enum Worker {
    #[default]
    Empty,
    Running(JoinHandle<()>),
    // a start is waiting for the previous loop to finish
    Restarting,
}

pub struct Communicator {
    factory: Arc<dyn PortFactory>,
    flags: Arc<CommunicationFlags>,
    queue: Arc<OutputQueue>,
    notifier: Arc<Notifier>,
    workers: Mutex<[Worker; DEVICE_NUM]>,
}

impl Communicator {
    pub fn new(factory: Arc<dyn PortFactory>, dispatcher: Box<dyn Dispatcher>) -> Self {
        Self {
            factory,
            flags: Arc::new(CommunicationFlags::new()),
            queue: Arc::new(OutputQueue::new()),
            notifier: Arc::new(Notifier::new(dispatcher)),
            workers: Mutex::new(Default::default()),
        }
    }

    fn workers(&self) -> MutexGuard<'_, [Worker; DEVICE_NUM]> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Launch the poll loop of `device` without waiting for it.
    ///
    /// `Ok(true)` when a new loop was launched, `Ok(false)` when one is already running
    /// or another start of the same device is in progress. A loop that was stopped but
    /// has not finished its last iteration yet is joined first, so two loops never talk
    /// to the same card. The join happens without holding the worker lock, subscribers
    /// of the old loop may still call back into the communicator.
    pub fn start_communication(&self, device: i32) -> Result<bool, ValidationError> {
        let device = DeviceId::try_from(device)?;
        let previous = {
            let mut workers = self.workers();
            let slot = &mut workers[device.index()];
            if self.flags.is_raised(device) || matches!(slot, Worker::Restarting) {
                info!(LOG_TAG, "device {}: already communicating", device);
                return Ok(false);
            }
            match std::mem::replace(slot, Worker::Restarting) {
                Worker::Running(handle) => Some(handle),
                _ => None,
            }
        };

        if let Some(previous) = previous {
            // a subscriber running on the old loop's own thread cannot wait for it
            if previous.thread().id() != thread::current().id() && previous.join().is_err() {
                error!(LOG_TAG, "device {}: previous poll loop panicked", device);
            }
        }

        let mut workers = self.workers();
        let slot = &mut workers[device.index()];
        if !self.flags.raise(device) {
            *slot = Worker::Empty;
            return Ok(false);
        }
        let spawned = spawn_loop(
            device,
            Arc::clone(&self.factory),
            Arc::clone(&self.flags),
            Arc::clone(&self.queue),
            Arc::clone(&self.notifier),
        );
        match spawned {
            Ok(handle) => {
                *slot = Worker::Running(handle);
                info!(LOG_TAG, "device {}: communication started", device);
                Ok(true)
            }
            Err(e) => {
                *slot = Worker::Empty;
                self.flags.clear(device);
                error!(LOG_TAG, "device {}: cannot spawn poll loop: {}", device, e);
                Ok(false)
            }
        }
    }

    /// Ask the loop of `device` to stop after its current iteration. Always `Ok(true)` for a
    /// valid id, whether or not a loop was running.
    pub fn stop_communication(&self, device: i32) -> Result<bool, ValidationError> {
        let device = DeviceId::try_from(device)?;
        self.flags.clear(device);
        info!(LOG_TAG, "device {}: communication stop requested", device);
        Ok(true)
    }

    pub fn is_communicating(&self, device: i32) -> Result<bool, ValidationError> {
        let device = DeviceId::try_from(device)?;
        Ok(self.flags.is_raised(device))
    }

    /// stop every loop and wait for all of them to close their cards
    pub fn shutdown(&self) {
        for device in DeviceId::all() {
            self.flags.clear(device);
        }
        let handles: Vec<JoinHandle<()>> = self
            .workers()
            .iter_mut()
            .filter_map(|slot| match std::mem::take(slot) {
                Worker::Running(handle) => Some(handle),
                // leave a pending restart to its caller
                Worker::Restarting => {
                    *slot = Worker::Restarting;
                    None
                }
                Worker::Empty => None,
            })
            .collect();
        for handle in handles {
            if handle.thread().id() == thread::current().id() {
                warn!(LOG_TAG, "shutdown called from a poll loop, not waiting for it");
                continue;
            }
            if handle.join().is_err() {
                error!(LOG_TAG, "a poll loop panicked");
            }
        }
        info!(LOG_TAG, "all poll loops stopped");
    }

    // ================= digital outputs ====================

    pub fn add_digital_output(&self, output: DigitalIo) -> Result<(), ValidationError> {
        self.queue.enqueue_digital(output)
    }

    /// items before the first invalid one stay queued
    pub fn add_digital_outputs(&self, outputs: &[DigitalIo]) -> Result<(), ValidationError> {
        self.queue.add_many_digital(outputs)
    }

    pub fn add_digital_output_at(&self, device: i32, port: i32, value: bool) -> Result<(), ValidationError> {
        self.add_digital_output(DigitalIo { device, port, value })
    }

    /// `values[i]` goes to port i + 1, `None` entries are skipped
    pub fn add_digital_output_values(&self, device: i32, values: &[Option<bool>]) -> Result<(), ValidationError> {
        DeviceId::try_from(device)?;
        if values.len() > MAX_DIGITAL_VALUES {
            return Err(ValidationError::new(
                "values",
                format!("{} digital output values given, 8 max", values.len()),
            ));
        }
        for (index, value) in values.iter().enumerate() {
            if let Some(value) = value {
                self.add_digital_output_at(device, index as i32 + 1, *value)?;
            }
        }
        Ok(())
    }

    // ================= analog outputs ====================

    pub fn add_analog_output(&self, output: AnalogIo) -> Result<(), ValidationError> {
        self.queue.enqueue_analog(output)
    }

    /// items before the first invalid one stay queued
    pub fn add_analog_outputs(&self, outputs: &[AnalogIo]) -> Result<(), ValidationError> {
        self.queue.add_many_analog(outputs)
    }

    pub fn add_analog_output_at(&self, device: i32, port: i32, value: i32) -> Result<(), ValidationError> {
        self.add_analog_output(AnalogIo { device, port, value })
    }

    /// exactly two values, `values[i]` goes to port i
    pub fn add_analog_output_values(&self, device: i32, values: &[i32]) -> Result<(), ValidationError> {
        DeviceId::try_from(device)?;
        if values.len() != ANALOG_VALUE_NUM {
            return Err(ValidationError::new(
                "values",
                format!("{} analog output values given, 2 required", values.len()),
            ));
        }
        for (port, value) in values.iter().enumerate() {
            self.add_analog_output_at(device, port as i32, *value)?;
        }
        Ok(())
    }

    /// (digital, analog) outputs still waiting for `device`
    pub fn pending_outputs(&self, device: i32) -> Result<(usize, usize), ValidationError> {
        let device = DeviceId::try_from(device)?;
        Ok(self.queue.pending(device))
    }

    // ================= notifications ====================

    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&CommunicatorEvent) + Send + Sync + 'static,
    {
        self.notifier.subscribe(kind, callback)
    }

    pub fn subscribe_channel(&self, kind: EventKind) -> (SubscriptionId, mpsc::Receiver<CommunicatorEvent>) {
        self.notifier.subscribe_channel(kind)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }
}

impl Drop for Communicator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
