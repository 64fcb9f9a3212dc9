//! per-device poll loop
//! Idle -> Opening -> Polling -> Closing -> Idle, Failed when the card is absent or a call fails
//! - samples the digital inputs, reports changed bits, high bit first
//! - writes the queued digital outputs of this device
//! - samples both analog inputs, reports changed channels
//! - writes the queued analog outputs, values outside 0..=255 are dropped
//! - no sleep between iterations, the hardware calls set the pace
//! - the session is closed on every exit path

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use super::entity::*;
use super::flags::CommunicationFlags;
use super::notifier::Notifier;
use super::output_queue::OutputQueue;
use crate::common::error::DriverError;
use crate::driver::{DeviceId, HardwarePort, PortFactory};
use crate::{debug, error, info, trace, warn};

const LOG_TAG: &str = "device_thread";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Opening,
    Polling,
    Closing,
    Failed,
}

pub struct PollLoop {
    device: DeviceId,
    port: Box<dyn HardwarePort + Send>,
    flags: Arc<CommunicationFlags>,
    queue: Arc<OutputQueue>,
    notifier: Arc<Notifier>,
    state: PollState,
    // last sampled digital bitfield
    digital_snapshot: u8,
    // last sampled analog pair, index = port
    analog_snapshot: [u8; 2],
}

impl PollLoop {
    pub fn new(
        device: DeviceId,
        port: Box<dyn HardwarePort + Send>,
        flags: Arc<CommunicationFlags>,
        queue: Arc<OutputQueue>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            device,
            port,
            flags,
            queue,
            notifier,
            state: PollState::Idle,
            digital_snapshot: 0,
            analog_snapshot: [0, 0],
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// poll until the device flag is cleared or the card fails, then close
    pub fn run(mut self) {
        if self.open() {
            while self.flags.is_raised(self.device) {
                if let Err(e) = self.poll_once() {
                    self.fail(format!("hardware call failed: {}", e));
                    break;
                }
            }
        }
        self.close();
    }

    /// Opening: true when the card answered and polling may start
    pub fn open(&mut self) -> bool {
        self.state = PollState::Opening;
        info!(LOG_TAG, "device {}: opening card", self.device);
        match self.port.open_device(self.device) {
            Ok(Some(address)) => {
                info!(LOG_TAG, "device {}: card {} open, polling", self.device, address);
                self.state = PollState::Polling;
                true
            }
            Ok(None) => {
                self.fail("card not found".to_string());
                false
            }
            Err(e) => {
                self.fail(format!("cannot open card: {}", e));
                false
            }
        }
    }

    /// one pass of the polling body
    pub fn poll_once(&mut self) -> Result<(), DriverError> {
        self.sample_digital()?;
        self.write_digital()?;
        self.sample_analog()?;
        self.write_analog()?;
        Ok(())
    }

    /// Closing: always ends in Idle, close errors are only logged
    pub fn close(&mut self) {
        self.state = PollState::Closing;
        if let Err(e) = self.port.close_device() {
            warn!(LOG_TAG, "device {}: close failed: {}", self.device, e);
        }
        info!(LOG_TAG, "device {}: closed", self.device);
        self.state = PollState::Idle;
    }

    fn fail(&mut self, reason: String) {
        self.state = PollState::Failed;
        error!(LOG_TAG, "device {}: connection error, {}", self.device, reason);
        self.flags.clear(self.device);
        self.notifier.notify(CommunicatorEvent::ConnectionError(ConnectionErrorEvent {
            device: self.device,
            reason,
        }));
    }

    fn sample_digital(&mut self) -> Result<(), DriverError> {
        let bits = self.port.read_all_digital()?;
        let changed = bits ^ self.digital_snapshot;
        for bit in (0..DIGITAL_INPUT_NUM).rev() {
            if changed & (1 << bit) != 0 {
                let value = bits & (1 << bit) != 0;
                debug!(LOG_TAG, "device {}: digital input {} -> {}", self.device, bit + 1, value);
                self.notifier.notify(CommunicatorEvent::DigitalInput(DigitalInputChangeEvent {
                    device: self.device,
                    port: bit + 1,
                    value,
                }));
            }
        }
        self.digital_snapshot = bits;
        Ok(())
    }

    fn write_digital(&mut self) -> Result<(), DriverError> {
        let mut outputs = self.queue.drain_digital(self.device).into_iter();
        while let Some(output) = outputs.next() {
            trace!(LOG_TAG, "device {}: dispatch {:?}", self.device, output);
            let channel = output.port as u8;
            let result = if output.value {
                self.port.set_digital_channel(channel)
            } else {
                self.port.clear_digital_channel(channel)
            };
            if let Err(e) = result {
                self.queue.restore_digital(outputs.collect());
                return Err(e);
            }
        }
        Ok(())
    }

    fn sample_analog(&mut self) -> Result<(), DriverError> {
        let (first, second) = self.port.read_all_analog()?;
        let values = [first, second];
        for (port, value) in values.iter().enumerate() {
            if *value != self.analog_snapshot[port] {
                debug!(LOG_TAG, "device {}: analog input {} -> {}", self.device, port, value);
                self.notifier.notify(CommunicatorEvent::AnalogInput(AnalogInputChangeEvent {
                    device: self.device,
                    port: port as u8,
                    value: *value,
                }));
            }
        }
        self.analog_snapshot = values;
        Ok(())
    }

    fn write_analog(&mut self) -> Result<(), DriverError> {
        let mut outputs = self.queue.drain_analog(self.device).into_iter();
        while let Some(output) = outputs.next() {
            if !ANALOG_VALUES.contains(&output.value) {
                debug!(LOG_TAG, "device {}: analog value {} out of range, dropped", self.device, output.value);
                continue;
            }
            // ports 0..=1 map to hardware channels 1..=2
            let channel = output.port as u8 + 1;
            trace!(LOG_TAG, "device {}: dispatch {:?}", self.device, output);
            if let Err(e) = self.port.output_analog_channel(channel, output.value as u8) {
                self.queue.restore_analog(outputs.collect());
                return Err(e);
            }
        }
        Ok(())
    }
}

/// build the port for `device` and run its loop on a named thread
pub fn spawn_loop(
    device: DeviceId,
    factory: Arc<dyn PortFactory>,
    flags: Arc<CommunicationFlags>,
    queue: Arc<OutputQueue>,
    notifier: Arc<Notifier>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("k8055-device-{}", device))
        .spawn(move || match factory.make_port(device) {
            Ok(port) => PollLoop::new(device, port, flags, queue, notifier).run(),
            Err(e) => {
                error!(LOG_TAG, "device {}: cannot create port: {}", device, e);
                flags.clear(device);
                notifier.notify(CommunicatorEvent::ConnectionError(ConnectionErrorEvent {
                    device,
                    reason: format!("cannot create port: {}", e),
                }));
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::dispatcher::ImmediateDispatcher;
    use super::super::entity::EventKind;
    use crate::driver::mock::{Call, CallLog, MockPort};
    use std::sync::mpsc::Receiver;
    use std::sync::Mutex;

    struct Rig {
        device: DeviceId,
        calls: CallLog,
        flags: Arc<CommunicationFlags>,
        queue: Arc<OutputQueue>,
        notifier: Arc<Notifier>,
        events: Receiver<CommunicatorEvent>,
    }

    fn rig(device: i32) -> Rig {
        let notifier = Arc::new(Notifier::new(Box::new(ImmediateDispatcher)));
        let (_, events) = notifier.subscribe_channel(EventKind::All);
        Rig {
            device: DeviceId::try_from(device).unwrap(),
            calls: Arc::new(Mutex::new(Vec::new())),
            flags: Arc::new(CommunicationFlags::new()),
            queue: Arc::new(OutputQueue::new()),
            notifier,
            events,
        }
    }

    impl Rig {
        fn port(&self) -> MockPort {
            MockPort::new(Arc::clone(&self.calls))
        }

        fn poll_loop(&self, port: MockPort) -> PollLoop {
            PollLoop::new(
                self.device,
                Box::new(port),
                Arc::clone(&self.flags),
                Arc::clone(&self.queue),
                Arc::clone(&self.notifier),
            )
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn events(&self) -> Vec<CommunicatorEvent> {
            self.events.try_iter().collect()
        }
    }

    fn digital(device: DeviceId, port: u8, value: bool) -> CommunicatorEvent {
        CommunicatorEvent::DigitalInput(DigitalInputChangeEvent { device, port, value })
    }

    fn analog(device: DeviceId, port: u8, value: u8) -> CommunicatorEvent {
        CommunicatorEvent::AnalogInput(AnalogInputChangeEvent { device, port, value })
    }

    #[test]
    fn test_digital_edges() {
        let rig = rig(0);
        let mut port = rig.port();
        port.digital_script = vec![0b00000, 0b00001, 0b00001, 0b00011].into();
        let mut poll_loop = rig.poll_loop(port);

        assert!(poll_loop.open());
        assert_eq!(poll_loop.state(), PollState::Polling);
        for _ in 0..4 {
            poll_loop.poll_once().unwrap();
        }

        assert_eq!(
            rig.events(),
            vec![digital(rig.device, 1, true), digital(rig.device, 2, true)]
        );
    }

    #[test]
    fn test_digital_change_order_is_high_bit_first() {
        let rig = rig(1);
        let mut port = rig.port();
        // bits 5..7 are not inputs and never reported
        port.digital_script = vec![0b1110_0101, 0b1110_0000].into();
        let mut poll_loop = rig.poll_loop(port);
        poll_loop.open();
        poll_loop.poll_once().unwrap();
        poll_loop.poll_once().unwrap();

        assert_eq!(
            rig.events(),
            vec![
                digital(rig.device, 3, true),
                digital(rig.device, 1, true),
                digital(rig.device, 3, false),
                digital(rig.device, 1, false),
            ]
        );
    }

    #[test]
    fn test_analog_changes() {
        let rig = rig(2);
        let mut port = rig.port();
        port.analog_script = vec![(0, 0), (10, 0), (10, 0), (10, 255), (3, 4)].into();
        let mut poll_loop = rig.poll_loop(port);
        poll_loop.open();
        for _ in 0..5 {
            poll_loop.poll_once().unwrap();
        }

        assert_eq!(
            rig.events(),
            vec![
                analog(rig.device, 0, 10),
                analog(rig.device, 1, 255),
                analog(rig.device, 0, 3),
                analog(rig.device, 1, 4),
            ]
        );
    }

    #[test]
    fn test_digital_outputs_fifo_for_own_device_only() {
        let rig = rig(0);
        let outputs = [(3, true), (1, false), (8, true), (3, false)];
        for (port, value) in outputs {
            rig.queue.enqueue_digital(DigitalIo { device: 0, port, value }).unwrap();
        }
        rig.queue.enqueue_digital(DigitalIo { device: 1, port: 2, value: true }).unwrap();

        let mut poll_loop = rig.poll_loop(rig.port());
        poll_loop.open();
        poll_loop.poll_once().unwrap();

        let writes: Vec<Call> = rig
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::SetDigital(_) | Call::ClearDigital(_)))
            .collect();
        assert_eq!(
            writes,
            vec![Call::SetDigital(3), Call::ClearDigital(1), Call::SetDigital(8), Call::ClearDigital(3)]
        );
        assert_eq!(rig.queue.pending(rig.device), (0, 0));
        assert_eq!(rig.queue.pending(DeviceId::try_from(1).unwrap()), (1, 0));
    }

    #[test]
    fn test_poll_step_order() {
        let rig = rig(0);
        rig.queue.enqueue_digital(DigitalIo { device: 0, port: 1, value: true }).unwrap();
        rig.queue.enqueue_analog(AnalogIo { device: 0, port: 1, value: 128 }).unwrap();
        let mut poll_loop = rig.poll_loop(rig.port());
        poll_loop.open();
        poll_loop.poll_once().unwrap();

        assert_eq!(
            rig.calls(),
            vec![
                Call::Open(0),
                Call::ReadAllDigital,
                Call::SetDigital(1),
                Call::ReadAllAnalog,
                Call::OutputAnalog(2, 128),
            ]
        );
    }

    #[test]
    fn test_out_of_range_analog_is_dropped() {
        let rig = rig(0);
        rig.queue.enqueue_analog(AnalogIo { device: 0, port: 0, value: 300 }).unwrap();
        rig.queue.enqueue_analog(AnalogIo { device: 0, port: 0, value: -1 }).unwrap();
        rig.queue.enqueue_analog(AnalogIo { device: 0, port: 0, value: 255 }).unwrap();
        let mut poll_loop = rig.poll_loop(rig.port());
        poll_loop.open();
        poll_loop.poll_once().unwrap();

        let writes: Vec<Call> = rig
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::OutputAnalog(..)))
            .collect();
        assert_eq!(writes, vec![Call::OutputAnalog(1, 255)]);
        assert_eq!(rig.queue.pending(rig.device), (0, 0));
        assert!(rig.events().is_empty());
    }

    #[test]
    fn test_card_not_found() {
        let rig = rig(0);
        let mut port = rig.port();
        port.found = false;
        assert!(rig.flags.raise(rig.device));
        rig.poll_loop(port).run();

        assert_eq!(rig.calls(), vec![Call::Open(0), Call::Close]);
        let events = rig.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], CommunicatorEvent::ConnectionError(ref e) if e.device == rig.device));
        assert!(!rig.flags.is_raised(rig.device));
    }

    #[test]
    fn test_run_stops_when_flag_cleared() {
        let rig = rig(3);
        let mut port = rig.port();
        port.digital_script = vec![0, 0b10000].into();
        let flags = Arc::clone(&rig.flags);
        let device = rig.device;
        port.on_exhausted = Some(Box::new(move || flags.clear(device)));
        assert!(rig.flags.raise(rig.device));
        rig.poll_loop(port).run();

        let calls = rig.calls();
        assert_eq!(calls.first(), Some(&Call::Open(3)));
        assert_eq!(calls.last(), Some(&Call::Close));
        assert_eq!(calls.iter().filter(|c| **c == Call::ReadAllDigital).count(), 3);
        assert_eq!(rig.events(), vec![digital(rig.device, 5, true)]);
    }

    #[test]
    fn test_failed_write_ends_loop_and_keeps_rest_queued() {
        let rig = rig(0);
        for port in 1..=3 {
            rig.queue.enqueue_digital(DigitalIo { device: 0, port, value: true }).unwrap();
        }
        let mut port = rig.port();
        port.fail_on_dispatch = Some(2);
        assert!(rig.flags.raise(rig.device));
        rig.poll_loop(port).run();

        assert_eq!(rig.calls().last(), Some(&Call::Close));
        assert_eq!(rig.queue.drain_digital(rig.device), vec![DigitalIo { device: 0, port: 3, value: true }]);
        assert!(!rig.flags.is_raised(rig.device));
        let events = rig.events();
        assert!(matches!(events.last(), Some(CommunicatorEvent::ConnectionError(_))));
    }
}
