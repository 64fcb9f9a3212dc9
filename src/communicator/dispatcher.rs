//! where subscriber callbacks run
//! - `ImmediateDispatcher`: on the poll thread that raised the event
//! - `QueuedDispatcher`: posted to a channel, run by whoever owns the `DeliveryPump`
//! - a full bounded queue drops the delivery, a poll loop never waits on the consumer

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use crate::{debug, warn};

const LOG_TAG: &str = "dispatcher";

pub type Delivery = Box<dyn FnOnce() + Send>;

pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, delivery: Delivery);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateDispatcher;

impl Dispatcher for ImmediateDispatcher {
    fn dispatch(&self, delivery: Delivery) {
        delivery()
    }
}

pub struct QueuedDispatcher {
    tx: Sender<Delivery>,
    dropped: AtomicUsize,
}

impl QueuedDispatcher {
    /// `bound` 0 gives an unbounded queue, otherwise deliveries beyond `bound` are dropped
    pub fn new(bound: usize) -> (Self, DeliveryPump) {
        let (tx, rx) = if bound == 0 {
            channel::unbounded()
        } else {
            channel::bounded(bound)
        };
        (Self { tx, dropped: AtomicUsize::new(0) }, DeliveryPump { rx })
    }

    /// deliveries dropped because the queue was full
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Dispatcher for QueuedDispatcher {
    fn dispatch(&self, delivery: Delivery) {
        match self.tx.try_send(delivery) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(LOG_TAG, "delivery queue full, event dropped ({} so far)", dropped);
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(LOG_TAG, "delivery pump is gone, event dropped");
            }
        }
    }
}

/// runs queued deliveries on the thread that owns it
pub struct DeliveryPump {
    rx: Receiver<Delivery>,
}

impl DeliveryPump {
    /// run everything queued so far without waiting, returns how many ran
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        while let Ok(delivery) = self.rx.try_recv() {
            delivery();
            count += 1;
        }
        count
    }

    /// run deliveries as they arrive until `timeout` has passed
    pub fn run_for(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut count = 0;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(left) {
                Ok(delivery) => {
                    delivery();
                    count += 1;
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return count,
            }
        }
    }

    /// run deliveries until `done` returns true, checking at least every `tick`
    pub fn run_until<F: FnMut() -> bool>(&self, tick: Duration, mut done: F) -> usize {
        let mut count = 0;
        while !done() {
            match self.rx.recv_timeout(tick) {
                Ok(delivery) => {
                    delivery();
                    count += 1;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        count + self.run_pending()
    }
}
