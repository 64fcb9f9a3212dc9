//! per-device "communicating" flags shared between the communicator and its loops

use std::sync::atomic::{AtomicBool, Ordering};
use crate::driver::entity::{DeviceId, DEVICE_NUM};

#[derive(Debug, Default)]
pub struct CommunicationFlags {
    flags: [AtomicBool; DEVICE_NUM],
}

impl CommunicationFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// raise the flag, false when it was already raised
    pub fn raise(&self, device: DeviceId) -> bool {
        self.flags[device.index()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn clear(&self, device: DeviceId) {
        self.flags[device.index()].store(false, Ordering::Release);
    }

    pub fn is_raised(&self, device: DeviceId) -> bool {
        self.flags[device.index()].load(Ordering::Acquire)
    }
}
