//! Host-side communicator for K8055-style USB I/O cards (up to four per host).
//!
//! One poll loop per card samples the inputs, reports changes to subscribers and
//! writes the outputs queued through the [`Communicator`].

pub mod common;
pub mod driver;
pub mod communicator;

pub use common::error::{DriverError, ValidationError};
pub use communicator::Communicator;
