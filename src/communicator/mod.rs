//! communicator core: output queue, poll loops, notification routing

pub mod entity;
pub mod flags;
pub mod output_queue;
pub mod dispatcher;
pub mod notifier;
pub mod device_thread;
pub mod communicator;

pub use communicator::Communicator;
pub use dispatcher::{DeliveryPump, Dispatcher, ImmediateDispatcher, QueuedDispatcher};
pub use entity::*;
pub use notifier::SubscriptionId;
