// Module messaging - Transport notifications and cross-thread event channels

pub mod channels;
pub mod event_bus;

pub use channels::{EventConsumer, EventProducer, create_event_channel};
pub use event_bus::{EventBus, ListenerId};
