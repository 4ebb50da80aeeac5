//! AMQP-backed implementation of the Broker Adapter: connection and channel
//! management, topology declaration, and the publish/consume surface every
//! worker is built on.

pub mod adapter;
pub mod reconnect;
pub mod topology;

pub use adapter::{AdapterHealth, BrokerAdapter};

pub mod prelude {
    pub use crate::adapter::{AdapterHealth, BrokerAdapter};
    pub use crate::reconnect::{backoff_for_attempt, MAX_RECONNECT_ATTEMPTS};
    pub use crate::topology::{DEAD_LETTER_EXCHANGE, DEAD_LETTER_QUEUE, MAIN_EXCHANGE, QUEUES};
}
