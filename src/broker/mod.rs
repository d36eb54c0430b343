pub mod memory;
pub mod traits;

pub use memory::{MemoryBroker, MemoryConsumer, MemoryProducer};
pub use traits::{BrokerError, Consumer, Message, MessagePosition, Producer, TopicPartition};
