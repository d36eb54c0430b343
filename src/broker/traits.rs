use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: u32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.topic, self.partition)
    }
}

/// Where a message sits in the log.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessagePosition {
    pub partition: TopicPartition,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn position(&self) -> MessagePosition {
        MessagePosition {
            partition: TopicPartition::new(self.topic.clone(), self.partition),
            offset: self.offset,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker connection lost: {0}")]
    Disconnected(String),

    #[error("consumer is closed")]
    Closed,

    #[error("unknown topic '{0}'")]
    UnknownTopic(String),

    #[error("offset commit failed: {0}")]
    Commit(String),
}

/// A consumer-group member with manual offset commit.
///
/// Delivery is at-least-once and ordered within a partition. Offsets passed to
/// `commit` are the next offset to read, so committing `n` acknowledges every
/// message below `n` on that partition.
#[async_trait]
pub trait Consumer: Send {
    /// Wait up to `timeout` for the next message. `Ok(None)` means nothing arrived.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Message>, BrokerError>;

    async fn commit(&mut self, offsets: &[(TopicPartition, u64)]) -> Result<(), BrokerError>;

    async fn close(&mut self) -> Result<(), BrokerError>;
}

#[async_trait]
pub trait Producer: Send + Sync {
    async fn send(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: Vec<u8>,
    ) -> Result<MessagePosition, BrokerError>;

    /// Block until every sent message is durable.
    async fn flush(&self) -> Result<(), BrokerError>;
}
