use super::traits::{BrokerError, Consumer, Message, MessagePosition, Producer, TopicPartition};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// In-process partitioned log with consumer-group offsets.
///
/// Messages are retained forever. A consumer that joins a group resumes from
/// the group's committed offsets, so anything consumed but not committed is
/// delivered again.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    default_partitions: u32,
    appended: watch::Sender<u64>,
}

#[derive(Default)]
struct State {
    topics: HashMap<String, Vec<Vec<Message>>>,
    committed: HashMap<(String, TopicPartition), u64>,
    round_robin: HashMap<String, u32>,
    failure: Option<String>,
}

impl MemoryBroker {
    pub fn new(default_partitions: u32) -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                default_partitions: default_partitions.max(1),
                appended,
            }),
        }
    }

    pub fn create_topic(&self, topic: &str, partitions: u32) {
        let mut state = self.lock();
        state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); partitions.max(1) as usize]);
    }

    pub fn producer(&self) -> MemoryProducer {
        MemoryProducer {
            broker: self.clone(),
        }
    }

    pub fn consumer(&self, group: &str, topics: &[&str]) -> MemoryConsumer {
        MemoryConsumer {
            broker: self.clone(),
            group: group.to_string(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
            positions: HashMap::new(),
            cursor: 0,
            appended: self.inner.appended.subscribe(),
            closed: false,
        }
    }

    /// Committed offset for a group on one partition, if any.
    pub fn committed(&self, group: &str, partition: &TopicPartition) -> Option<u64> {
        self.lock()
            .committed
            .get(&(group.to_string(), partition.clone()))
            .copied()
    }

    pub fn topic_len(&self, topic: &str) -> usize {
        self.lock()
            .topics
            .get(topic)
            .map(|partitions| partitions.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn partition_count(&self, topic: &str) -> u32 {
        self.lock()
            .topics
            .get(topic)
            .map(|p| p.len() as u32)
            .unwrap_or(0)
    }

    /// Make every subsequent poll and send fail, as if the connection dropped.
    pub fn disconnect(&self, reason: &str) {
        self.lock().failure = Some(reason.to_string());
        self.inner.appended.send_modify(|v| *v += 1);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-append; the log is still usable.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn append(&self, topic: &str, key: Option<&str>, payload: Vec<u8>) -> Result<MessagePosition, BrokerError> {
        let position = {
            let mut state = self.lock();
            if let Some(reason) = &state.failure {
                return Err(BrokerError::Disconnected(reason.clone()));
            }

            let default_partitions = self.inner.default_partitions as usize;
            let partition_count = state
                .topics
                .entry(topic.to_string())
                .or_insert_with(|| vec![Vec::new(); default_partitions])
                .len() as u32;

            let partition = match key {
                Some(k) => {
                    let mut hasher = DefaultHasher::new();
                    k.hash(&mut hasher);
                    (hasher.finish() % partition_count as u64) as u32
                }
                None => {
                    let counter = state.round_robin.entry(topic.to_string()).or_insert(0);
                    let p = *counter % partition_count;
                    *counter = counter.wrapping_add(1);
                    p
                }
            };

            let log = state
                .topics
                .get_mut(topic)
                .and_then(|partitions| partitions.get_mut(partition as usize))
                .ok_or_else(|| BrokerError::UnknownTopic(topic.to_string()))?;

            let offset = log.len() as u64;
            log.push(Message {
                topic: topic.to_string(),
                partition,
                offset,
                key: key.map(str::to_string),
                payload,
            });

            MessagePosition {
                partition: TopicPartition::new(topic, partition),
                offset,
            }
        };

        self.inner.appended.send_modify(|v| *v += 1);
        Ok(position)
    }
}

#[derive(Clone)]
pub struct MemoryProducer {
    broker: MemoryBroker,
}

#[async_trait]
impl Producer for MemoryProducer {
    async fn send(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: Vec<u8>,
    ) -> Result<MessagePosition, BrokerError> {
        self.broker.append(topic, key, payload)
    }

    async fn flush(&self) -> Result<(), BrokerError> {
        // Appends are synchronous
        Ok(())
    }
}

/// Single member of a consumer group; owns every partition of its topics.
pub struct MemoryConsumer {
    broker: MemoryBroker,
    group: String,
    topics: Vec<String>,
    positions: HashMap<TopicPartition, u64>,
    cursor: usize,
    appended: watch::Receiver<u64>,
    closed: bool,
}

impl MemoryConsumer {
    fn try_next(&mut self) -> Result<Option<Message>, BrokerError> {
        let state = self.broker.lock();
        if let Some(reason) = &state.failure {
            return Err(BrokerError::Disconnected(reason.clone()));
        }

        let mut assignments = Vec::new();
        for topic in &self.topics {
            if let Some(partitions) = state.topics.get(topic) {
                for p in 0..partitions.len() as u32 {
                    assignments.push(TopicPartition::new(topic.clone(), p));
                }
            }
        }
        if assignments.is_empty() {
            return Ok(None);
        }

        // Round-robin across partitions so one busy partition can't starve the rest
        for step in 0..assignments.len() {
            let idx = (self.cursor + step) % assignments.len();
            let tp = &assignments[idx];
            let position = *self.positions.entry(tp.clone()).or_insert_with(|| {
                state
                    .committed
                    .get(&(self.group.clone(), tp.clone()))
                    .copied()
                    .unwrap_or(0)
            });

            let log = &state.topics[&tp.topic][tp.partition as usize];
            if let Some(message) = log.get(position as usize) {
                let message = message.clone();
                self.positions.insert(tp.clone(), position + 1);
                self.cursor = idx + 1;
                return Ok(Some(message));
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Message>, BrokerError> {
        if self.closed {
            return Err(BrokerError::Closed);
        }

        let deadline = Instant::now() + timeout;
        loop {
            // Mark the current version seen before looking, so an append that
            // lands after the check still wakes us.
            self.appended.borrow_and_update();

            if let Some(message) = self.try_next()? {
                return Ok(Some(message));
            }

            match tokio::time::timeout_at(deadline, self.appended.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => return Err(BrokerError::Disconnected("broker dropped".to_string())),
                Err(_) => return Ok(None),
            }
        }
    }

    async fn commit(&mut self, offsets: &[(TopicPartition, u64)]) -> Result<(), BrokerError> {
        if self.closed {
            return Err(BrokerError::Closed);
        }

        let mut state = self.broker.lock();
        if let Some(reason) = &state.failure {
            return Err(BrokerError::Commit(reason.clone()));
        }
        for (tp, offset) in offsets {
            state
                .committed
                .insert((self.group.clone(), tp.clone()), *offset);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        self.closed = true;
        Ok(())
    }
}
