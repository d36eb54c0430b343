use crate::broker::TopicPartition;
use crate::record::{Record, TopicClass};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Identity of a partition in the store: one file per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchKey {
    pub topic_class: TopicClass,
    pub category: String,
    pub day: NaiveDate,
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.topic_class,
            self.category,
            self.day.format("%Y-%m-%d")
        )
    }
}

/// All records accumulated for one (topic-class, category, day) between rollovers.
#[derive(Debug, Clone)]
pub struct FinalizedBatch {
    /// Unique batch ID (for log correlation across retries)
    pub batch_id: Uuid,

    pub key: BatchKey,

    /// Records in arrival order
    pub records: Vec<Record>,

    /// Lowest broker offset held by this batch on each partition.
    /// Offsets at or above these must not be committed until the batch is written.
    pub held_offsets: HashMap<TopicPartition, u64>,

    pub created_at: DateTime<Utc>,
}

impl FinalizedBatch {
    pub fn new(
        key: BatchKey,
        records: Vec<Record>,
        held_offsets: HashMap<TopicPartition, u64>,
    ) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            key,
            records,
            held_offsets,
            created_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
