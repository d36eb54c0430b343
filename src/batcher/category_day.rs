use crate::batcher::batch::{BatchKey, FinalizedBatch};
use crate::broker::{MessagePosition, TopicPartition};
use crate::locale::{DateError, DayParser};
use crate::record::{Record, TopicClass};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

pub const UNKNOWN_CATEGORY: &str = "unknown";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("cannot place record {href} (category {category}): unparseable date '{raw_date}': {source}")]
    Date {
        href: String,
        category: String,
        raw_date: String,
        #[source]
        source: DateError,
    },
}

/// Make a category label usable as a single storage path segment.
pub fn sanitize_category(category: Option<&str>) -> String {
    let trimmed = category.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return UNKNOWN_CATEGORY.to_string();
    }

    let sanitized: String = trimmed
        .chars()
        .map(|c| match c {
            '/' | '\\' => '-',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    // "." and ".." would address the parent or the root itself
    if sanitized.chars().all(|c| c == '.') {
        return "_".repeat(sanitized.len());
    }
    sanitized
}

/// Per (topic-class, category) accumulation for a single day.
#[derive(Debug, Default)]
struct CategoryBatchState {
    current_day: Option<NaiveDate>,
    pending: Vec<Record>,
    held_offsets: HashMap<TopicPartition, u64>,
}

impl CategoryBatchState {
    fn hold(&mut self, position: &MessagePosition) {
        self.held_offsets
            .entry(position.partition.clone())
            .and_modify(|lowest| *lowest = (*lowest).min(position.offset))
            .or_insert(position.offset);
    }

    fn take_batch(&mut self, topic_class: TopicClass, category: &str, day: NaiveDate) -> FinalizedBatch {
        FinalizedBatch::new(
            BatchKey {
                topic_class,
                category: category.to_string(),
                day,
            },
            std::mem::take(&mut self.pending),
            std::mem::take(&mut self.held_offsets),
        )
    }
}

/// Groups an unbounded record stream into per-(topic-class, category, day) batches.
///
/// Each key tracks exactly one current day. A record for a different day
/// finalizes the accumulated batch before it is appended. Keys never
/// influence one another. A key that stops receiving records is only
/// finalized by `drain`.
pub struct CategoryDayBatcher {
    parser: Box<dyn DayParser>,
    states: BTreeMap<(TopicClass, String), CategoryBatchState>,
}

impl CategoryDayBatcher {
    pub fn new(parser: Box<dyn DayParser>) -> Self {
        Self {
            parser,
            states: BTreeMap::new(),
        }
    }

    /// Add a record. Returns the previous day's batch if this record rolled its key over.
    pub fn ingest(
        &mut self,
        topic_class: TopicClass,
        record: Record,
    ) -> Result<Option<FinalizedBatch>, IngestError> {
        self.ingest_at(topic_class, record, None)
    }

    /// Like `ingest`, also remembering where the record sits in the broker log.
    pub fn ingest_at(
        &mut self,
        topic_class: TopicClass,
        record: Record,
        position: Option<&MessagePosition>,
    ) -> Result<Option<FinalizedBatch>, IngestError> {
        let category = sanitize_category(record.category.as_deref());

        let day = self
            .parser
            .parse_day(&record.raw_date)
            .map_err(|source| IngestError::Date {
                href: record.href.clone(),
                category: category.clone(),
                raw_date: record.raw_date.clone(),
                source,
            })?;

        let state = self
            .states
            .entry((topic_class, category.clone()))
            .or_default();

        let completed = match state.current_day {
            Some(current) if current != day => {
                if day < current {
                    tracing::warn!(
                        topic_class = %topic_class,
                        category = %category,
                        current_day = %current,
                        day = %day,
                        "Day moved backwards, finalizing current batch"
                    );
                }
                let batch = state.take_batch(topic_class, &category, current);
                Some(batch)
            }
            _ => None,
        };

        state.current_day = Some(day);
        if let Some(position) = position {
            state.hold(position);
        }
        state.pending.push(record);

        Ok(completed)
    }

    /// Finalize every non-empty pending batch. A second call returns nothing.
    pub fn drain(&mut self) -> Vec<FinalizedBatch> {
        std::mem::take(&mut self.states)
            .into_iter()
            .filter_map(|((topic_class, category), mut state)| {
                let day = state.current_day?;
                if state.pending.is_empty() {
                    return None;
                }
                Some(state.take_batch(topic_class, &category, day))
            })
            .collect()
    }

    /// Current day and pending records for a (sanitized) category.
    pub fn pending(&self, topic_class: TopicClass, category: &str) -> Option<(NaiveDate, &[Record])> {
        let state = self.states.get(&(topic_class, category.to_string()))?;
        state.current_day.map(|day| (day, state.pending.as_slice()))
    }

    /// Total records waiting across all keys
    pub fn pending_records(&self) -> usize {
        self.states.values().map(|s| s.pending.len()).sum()
    }

    pub fn tracked_keys(&self) -> usize {
        self.states.len()
    }

    /// Lowest offset still held in memory on each partition.
    pub fn held_offsets(&self) -> HashMap<TopicPartition, u64> {
        let mut lowest: HashMap<TopicPartition, u64> = HashMap::new();
        for state in self.states.values() {
            for (tp, offset) in &state.held_offsets {
                lowest
                    .entry(tp.clone())
                    .and_modify(|o| *o = (*o).min(*offset))
                    .or_insert(*offset);
            }
        }
        lowest
    }

    pub fn locale_name(&self) -> &'static str {
        self.parser.locale_name()
    }
}
