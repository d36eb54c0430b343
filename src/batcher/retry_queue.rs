use crate::batcher::batch::{BatchKey, FinalizedBatch};
use crate::broker::TopicPartition;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// Finalized batches whose write failed after all attempts.
///
/// Batches stay here, holding back offset commits for their records, until a
/// later retry succeeds. Writes are idempotent per key, so parking a key twice
/// keeps only the newest batch, still holding the older batch's offsets.
pub struct RetryQueue {
    max_parked: usize,
    parked: VecDeque<ParkedBatch>,
}

struct ParkedBatch {
    batch: FinalizedBatch,
    parked_at: Instant,
    failures: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParkOutcome {
    Parked,
    Replaced,
    /// Queue was full; the oldest batch was discarded to make room
    Evicted(BatchKey),
}

impl RetryQueue {
    pub fn new(max_parked: usize) -> Self {
        Self {
            max_parked: max_parked.max(1),
            parked: VecDeque::new(),
        }
    }

    pub fn park(&mut self, mut batch: FinalizedBatch) -> ParkOutcome {
        if let Some(existing) = self.parked.iter_mut().find(|p| p.batch.key == batch.key) {
            for (tp, offset) in &existing.batch.held_offsets {
                batch
                    .held_offsets
                    .entry(tp.clone())
                    .and_modify(|o| *o = (*o).min(*offset))
                    .or_insert(*offset);
            }
            existing.failures += 1;
            existing.batch = batch;
            existing.parked_at = Instant::now();
            return ParkOutcome::Replaced;
        }

        let mut outcome = ParkOutcome::Parked;
        if self.parked.len() >= self.max_parked {
            if let Some(removed) = self.parked.pop_front() {
                tracing::error!(
                    key = %removed.batch.key,
                    batch_id = %removed.batch.batch_id,
                    records = removed.batch.len(),
                    "Retry queue full, discarding oldest unwritten batch"
                );
                outcome = ParkOutcome::Evicted(removed.batch.key);
            }
        }

        self.parked.push_back(ParkedBatch {
            batch,
            parked_at: Instant::now(),
            failures: 1,
        });
        outcome
    }

    /// Remove every parked batch for a retry pass. Failures must be parked again.
    pub fn take_all(&mut self) -> Vec<FinalizedBatch> {
        self.parked.drain(..).map(|p| p.batch).collect()
    }

    pub fn len(&self) -> usize {
        self.parked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parked.is_empty()
    }

    pub fn keys(&self) -> Vec<BatchKey> {
        self.parked.iter().map(|p| p.batch.key.clone()).collect()
    }

    /// Lowest offset held by any parked batch on each partition.
    pub fn held_offsets(&self) -> HashMap<TopicPartition, u64> {
        let mut lowest: HashMap<TopicPartition, u64> = HashMap::new();
        for parked in &self.parked {
            for (tp, offset) in &parked.batch.held_offsets {
                lowest
                    .entry(tp.clone())
                    .and_modify(|o| *o = (*o).min(*offset))
                    .or_insert(*offset);
            }
        }
        lowest
    }

    pub fn stats(&self) -> RetryStats {
        RetryStats {
            parked: self.parked.len(),
            max_parked: self.max_parked,
            oldest_parked_secs: self
                .parked
                .iter()
                .map(|p| p.parked_at.elapsed().as_secs())
                .max()
                .unwrap_or(0),
            total_failures: self.parked.iter().map(|p| p.failures as u64).sum(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryStats {
    pub parked: usize,
    pub max_parked: usize,
    pub oldest_parked_secs: u64,
    pub total_failures: u64,
}
