use crate::broker::{MessagePosition, TopicPartition};
use std::collections::{BTreeMap, HashMap};

/// Tracks how far each partition may be committed.
///
/// Offsets are "next offset to read". A partition advances to the highest
/// handled offset + 1, but never past the lowest offset still held by an
/// unwritten batch.
#[derive(Debug, Default)]
pub struct CommitTracker {
    handled: BTreeMap<TopicPartition, u64>,
    committed: HashMap<TopicPartition, u64>,
}

impl CommitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The record at `position` was ingested or deliberately dropped.
    pub fn mark_handled(&mut self, position: &MessagePosition) {
        let next = position.offset + 1;
        self.handled
            .entry(position.partition.clone())
            .and_modify(|n| *n = (*n).max(next))
            .or_insert(next);
    }

    /// Commits that would move a partition forward, given the offsets still
    /// held by each source of unwritten records.
    pub fn pending_commits(
        &self,
        held: &[&HashMap<TopicPartition, u64>],
    ) -> Vec<(TopicPartition, u64)> {
        self.handled
            .iter()
            .filter_map(|(tp, &next)| {
                let target = held
                    .iter()
                    .filter_map(|h| h.get(tp).copied())
                    .fold(next, u64::min);
                let last = self.committed.get(tp).copied().unwrap_or(0);
                (target > last).then(|| (tp.clone(), target))
            })
            .collect()
    }

    pub fn record_committed(&mut self, commits: &[(TopicPartition, u64)]) {
        for (tp, offset) in commits {
            self.committed.insert(tp.clone(), *offset);
        }
    }

    pub fn committed(&self, partition: &TopicPartition) -> Option<u64> {
        self.committed.get(partition).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(partition: u32, offset: u64) -> MessagePosition {
        MessagePosition {
            partition: TopicPartition::new("raw", partition),
            offset,
        }
    }

    #[test]
    fn test_commits_highest_handled_when_nothing_held() {
        let mut tracker = CommitTracker::new();
        tracker.mark_handled(&pos(0, 0));
        tracker.mark_handled(&pos(0, 1));
        tracker.mark_handled(&pos(1, 4));

        let commits = tracker.pending_commits(&[]);
        assert_eq!(
            commits,
            vec![
                (TopicPartition::new("raw", 0), 2),
                (TopicPartition::new("raw", 1), 5)
            ]
        );
    }

    #[test]
    fn test_held_offsets_cap_the_commit() {
        let mut tracker = CommitTracker::new();
        for offset in 0..10 {
            tracker.mark_handled(&pos(0, offset));
        }

        let pending: HashMap<_, _> = [(TopicPartition::new("raw", 0), 6)].into();
        let parked: HashMap<_, _> = [(TopicPartition::new("raw", 0), 3)].into();

        assert_eq!(
            tracker.pending_commits(&[&pending, &parked]),
            vec![(TopicPartition::new("raw", 0), 3)]
        );
        assert_eq!(
            tracker.pending_commits(&[&pending]),
            vec![(TopicPartition::new("raw", 0), 6)]
        );
    }

    #[test]
    fn test_no_commit_without_progress() {
        let mut tracker = CommitTracker::new();
        tracker.mark_handled(&pos(0, 2));
        let commits = tracker.pending_commits(&[]);
        tracker.record_committed(&commits);

        assert_eq!(tracker.committed(&TopicPartition::new("raw", 0)), Some(3));
        assert!(tracker.pending_commits(&[]).is_empty());

        // Held at 0 means nothing on the partition is durable yet
        let held: HashMap<_, _> = [(TopicPartition::new("raw", 1), 0)].into();
        tracker.mark_handled(&pos(1, 0));
        assert!(tracker.pending_commits(&[&held]).is_empty());
    }
}
