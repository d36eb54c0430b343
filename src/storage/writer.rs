use super::traits::{BlobStore, StorageError};
use crate::batcher::{BatchKey, FinalizedBatch};
use crate::record::{Record, TopicClass};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to serialize batch {key}: {source}")]
    Serialize {
        key: BatchKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Store {
        path: String,
        #[source]
        source: StorageError,
    },
}

impl WriteError {
    /// Serialization failures will fail identically on every attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, WriteError::Store { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { path: String, bytes: usize },
    SkippedEmpty,
}

/// `{root}/{category}/{YYYY-MM-DD}.json`, with one root per topic class.
#[derive(Debug, Clone)]
pub struct PathLayout {
    raw_root: String,
    processed_root: String,
}

impl PathLayout {
    pub fn new(raw_root: &str, processed_root: &str) -> Self {
        Self {
            raw_root: raw_root.trim_end_matches('/').to_string(),
            processed_root: processed_root.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self, topic_class: TopicClass) -> &str {
        match topic_class {
            TopicClass::Raw => &self.raw_root,
            TopicClass::Processed => &self.processed_root,
        }
    }

    pub fn path_for(&self, key: &BatchKey) -> String {
        format!(
            "{}/{}/{}.json",
            self.root(key.topic_class),
            key.category,
            key.day.format("%Y-%m-%d")
        )
    }
}

/// Pretty JSON array, 4-space indent, non-ASCII text left unescaped.
pub fn encode_records(records: &[Record]) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    records.serialize(&mut serializer)?;
    Ok(out)
}

/// Persists one finalized batch as one file, replacing any previous content.
#[derive(Clone)]
pub struct BatchWriter {
    store: Arc<dyn BlobStore>,
    layout: PathLayout,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn BlobStore>, layout: PathLayout) -> Self {
        Self { store, layout }
    }

    pub fn layout(&self) -> &PathLayout {
        &self.layout
    }

    pub async fn write(&self, batch: &FinalizedBatch) -> Result<WriteOutcome, WriteError> {
        if batch.is_empty() {
            debug!(key = %batch.key, "Skipping empty batch");
            return Ok(WriteOutcome::SkippedEmpty);
        }

        let path = self.layout.path_for(&batch.key);
        let bytes = encode_records(&batch.records).map_err(|source| WriteError::Serialize {
            key: batch.key.clone(),
            source,
        })?;
        let len = bytes.len();

        self.store
            .put(&path, bytes, true)
            .await
            .map_err(|source| WriteError::Store {
                path: path.clone(),
                source,
            })?;

        Ok(WriteOutcome::Written { path, bytes: len })
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1` (attempts are 1-based)
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// `BatchWriter` with bounded retries and exponential backoff.
#[derive(Clone)]
pub struct RetryingWriter {
    writer: BatchWriter,
    policy: RetryPolicy,
}

impl RetryingWriter {
    pub fn new(writer: BatchWriter, policy: RetryPolicy) -> Self {
        Self { writer, policy }
    }

    pub fn layout(&self) -> &PathLayout {
        self.writer.layout()
    }

    pub async fn write(&self, batch: &FinalizedBatch) -> Result<WriteOutcome, WriteError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.writer.write(batch).await {
                Ok(outcome) => {
                    if let WriteOutcome::Written { path, bytes } = &outcome {
                        info!(
                            key = %batch.key,
                            batch_id = %batch.batch_id,
                            records = batch.len(),
                            path = %path,
                            bytes = bytes,
                            attempt = attempt,
                            "Wrote batch"
                        );
                    }
                    return Ok(outcome);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.backoff_after(attempt);
                    warn!(
                        key = %batch.key,
                        batch_id = %batch.batch_id,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "Batch write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
