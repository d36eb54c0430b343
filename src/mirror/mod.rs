pub mod elasticsearch;

pub use elasticsearch::ElasticsearchIndex;

use crate::locale::DayParser;
use crate::record::Record;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("index rejected document {id} with status {status}: {message}")]
    Rejected {
        id: String,
        status: u16,
        message: String,
    },

    #[error("failed to build document: {0}")]
    Document(#[from] serde_json::Error),

    #[error("mirror config error: {0}")]
    Config(String),
}

/// Best-effort search index: `upsert(id, document)`.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn upsert(&self, id: &str, document: &Value) -> Result<(), MirrorError>;
}

const ISO_DATETIME: &str = "%Y-%m-%dT%H:%M:%S";

/// Record as indexed: article and comment dates converted to ISO datetimes,
/// or null when they can't be parsed.
pub fn to_search_document(record: &Record, parser: &dyn DayParser) -> Result<Value, MirrorError> {
    let mut document = serde_json::to_value(record)?;

    let iso = |raw: &str| -> Value {
        parser
            .parse_datetime(raw)
            .map(|dt| Value::String(dt.format(ISO_DATETIME).to_string()))
            .unwrap_or(Value::Null)
    };

    if let Some(obj) = document.as_object_mut() {
        obj.insert("date".to_string(), iso(&record.raw_date));
        if let Some(Value::Array(comments)) = obj.get_mut("comments") {
            for (value, comment) in comments.iter_mut().zip(&record.comments) {
                if let Some(c) = value.as_object_mut() {
                    c.insert("date".to_string(), iso(&comment.raw_date));
                }
            }
        }
    }

    Ok(document)
}

/// Sender side of the mirror task. Submitting never waits.
pub struct MirrorHandle {
    tx: Option<mpsc::Sender<Record>>,
    task: Option<JoinHandle<MirrorStats>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub indexed: u64,
    pub failed: u64,
}

impl MirrorHandle {
    /// Spawn the background task that feeds `index`.
    pub fn spawn(
        index: Arc<dyn SearchIndex>,
        parser: Arc<dyn DayParser>,
        queue_size: usize,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<Record>(queue_size.max(1));

        let task = tokio::spawn(async move {
            let mut stats = MirrorStats::default();
            while let Some(record) = rx.recv().await {
                let result = match to_search_document(&record, parser.as_ref()) {
                    Ok(doc) => index.upsert(&record.href, &doc).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(()) => {
                        stats.indexed += 1;
                        debug!(href = %record.href, "Mirrored record to search index");
                    }
                    Err(e) => {
                        stats.failed += 1;
                        warn!(href = %record.href, error = %e, "Search index mirror failed");
                    }
                }
            }
            stats
        });

        Self {
            tx: Some(tx),
            task: Some(task),
        }
    }

    /// A handle that discards everything, for when no index is configured.
    pub fn disabled() -> Self {
        Self { tx: None, task: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue a record for indexing. Drops it (with a warning) if the queue is full.
    pub fn submit(&self, record: Record) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.try_send(record) {
            let (reason, href) = match &e {
                mpsc::error::TrySendError::Full(r) => ("queue full", r.href.clone()),
                mpsc::error::TrySendError::Closed(r) => ("mirror stopped", r.href.clone()),
            };
            warn!(href = %href, reason = reason, "Dropping search index mirror update");
        }
    }

    /// Stop accepting records and wait for queued ones to finish.
    pub async fn close(mut self) -> MirrorStats {
        drop(self.tx.take());
        match self.task.take() {
            Some(task) => match task.await {
                Ok(stats) => {
                    info!(indexed = stats.indexed, failed = stats.failed, "Search mirror stopped");
                    stats
                }
                Err(e) => {
                    warn!(error = %e, "Search mirror task join error");
                    MirrorStats::default()
                }
            },
            None => MirrorStats::default(),
        }
    }
}
