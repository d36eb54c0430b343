use crate::batcher::{BatchKey, CategoryDayBatcher, FinalizedBatch, ParkOutcome, RetryQueue};
use crate::broker::{BrokerError, Consumer, Message};
use crate::config::CommitPolicy;
use crate::mirror::{MirrorHandle, MirrorStats};
use crate::pipeline::commit::CommitTracker;
use crate::record::{Record, TopicClass};
use crate::storage::{RetryingWriter, WriteOutcome};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors that stop the worker
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
}

/// What the worker did over its lifetime.
#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub records_ingested: u64,
    /// Malformed payloads and unparseable dates
    pub records_dropped: u64,
    pub batches_written: u64,
    /// Write rounds that exhausted their retries
    pub batches_failed: u64,
    /// Keys whose batch was never written (still parked or evicted)
    pub unwritten: Vec<BatchKey>,
    pub mirror: MirrorStats,
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Physical topic name to topic class
    pub topics: HashMap<String, TopicClass>,
    pub commit_policy: CommitPolicy,
    pub poll_timeout: Duration,
    pub retry_interval: Duration,
    pub client_id: String,
}

impl WorkerSettings {
    pub fn new(raw_topic: &str, processed_topic: &str) -> Self {
        let topics = HashMap::from([
            (raw_topic.to_string(), TopicClass::Raw),
            (processed_topic.to_string(), TopicClass::Processed),
        ]);
        Self {
            topics,
            commit_policy: CommitPolicy::AfterFlush,
            poll_timeout: Duration::from_secs(1),
            retry_interval: Duration::from_secs(30),
            client_id: "sentipipe".to_string(),
        }
    }

    /// Topic names to subscribe to, in a stable order
    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Stop signals for a running worker.
#[derive(Debug, Clone, Default)]
pub struct WorkerControl {
    /// Stop polling now and drain
    pub cancel: CancellationToken,
    /// No more input will be produced. The worker drains once a poll comes back empty.
    pub input_closed: CancellationToken,
}

/// Owns the consumer, batcher, writer and retry queue.
///
/// Loop: poll, decode, ingest, write any finalized batch, commit. Parked
/// batches are retried on every `retry_interval` tick and once more at
/// shutdown.
pub struct Worker {
    consumer: Box<dyn Consumer>,
    batcher: CategoryDayBatcher,
    writer: RetryingWriter,
    retry_queue: RetryQueue,
    mirror: MirrorHandle,
    commits: CommitTracker,
    settings: WorkerSettings,
    report: WorkerReport,
    evicted: Vec<BatchKey>,
}

impl Worker {
    pub fn new(
        consumer: Box<dyn Consumer>,
        batcher: CategoryDayBatcher,
        writer: RetryingWriter,
        retry_queue: RetryQueue,
        mirror: MirrorHandle,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            consumer,
            batcher,
            writer,
            retry_queue,
            mirror,
            commits: CommitTracker::new(),
            settings,
            report: WorkerReport::default(),
            evicted: Vec::new(),
        }
    }

    pub async fn run(mut self, control: WorkerControl) -> Result<WorkerReport, PipelineError> {
        info!(
            client_id = %self.settings.client_id,
            topics = ?self.settings.topic_names(),
            locale = self.batcher.locale_name(),
            commit_policy = ?self.settings.commit_policy,
            "Worker started"
        );

        let mut retry_tick = tokio::time::interval(self.settings.retry_interval);
        retry_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        retry_tick.tick().await;

        let poll_timeout = self.settings.poll_timeout;
        let mut failure: Option<BrokerError> = None;

        loop {
            tokio::select! {
                biased;

                _ = control.cancel.cancelled() => {
                    info!("Shutdown requested, draining");
                    break;
                }

                _ = retry_tick.tick() => {
                    if !self.retry_queue.is_empty() {
                        self.retry_parked().await;
                        if let Err(e) = self.commit_progress().await {
                            failure = Some(e);
                            break;
                        }
                    }
                }

                polled = self.consumer.poll(poll_timeout) => {
                    match polled {
                        Ok(Some(message)) => {
                            if let Err(e) = self.handle_message(message).await {
                                failure = Some(e);
                                break;
                            }
                        }
                        Ok(None) => {
                            if control.input_closed.is_cancelled() {
                                info!("Input closed and consumer caught up, draining");
                                break;
                            }
                        }
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
            }
        }

        if let Some(e) = &failure {
            error!(error = %e, "Broker failure, draining before exit");
        }
        self.shutdown(failure).await
    }

    async fn handle_message(&mut self, message: Message) -> Result<(), BrokerError> {
        let position = message.position();

        match self.settings.topics.get(&message.topic).copied() {
            Some(topic_class) => match Record::from_slice(&message.payload) {
                Ok(record) => self.ingest(topic_class, record, &message).await,
                Err(e) => {
                    self.report.records_dropped += 1;
                    warn!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        error = %e,
                        "Dropping malformed record"
                    );
                }
            },
            None => {
                self.report.records_dropped += 1;
                warn!(
                    topic = %message.topic,
                    offset = message.offset,
                    "Dropping record from unmapped topic"
                );
            }
        }

        self.commits.mark_handled(&position);
        self.commit_progress().await
    }

    async fn ingest(&mut self, topic_class: TopicClass, record: Record, message: &Message) {
        if topic_class == TopicClass::Processed && self.mirror.is_enabled() {
            self.mirror.submit(record.clone());
        }

        let href = record.href.clone();
        match self.batcher.ingest_at(topic_class, record, Some(&message.position())) {
            Ok(completed) => {
                self.report.records_ingested += 1;
                debug!(
                    href = %href,
                    topic_class = %topic_class,
                    offset = message.offset,
                    "Ingested record"
                );
                if let Some(batch) = completed {
                    self.write_or_park(batch).await;
                }
            }
            Err(e) => {
                self.report.records_dropped += 1;
                warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Dropping record with unparseable date"
                );
            }
        }
    }

    async fn write_or_park(&mut self, batch: FinalizedBatch) {
        match self.writer.write(&batch).await {
            Ok(WriteOutcome::Written { .. }) => self.report.batches_written += 1,
            Ok(WriteOutcome::SkippedEmpty) => {}
            Err(e) => {
                self.report.batches_failed += 1;
                error!(
                    topic_class = %batch.key.topic_class,
                    category = %batch.key.category,
                    day = %batch.key.day,
                    path = %self.writer.layout().path_for(&batch.key),
                    batch_id = %batch.batch_id,
                    records = batch.len(),
                    error = %e,
                    "Batch write failed, parking for retry"
                );
                if let ParkOutcome::Evicted(key) = self.retry_queue.park(batch) {
                    self.evicted.push(key);
                }
            }
        }
    }

    async fn retry_parked(&mut self) {
        let parked = self.retry_queue.take_all();
        if parked.is_empty() {
            return;
        }

        info!(count = parked.len(), "Retrying parked batches");
        for batch in parked {
            self.write_or_park(batch).await;
        }

        let stats = self.retry_queue.stats();
        if stats.parked > 0 {
            warn!(
                parked = stats.parked,
                max_parked = stats.max_parked,
                oldest_parked_secs = stats.oldest_parked_secs,
                total_failures = stats.total_failures,
                "Batches still parked after retry"
            );
        }
    }

    async fn commit_progress(&mut self) -> Result<(), BrokerError> {
        let commits = match self.settings.commit_policy {
            CommitPolicy::AfterFlush => {
                let pending = self.batcher.held_offsets();
                let parked = self.retry_queue.held_offsets();
                self.commits.pending_commits(&[&pending, &parked])
            }
            CommitPolicy::PerRecord => self.commits.pending_commits(&[]),
        };
        if commits.is_empty() {
            return Ok(());
        }

        self.consumer.commit(&commits).await?;
        for (tp, offset) in &commits {
            debug!(partition = %tp, offset = offset, "Committed offset");
        }
        self.commits.record_committed(&commits);
        Ok(())
    }

    async fn shutdown(mut self, failure: Option<BrokerError>) -> Result<WorkerReport, PipelineError> {
        let drained = self.batcher.drain();
        info!(batches = drained.len(), "Writing drained batches");
        for batch in drained {
            self.write_or_park(batch).await;
        }
        self.retry_parked().await;

        if let Err(e) = self.commit_progress().await {
            warn!(error = %e, "Final offset commit failed");
        }
        if let Err(e) = self.consumer.close().await {
            warn!(error = %e, "Failed to close consumer");
        }

        self.report.mirror = self.mirror.close().await;

        let mut unwritten = self.retry_queue.keys();
        unwritten.append(&mut self.evicted);
        unwritten.sort();
        unwritten.dedup();
        for key in &unwritten {
            error!(key = %key, "Batch left unwritten at exit");
        }
        self.report.unwritten = unwritten;

        let report = self.report;
        info!(
            ingested = report.records_ingested,
            dropped = report.records_dropped,
            written = report.batches_written,
            failed = report.batches_failed,
            unwritten = report.unwritten.len(),
            "Worker stopped"
        );

        match failure {
            Some(e) => Err(PipelineError::Broker(e)),
            None => Ok(report),
        }
    }
}
