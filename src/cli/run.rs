use crate::batcher::{sanitize_category, CategoryDayBatcher, RetryQueue};
use crate::broker::{BrokerError, MemoryBroker, Producer};
use crate::config::parse::load_config;
use crate::config::{Config, ConfigError, EnrichConfig, StorageBackend};
use crate::enrich::{run_enricher, ClassifyError, EnrichError, EnricherReport, HttpClassifier};
use crate::locale::parser_for;
use crate::mirror::{ElasticsearchIndex, MirrorError, MirrorHandle};
use crate::pipeline::{PipelineError, Worker, WorkerControl, WorkerSettings};
use crate::record::Record;
use crate::storage::{
    BatchWriter, BlobStore, FsStore, PathLayout, RetryPolicy, RetryingWriter, StorageError,
    WebHdfsStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const DEFAULT_HDFS_USER: &str = "hdfs";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("search mirror error: {0}")]
    Mirror(#[from] MirrorError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("classifier error: {0}")]
    Classifier(#[from] ClassifyError),

    #[error("enrichment error: {0}")]
    Enrich(#[from] EnrichError),

    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub async fn run(config_path: Option<PathBuf>, stdin: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/sentipipe/config.yml");
            eprintln!("  /etc/sentipipe/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'sentipipe config init' to generate one.");
            std::process::exit(1);
        }
    };

    run_pipeline(&config_path, stdin).await.map_err(|e| e.into())
}

async fn run_pipeline(config_path: &Path, stdin: bool) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    let broker = MemoryBroker::new(config.broker.partitions);
    broker.create_topic(&config.broker.raw_topic, config.broker.partitions);
    broker.create_topic(&config.broker.processed_topic, config.broker.partitions);

    let worker = build_worker(&config, &broker)?;
    let control = WorkerControl::default();

    // With enrichment on, stdin EOF closes the enricher's input, and the
    // enricher closes the worker's once it has caught up.
    let (enricher_handle, raw_input_closed) = match &config.enrich {
        Some(enrich) => {
            let enricher_control = WorkerControl {
                cancel: control.cancel.clone(),
                input_closed: CancellationToken::new(),
            };
            let input_closed = enricher_control.input_closed.clone();
            let handle = spawn_enricher(
                &config,
                enrich,
                &broker,
                enricher_control,
                control.input_closed.clone(),
            )?;
            (Some(handle), input_closed)
        }
        None => (None, control.input_closed.clone()),
    };

    let feeder_handle = if stdin {
        let producer = broker.producer();
        let topic = config.broker.raw_topic.clone();
        let input_closed = raw_input_closed;
        Some(tokio::spawn(async move {
            let result = feed_lines(BufReader::new(tokio::io::stdin()), &producer, &topic).await;
            input_closed.cancel();
            result
        }))
    } else {
        warn!("No input attached; pass --stdin to feed records from standard input");
        None
    };

    let mut worker_handle = tokio::spawn(worker.run(control.clone()));
    info!("Pipeline started, press Ctrl+C to shutdown");

    let result = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
            control.cancel.cancel();
            (&mut worker_handle).await
        }
        result = &mut worker_handle => result,
    };

    if let Some(handle) = feeder_handle {
        if handle.is_finished() {
            match handle.await {
                Ok(Ok(count)) => info!(records = count, "Input feeder completed"),
                Ok(Err(e)) => error!(error = %e, "Input feeder error"),
                Err(e) => error!(error = %e, "Input feeder join error"),
            }
        } else {
            handle.abort();
        }
    }

    if let Some(handle) = enricher_handle {
        control.cancel.cancel();
        match handle.await {
            Ok(Ok(report)) => info!(
                published = report.published,
                dropped = report.dropped,
                comments = report.comments_labelled,
                "Enricher completed"
            ),
            Ok(Err(e)) => error!(error = %e, "Enricher error"),
            Err(e) => error!(error = %e, "Enricher join error"),
        }
    }

    match result {
        Ok(Ok(report)) => {
            info!(
                ingested = report.records_ingested,
                dropped = report.records_dropped,
                written = report.batches_written,
                mirrored = report.mirror.indexed,
                "Pipeline shutdown complete"
            );
            if !report.unwritten.is_empty() {
                warn!(count = report.unwritten.len(), "Some batches were not written");
            }
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "Worker failed");
            Err(e.into())
        }
        Err(e) => {
            error!(error = %e, "Worker task join error");
            Err(e.into())
        }
    }
}

/// Assemble a worker from config, consuming both topics of `broker`.
pub fn build_worker(config: &Config, broker: &MemoryBroker) -> Result<Worker, RunError> {
    let locale = &config.batcher.locale;
    let unsupported = || ConfigError::Validation(format!("unsupported locale '{}'", locale));
    let batch_parser = parser_for(locale).ok_or_else(unsupported)?;

    let store = build_store(config)?;
    info!(
        backend = store.backend_name(),
        raw_root = %config.storage.raw_root,
        processed_root = %config.storage.processed_root,
        "Initializing storage"
    );
    let writer = RetryingWriter::new(
        BatchWriter::new(
            store,
            PathLayout::new(&config.storage.raw_root, &config.storage.processed_root),
        ),
        RetryPolicy {
            max_attempts: config.writer.max_attempts,
            initial_backoff: config.writer.initial_backoff,
            max_backoff: config.writer.max_backoff,
        },
    );

    let mirror = match &config.mirror {
        Some(mirror_config) => {
            info!(url = %mirror_config.url, index = %mirror_config.index, "Starting search mirror");
            let index = ElasticsearchIndex::new(
                &mirror_config.url,
                &mirror_config.index,
                mirror_config.username.clone(),
                mirror_config.password.clone(),
                mirror_config.timeout,
            )?;
            let mirror_parser = parser_for(locale).ok_or_else(unsupported)?;
            MirrorHandle::spawn(Arc::new(index), Arc::from(mirror_parser), mirror_config.queue_size)
        }
        None => MirrorHandle::disabled(),
    };

    let settings = WorkerSettings {
        commit_policy: config.batcher.commit_policy,
        poll_timeout: config.broker.poll_timeout,
        retry_interval: config.writer.retry_interval,
        client_id: client_id(config),
        ..WorkerSettings::new(&config.broker.raw_topic, &config.broker.processed_topic)
    };
    let topics = settings.topic_names();
    let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
    let consumer = broker.consumer(&config.broker.group_id, &topic_refs);

    Ok(Worker::new(
        Box::new(consumer),
        CategoryDayBatcher::new(batch_parser),
        writer,
        RetryQueue::new(config.writer.max_parked),
        mirror,
        settings,
    ))
}

/// Spawn the enrichment stage: raw topic in, labelled records out to the
/// processed topic. `downstream` is closed when the stage stops.
fn spawn_enricher(
    config: &Config,
    enrich: &EnrichConfig,
    broker: &MemoryBroker,
    control: WorkerControl,
    downstream: CancellationToken,
) -> Result<JoinHandle<Result<EnricherReport, EnrichError>>, RunError> {
    let classifier = HttpClassifier::new(&enrich.url, enrich.timeout)?;
    info!(url = %enrich.url, group_id = %enrich.group_id, "Starting enricher");

    let mut consumer = broker.consumer(&enrich.group_id, &[config.broker.raw_topic.as_str()]);
    let producer = broker.producer();
    let output_topic = config.broker.processed_topic.clone();
    let poll_timeout = config.broker.poll_timeout;

    Ok(tokio::spawn(async move {
        let result = run_enricher(
            &mut consumer,
            &producer,
            &classifier,
            &output_topic,
            poll_timeout,
            control,
        )
        .await;
        downstream.cancel();
        result
    }))
}

fn build_store(config: &Config) -> Result<Arc<dyn BlobStore>, RunError> {
    let storage = &config.storage;
    match storage.backend {
        StorageBackend::Fs => {
            let base_dir = storage.path.clone().ok_or_else(|| {
                ConfigError::Validation("storage.path is required for the fs backend".to_string())
            })?;
            Ok(Arc::new(FsStore::new(base_dir)))
        }
        StorageBackend::Webhdfs => {
            let url = storage.namenode_url.as_deref().ok_or_else(|| {
                ConfigError::Validation(
                    "storage.namenode_url is required for the webhdfs backend".to_string(),
                )
            })?;
            let user = storage.user.as_deref().unwrap_or(DEFAULT_HDFS_USER);
            Ok(Arc::new(WebHdfsStore::new(url, user, storage.timeout)?))
        }
    }
}

fn client_id(config: &Config) -> String {
    config.broker.client_id.clone().unwrap_or_else(|| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "sentipipe".to_string())
    })
}

/// Publish one record per non-empty line, keyed by sanitized category so a
/// category stays on one partition. Lines are not validated here.
pub async fn feed_lines<R>(reader: R, producer: &dyn Producer, topic: &str) -> Result<u64, RunError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut published = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let key = Record::from_slice(line.as_bytes())
            .ok()
            .map(|record| sanitize_category(record.category.as_deref()));
        let position = producer
            .send(topic, key.as_deref(), line.as_bytes().to_vec())
            .await?;
        debug!(partition = %position.partition, offset = position.offset, "Published input line");
        published += 1;
    }

    producer.flush().await?;
    Ok(published)
}
