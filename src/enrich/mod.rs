pub mod http;

pub use http::HttpClassifier;

use crate::batcher::sanitize_category;
use crate::broker::{BrokerError, Consumer, Producer};
use crate::pipeline::WorkerControl;
use crate::record::{Label, Record};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("classifier returned status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("classifier config error: {0}")]
    Config(String),

    #[error("classifier failed: {0}")]
    Failed(String),
}

/// Opaque sentiment capability. The article title is passed as context.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str, title: &str) -> Result<Label, ClassifyError>;
}

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("failed to encode enriched record: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnricherReport {
    pub published: u64,
    pub dropped: u64,
    pub comments_labelled: u64,
}

/// Label every comment that has text. A classifier failure yields `Confused`.
pub async fn enrich_record(mut record: Record, classifier: &dyn Classifier) -> (Record, u64) {
    let mut labelled = 0;
    for comment in record.comments.iter_mut() {
        if comment.text.trim().is_empty() {
            continue;
        }
        let label = match classifier.classify(&comment.text, &record.title).await {
            Ok(label) => label,
            Err(e) => {
                warn!(href = %record.href, comment_id = %comment.id, error = %e, "Classification failed");
                Label::Confused
            }
        };
        comment.label = Some(label.into());
        labelled += 1;
    }
    (record, labelled)
}

/// Consume raw records, label their comments and publish them to `output_topic`.
///
/// Records are keyed by sanitized category so each category stays on one
/// partition of the output topic. Offsets are committed after each publish.
/// Stops on `control.cancel`, or once a poll comes back empty after
/// `control.input_closed`.
pub async fn run_enricher(
    consumer: &mut dyn Consumer,
    producer: &dyn Producer,
    classifier: &dyn Classifier,
    output_topic: &str,
    poll_timeout: Duration,
    control: WorkerControl,
) -> Result<EnricherReport, EnrichError> {
    let mut report = EnricherReport::default();
    info!(output_topic = %output_topic, "Enricher started");

    loop {
        let message = tokio::select! {
            _ = control.cancel.cancelled() => break,
            polled = consumer.poll(poll_timeout) => polled?,
        };
        let Some(message) = message else {
            if control.input_closed.is_cancelled() {
                debug!("Input closed and enricher caught up");
                break;
            }
            continue;
        };

        let position = message.position();
        match Record::from_slice(&message.payload) {
            Ok(record) => {
                let key = sanitize_category(record.category.as_deref());
                let (enriched, labelled) = enrich_record(record, classifier).await;
                let payload = enriched.to_vec()?;
                producer.send(output_topic, Some(&key), payload).await?;
                report.published += 1;
                report.comments_labelled += labelled;
                debug!(href = %enriched.href, comments = labelled, "Published enriched record");
            }
            Err(e) => {
                report.dropped += 1;
                warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Dropping malformed record"
                );
            }
        }

        consumer
            .commit(&[(position.partition, position.offset + 1)])
            .await?;
    }

    producer.flush().await?;
    consumer.close().await?;
    info!(
        published = report.published,
        dropped = report.dropped,
        "Enricher stopped"
    );
    Ok(report)
}
