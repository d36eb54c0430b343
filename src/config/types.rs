use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub batcher: BatcherConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub writer: WriterConfig,
    #[serde(default)]
    pub mirror: Option<MirrorConfig>,
    #[serde(default)]
    pub enrich: Option<EnrichConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_kind")]
    pub kind: BrokerKind,
    #[serde(default = "default_partitions")]
    pub partitions: u32,
    #[serde(default = "default_raw_topic")]
    pub raw_topic: String,
    #[serde(default = "default_processed_topic")]
    pub processed_topic: String,
    #[serde(default = "default_group_id")]
    pub group_id: String,
    /// Defaults to the host name
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default = "default_poll_timeout", with = "humantime_serde")]
    pub poll_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: default_broker_kind(),
            partitions: default_partitions(),
            raw_topic: default_raw_topic(),
            processed_topic: default_processed_topic(),
            group_id: default_group_id(),
            client_id: None,
            poll_timeout: default_poll_timeout(),
        }
    }
}

fn default_broker_kind() -> BrokerKind {
    BrokerKind::Memory
}

fn default_partitions() -> u32 {
    3
}

fn default_raw_topic() -> String {
    "hespress-articles".to_string()
}

fn default_processed_topic() -> String {
    "hespress-articles-processed".to_string()
}

fn default_group_id() -> String {
    "daily-batch-writers".to_string()
}

fn default_poll_timeout() -> Duration {
    Duration::from_secs(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    /// In-process log; records arrive through the stdin collector
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatcherConfig {
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_commit_policy")]
    pub commit_policy: CommitPolicy,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            commit_policy: default_commit_policy(),
        }
    }
}

fn default_locale() -> String {
    "ar-MA".to_string()
}

fn default_commit_policy() -> CommitPolicy {
    CommitPolicy::AfterFlush
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Commit only offsets whose records are durably written
    AfterFlush,
    /// Commit every message as soon as it is ingested
    PerRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Base directory for the fs backend
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// WebHDFS namenode, e.g. http://localhost:9870
    #[serde(default)]
    pub namenode_url: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_storage_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_raw_root")]
    pub raw_root: String,
    #[serde(default = "default_processed_root")]
    pub processed_root: String,
}

fn default_storage_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_raw_root() -> String {
    "/user/sentipipe/raw".to_string()
}

fn default_processed_root() -> String {
    "/user/sentipipe/processed".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    Webhdfs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff", with = "humantime_serde")]
    pub initial_backoff: Duration,
    #[serde(default = "default_max_backoff", with = "humantime_serde")]
    pub max_backoff: Duration,
    /// How often parked batches are retried
    #[serde(default = "default_retry_interval", with = "humantime_serde")]
    pub retry_interval: Duration,
    #[serde(default = "default_max_parked")]
    pub max_parked: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
            retry_interval: default_retry_interval(),
            max_parked: default_max_parked(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(500)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(10)
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_max_parked() -> usize {
    64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    pub url: String,
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_mirror_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_index() -> String {
    "hespress_articles".to_string()
}

fn default_queue_size() -> usize {
    1024
}

fn default_mirror_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// Classifier endpoint; receives `{"text", "title"}` and answers with free text
    pub url: String,
    #[serde(default = "default_enrich_group_id")]
    pub group_id: String,
    #[serde(default = "default_classifier_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_enrich_group_id() -> String {
    "sentiment-enrichers".to_string()
}

fn default_classifier_timeout() -> Duration {
    Duration::from_secs(30)
}
