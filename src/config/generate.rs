pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# SENTIPIPE CONFIGURATION
# =============================================================================
# Sentipipe consumes scraped news articles from a broker, groups them by
# (topic, category, publication day) and writes each finished group as one
# JSON file to blob storage. Processed (sentiment-labelled) articles can also
# be mirrored into a search index.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/sentipipe/config.yml
#   3. /etc/sentipipe/config.yml
#
# Values may be read from the environment with the $env{...} form.

# =============================================================================
# BROKER
# =============================================================================
broker:
  # 'memory' runs an in-process log fed from stdin (`sentipipe run --stdin`)
  kind: memory
  partitions: 3
  raw_topic: hespress-articles
  processed_topic: hespress-articles-processed
  group_id: daily-batch-writers
  # client_id defaults to the host name
  # client_id: sentipipe-worker-1
  poll_timeout: 1s

# =============================================================================
# BATCHER
# =============================================================================
batcher:
  # Locale of the publication dates ('ar-MA' reads "الإثنين 22 أبريل 2024 - 21:21")
  locale: ar-MA
  # 'after_flush': commit offsets only once their records are written (at-least-once)
  # 'per_record':  commit every message immediately (records pending at a crash are lost)
  commit_policy: after_flush

# =============================================================================
# STORAGE
# =============================================================================
# Batches land at {root}/{category}/{YYYY-MM-DD}.json and overwrite any
# earlier file for the same key.
storage:
  backend: fs
  path: ~/.local/share/sentipipe
  # backend: webhdfs
  # namenode_url: http://localhost:9870
  # user: hdfs
  timeout: 30s
  raw_root: /user/sentipipe/raw
  processed_root: /user/sentipipe/processed

# =============================================================================
# WRITER
# =============================================================================
writer:
  max_attempts: 3
  initial_backoff: 500ms
  max_backoff: 10s
  # Batches that exhaust their attempts are parked and retried on this interval
  retry_interval: 30s
  max_parked: 64

# =============================================================================
# SEARCH MIRROR (optional)
# =============================================================================
# Processed records are upserted by href. Failures are logged, never fatal.
# mirror:
#   url: https://localhost:9200
#   index: hespress_articles
#   username: elastic
#   password: changeme
#   queue_size: 1024
#   timeout: 10s

# =============================================================================
# ENRICHMENT (optional)
# =============================================================================
# When set, raw records are labelled through this classifier endpoint and
# republished to the processed topic. The endpoint receives {"text", "title"}
# as JSON; its response body is read as free text (e.g. "positive").
# enrich:
#   url: http://localhost:8000/classify
#   group_id: sentiment-enrichers
#   timeout: 30s
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_starter_config_is_valid() {
        let config = parse_config(&generate_starter_config()).unwrap();
        assert_eq!(config.broker.raw_topic, "hespress-articles");
        assert!(config.mirror.is_none());
        assert!(config.enrich.is_none());
    }
}
