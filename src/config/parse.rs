use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use crate::locale::{parser_for, supported_locales};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse and validate a config document. Environment variables are expanded
/// before parsing and tildes in paths after.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;
    if let Some(path) = config.storage.path.as_mut() {
        *path = expand_tilde(path);
    }

    validate_config(&config)?;
    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<String> = env_var_pattern()
        .captures_iter(yaml_string)
        .map(|cap| cap[1].to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_broker(&config.broker, &mut errors);
    validate_batcher(&config.batcher, &mut errors);
    validate_storage(&config.storage, &mut errors);
    validate_writer(&config.writer, &mut errors);
    if let Some(mirror) = &config.mirror {
        validate_mirror(mirror, &mut errors);
    }

    if let Some(enrich) = &config.enrich {
        validate_enrich(enrich, &config.broker, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_broker(broker: &BrokerConfig, errors: &mut Vec<String>) {
    if broker.partitions == 0 {
        errors.push("broker.partitions must be at least 1".to_string());
    }
    if broker.raw_topic.trim().is_empty() {
        errors.push("broker.raw_topic must not be empty".to_string());
    }
    if broker.processed_topic.trim().is_empty() {
        errors.push("broker.processed_topic must not be empty".to_string());
    }
    if broker.raw_topic == broker.processed_topic {
        errors.push(format!(
            "broker.raw_topic and broker.processed_topic must differ (both are '{}')",
            broker.raw_topic
        ));
    }
    if broker.group_id.trim().is_empty() {
        errors.push("broker.group_id must not be empty".to_string());
    }
    if broker.poll_timeout.is_zero() {
        errors.push("broker.poll_timeout must be greater than zero".to_string());
    }
}

fn validate_batcher(batcher: &BatcherConfig, errors: &mut Vec<String>) {
    if parser_for(&batcher.locale).is_none() {
        errors.push(format!(
            "batcher.locale '{}' is not supported (supported: {})",
            batcher.locale,
            supported_locales().join(", ")
        ));
    }
}

fn validate_storage(storage: &StorageConfig, errors: &mut Vec<String>) {
    match storage.backend {
        StorageBackend::Fs => {
            if storage.path.is_none() {
                errors.push("storage.path is required for the fs backend".to_string());
            }
        }
        StorageBackend::Webhdfs => match storage.namenode_url.as_deref() {
            None => errors.push("storage.namenode_url is required for the webhdfs backend".to_string()),
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                errors.push(format!(
                    "storage.namenode_url '{}' must start with http:// or https://",
                    url
                ));
            }
            Some(_) => {}
        },
    }

    for (field, root) in [
        ("raw_root", &storage.raw_root),
        ("processed_root", &storage.processed_root),
    ] {
        if !root.starts_with('/') {
            errors.push(format!("storage.{} '{}' must be an absolute path", field, root));
        }
        if root.split('/').any(|seg| seg == "..") {
            errors.push(format!("storage.{} '{}' must not contain '..'", field, root));
        }
    }

    let raw = storage.raw_root.trim_end_matches('/');
    let processed = storage.processed_root.trim_end_matches('/');
    if raw == processed {
        errors.push(format!(
            "storage.raw_root and storage.processed_root must differ (both are '{}')",
            storage.raw_root
        ));
    }
}

fn validate_writer(writer: &WriterConfig, errors: &mut Vec<String>) {
    if writer.max_attempts == 0 {
        errors.push("writer.max_attempts must be at least 1".to_string());
    }
    if writer.max_backoff < writer.initial_backoff {
        errors.push("writer.max_backoff must not be smaller than writer.initial_backoff".to_string());
    }
    if writer.retry_interval.is_zero() {
        errors.push("writer.retry_interval must be greater than zero".to_string());
    }
    if writer.max_parked == 0 {
        errors.push("writer.max_parked must be at least 1".to_string());
    }
}

fn validate_mirror(mirror: &MirrorConfig, errors: &mut Vec<String>) {
    if !(mirror.url.starts_with("http://") || mirror.url.starts_with("https://")) {
        errors.push(format!(
            "mirror.url '{}' must start with http:// or https://",
            mirror.url
        ));
    }
    if mirror.index.trim().is_empty() {
        errors.push("mirror.index must not be empty".to_string());
    }
    if mirror.queue_size == 0 {
        errors.push("mirror.queue_size must be at least 1".to_string());
    }
    if mirror.password.is_some() && mirror.username.is_none() {
        errors.push("mirror.password is set but mirror.username is missing".to_string());
    }
}

fn validate_enrich(enrich: &EnrichConfig, broker: &BrokerConfig, errors: &mut Vec<String>) {
    if !(enrich.url.starts_with("http://") || enrich.url.starts_with("https://")) {
        errors.push(format!(
            "enrich.url '{}' must start with http:// or https://",
            enrich.url
        ));
    }
    if enrich.group_id.trim().is_empty() {
        errors.push("enrich.group_id must not be empty".to_string());
    } else if enrich.group_id == broker.group_id {
        errors.push(format!(
            "enrich.group_id must differ from broker.group_id (both are '{}')",
            enrich.group_id
        ));
    }
    if enrich.timeout.is_zero() {
        errors.push("enrich.timeout must be greater than zero".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MINIMAL: &str = r#"
storage:
  backend: fs
  path: /var/lib/sentipipe
"#;

    fn validation_errors(yaml: &str) -> Vec<String> {
        match parse_config(yaml) {
            Err(ConfigError::ValidationList(errors)) => errors,
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = parse_config(MINIMAL).unwrap();

        assert_eq!(config.broker.raw_topic, "hespress-articles");
        assert_eq!(config.broker.processed_topic, "hespress-articles-processed");
        assert_eq!(config.broker.group_id, "daily-batch-writers");
        assert_eq!(config.batcher.locale, "ar-MA");
        assert_eq!(config.batcher.commit_policy, CommitPolicy::AfterFlush);
        assert_eq!(config.storage.raw_root, "/user/sentipipe/raw");
        assert_eq!(config.storage.processed_root, "/user/sentipipe/processed");
        assert_eq!(config.writer.max_attempts, 3);
        assert_eq!(config.writer.initial_backoff, Duration::from_millis(500));
        assert_eq!(config.writer.max_parked, 64);
        assert!(config.mirror.is_none());
    }

    #[test]
    fn test_humantime_durations() {
        let yaml = r#"
broker:
  poll_timeout: 250ms
storage:
  backend: fs
  path: /data
writer:
  retry_interval: 2m
  max_backoff: 1m 30s
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.broker.poll_timeout, Duration::from_millis(250));
        assert_eq!(config.writer.retry_interval, Duration::from_secs(120));
        assert_eq!(config.writer.max_backoff, Duration::from_secs(90));
    }

    #[test]
    fn test_commit_policy_per_record() {
        let yaml = r#"
batcher:
  commit_policy: per_record
storage:
  backend: fs
  path: /data
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.batcher.commit_policy, CommitPolicy::PerRecord);
    }

    #[test]
    fn test_unknown_locale_rejected() {
        let errors = validation_errors(
            r#"
batcher:
  locale: fr-FR
storage:
  backend: fs
  path: /data
"#,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("fr-FR"));
        assert!(errors[0].contains("ar-MA"));
    }

    #[test]
    fn test_webhdfs_requires_namenode() {
        let errors = validation_errors("storage:\n  backend: webhdfs\n");
        assert!(errors.iter().any(|e| e.contains("namenode_url")));
    }

    #[test]
    fn test_relative_and_equal_roots_rejected() {
        let errors = validation_errors(
            r#"
storage:
  backend: fs
  path: /data
  raw_root: data/raw
  processed_root: data/raw
"#,
        );
        assert!(errors.iter().any(|e| e.contains("raw_root 'data/raw' must be an absolute path")));
        assert!(errors.iter().any(|e| e.contains("must differ")));
    }

    #[test]
    fn test_all_errors_are_collected() {
        let errors = validation_errors(
            r#"
broker:
  raw_topic: same
  processed_topic: same
storage:
  backend: fs
writer:
  max_attempts: 0
mirror:
  url: localhost:9200
  queue_size: 0
"#,
        );
        assert_eq!(errors.len(), 5, "{:?}", errors);
    }

    #[test]
    fn test_unexpanded_env_var_is_reported() {
        let yaml = r#"
storage:
  backend: fs
  path: $env{SENTIPIPE_SURELY_UNSET_VAR}
"#;
        match parse_config(yaml) {
            Err(ConfigError::Validation(msg)) => {
                assert!(msg.contains("SENTIPIPE_SURELY_UNSET_VAR"))
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_env_var_expansion_in_mirror_password() {
        std::env::set_var("SENTIPIPE_PARSE_TEST_PASSWORD", "s3cret");
        let yaml = r#"
storage:
  backend: fs
  path: /data
mirror:
  url: https://localhost:9200
  username: elastic
  password: $env{SENTIPIPE_PARSE_TEST_PASSWORD}
"#;
        let config = parse_config(yaml).unwrap();
        std::env::remove_var("SENTIPIPE_PARSE_TEST_PASSWORD");

        let mirror = config.mirror.unwrap();
        assert_eq!(mirror.password.as_deref(), Some("s3cret"));
        assert_eq!(mirror.index, "hespress_articles");
    }

    #[test]
    fn test_missing_storage_is_parse_error() {
        assert!(matches!(
            parse_config("broker:\n  partitions: 2\n"),
            Err(ConfigError::YamlParse(_))
        ));
    }

    #[test]
    fn test_enrich_section() {
        let yaml = r#"
storage:
  backend: fs
  path: /data
enrich:
  url: http://localhost:8000/classify
"#;
        let enrich = parse_config(yaml).unwrap().enrich.unwrap();
        assert_eq!(enrich.group_id, "sentiment-enrichers");
        assert_eq!(enrich.timeout, Duration::from_secs(30));

        let errors = validation_errors(
            r#"
storage:
  backend: fs
  path: /data
enrich:
  url: localhost:8000
  group_id: daily-batch-writers
"#,
        );
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("enrich.url")));
        assert!(errors.iter().any(|e| e.contains("enrich.group_id must differ")));
    }
}
