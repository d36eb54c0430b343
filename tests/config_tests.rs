use sentipipe::broker::{MemoryBroker, Producer, TopicPartition};
use sentipipe::cli::run::build_worker;
use sentipipe::config::{
    generate::generate_starter_config, load_config, CommitPolicy, ConfigError, StorageBackend,
};
use sentipipe::pipeline::WorkerControl;
use sentipipe::record::Record;
use std::fs;
use tempfile::TempDir;

fn write_config(temp_dir: &TempDir, yaml: &str) -> std::path::PathBuf {
    let config_path = temp_dir.path().join("config.yml");
    fs::write(&config_path, yaml).unwrap();
    config_path
}

#[test]
fn test_generated_config_is_valid() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(&temp_dir, &generate_starter_config());

    let config = load_config(&config_path).expect("Generated config should be valid");

    assert_eq!(config.broker.raw_topic, "hespress-articles");
    assert_eq!(config.broker.processed_topic, "hespress-articles-processed");
    assert_eq!(config.broker.group_id, "daily-batch-writers");
    assert_eq!(config.batcher.commit_policy, CommitPolicy::AfterFlush);
    assert_eq!(config.storage.backend, StorageBackend::Fs);
    // Tilde is expanded at load
    let path = config.storage.path.unwrap();
    assert!(!path.to_string_lossy().starts_with('~'));
    assert!(config.mirror.is_none());
}

#[test]
fn test_missing_file_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = load_config(&temp_dir.path().join("absent.yml"));
    match result {
        Err(ConfigError::Io(e)) => assert!(e.to_string().contains("absent.yml")),
        other => panic!("expected io error, got {:?}", other),
    }
}

#[test]
fn test_yaml_errors_name_the_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(&temp_dir, "storage: [unclosed\n");

    let err = load_config(&config_path).unwrap_err();
    assert!(err.to_string().contains("config.yml"), "{}", err);
}

#[test]
fn test_validation_lists_every_problem() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(
        &temp_dir,
        r#"
broker:
  group_id: ""
batcher:
  locale: xx-XX
storage:
  backend: webhdfs
  namenode_url: namenode:9870
writer:
  max_parked: 0
"#,
    );

    match load_config(&config_path) {
        Err(ConfigError::ValidationList(errors)) => {
            assert_eq!(errors.len(), 4, "{:?}", errors);
            assert!(errors.iter().any(|e| e.contains("group_id")));
            assert!(errors.iter().any(|e| e.contains("xx-XX")));
            assert!(errors.iter().any(|e| e.contains("namenode:9870")));
            assert!(errors.iter().any(|e| e.contains("max_parked")));
        }
        other => panic!("expected validation errors, got {:?}", other),
    }
}

#[test]
fn test_webhdfs_config_builds_a_worker() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(
        &temp_dir,
        r#"
storage:
  backend: webhdfs
  namenode_url: http://localhost:9870
  user: hdfs
"#,
    );
    let config = load_config(&config_path).unwrap();

    let broker = MemoryBroker::new(1);
    assert!(build_worker(&config, &broker).is_ok());
}

#[tokio::test]
async fn test_configured_worker_writes_to_filesystem() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let yaml = format!(
        r#"
broker:
  partitions: 2
  poll_timeout: 10ms
storage:
  backend: fs
  path: {}
"#,
        data_dir.display()
    );
    let config = load_config(&write_config(&temp_dir, &yaml)).unwrap();

    let broker = MemoryBroker::new(config.broker.partitions);
    let producer = broker.producer();
    for (href, date) in [
        ("a1", "الإثنين 22 أبريل 2024 - 10:00"),
        ("a2", "الإثنين 22 أبريل 2024 - 11:30"),
    ] {
        let payload = serde_json::json!({"href": href, "date": date, "category": "رياضة"});
        producer
            .send("hespress-articles", Some("رياضة"), payload.to_string().into_bytes())
            .await
            .unwrap();
    }

    let worker = build_worker(&config, &broker).unwrap();
    let control = WorkerControl::default();
    control.input_closed.cancel();
    let report = worker.run(control).await.unwrap();
    assert_eq!(report.batches_written, 1);

    let file = data_dir.join("user/sentipipe/raw/رياضة/2024-04-22.json");
    let text = fs::read_to_string(&file).unwrap();
    // Arabic is written as-is and the array is indented with four spaces
    assert!(text.contains("\"date\": \"الإثنين 22 أبريل 2024 - 10:00\""));
    assert!(text.contains("\n    {"));

    let records: Vec<Record> = serde_json::from_str(&text).unwrap();
    assert_eq!(records.len(), 2);

    let partition = (0..2)
        .map(|p| TopicPartition::new("hespress-articles", p))
        .find(|tp| broker.committed("daily-batch-writers", tp).is_some())
        .unwrap();
    assert_eq!(broker.committed("daily-batch-writers", &partition), Some(2));
}
