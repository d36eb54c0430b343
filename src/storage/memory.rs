use super::traits::{BlobStore, StorageError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory store. Can be told to fail the next N writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    fail_next: Arc<AtomicUsize>,
    puts: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` puts with a generic error.
    pub fn fail_next_writes(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn paths(&self) -> Vec<String> {
        self.files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().ok()?.get(path).cloned()
    }

    /// Total put attempts, including rejected ones
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, overwrite: bool) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(StorageError::Generic(format!("injected failure writing {}", path)));
        }

        let mut files = self
            .files
            .lock()
            .map_err(|_| StorageError::Generic("memory store lock poisoned".to_string()))?;
        if !overwrite && files.contains_key(path) {
            return Err(StorageError::AlreadyExists {
                path: path.to_string(),
            });
        }
        files.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let files = self
            .files
            .lock()
            .map_err(|_| StorageError::Generic("memory store lock poisoned".to_string()))?;
        Ok(files.get(path).cloned())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injected_failures_then_success() {
        let store = MemoryStore::new();
        store.fail_next_writes(2);

        assert!(store.put("/a", vec![1], true).await.is_err());
        assert!(store.put("/a", vec![1], true).await.is_err());
        store.put("/a", vec![1], true).await.unwrap();

        assert_eq!(store.put_count(), 3);
        assert_eq!(store.read("/a"), Some(vec![1]));
    }
}
