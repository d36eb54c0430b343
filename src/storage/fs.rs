use super::traits::{BlobStore, StorageError};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// Local directory acting as the hierarchical store.
///
/// Logical paths are resolved under `base_dir`. Writes go to a temporary
/// sibling and are renamed into place, so readers never see a partial file.
#[derive(Debug, Clone)]
pub struct FsStore {
    base_dir: PathBuf,
}

impl FsStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Map a logical path to a file under the base directory, rejecting escapes.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.base_dir.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return Err(StorageError::InvalidPath(path.to_string())),
            }
        }
        if resolved == self.base_dir {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(resolved)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl BlobStore for FsStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, overwrite: bool) -> Result<(), StorageError> {
        let target = self.resolve(path)?;

        if !overwrite && tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Err(StorageError::AlreadyExists {
                path: path.to_string(),
            });
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = target.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| io_error(&temp, e))?;

        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(io_error(&target, e));
        }

        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&target, e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "fs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_creates_directories() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());

        store
            .put("/user/x/raw/sport/2024-04-22.json", b"[]".to_vec(), true)
            .await
            .unwrap();

        let on_disk = dir.path().join("user/x/raw/sport/2024-04-22.json");
        assert_eq!(std::fs::read(on_disk).unwrap(), b"[]");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());

        store.put("/a/b.json", b"first, longer".to_vec(), true).await.unwrap();
        store.put("/a/b.json", b"second".to_vec(), true).await.unwrap();

        assert_eq!(store.get("/a/b.json").await.unwrap().unwrap(), b"second");

        // No temp files left behind
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("a")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_no_overwrite_rejects_existing() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());

        store.put("/a.json", b"1".to_vec(), false).await.unwrap();
        let result = store.put("/a.json", b"2".to_vec(), false).await;
        assert!(matches!(result, Err(StorageError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        assert!(store.get("/nope.json").await.unwrap().is_none());
    }

    #[test]
    fn test_resolve_rejects_parent_dir() {
        let store = FsStore::new("/data");
        assert!(matches!(
            store.resolve("/raw/../../etc/passwd"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(store.resolve("/"), Err(StorageError::InvalidPath(_))));
        assert_eq!(
            store.resolve("/raw/sport/2024-04-22.json").unwrap(),
            PathBuf::from("/data/raw/sport/2024-04-22.json")
        );
    }
}
