use super::traits::{BlobStore, StorageError};
use async_trait::async_trait;
use reqwest::{header, redirect, StatusCode, Url};
use std::time::Duration;

/// HDFS over the WebHDFS REST API.
///
/// File creation is the two-step protocol: the namenode answers with a
/// redirect to a datanode, and the content is sent there.
#[derive(Debug, Clone)]
pub struct WebHdfsStore {
    namenode_url: Url,
    user: String,
    client: reqwest::Client,
}

impl WebHdfsStore {
    pub fn new(namenode_url: &str, user: &str, timeout: Duration) -> Result<Self, StorageError> {
        let namenode_url = Url::parse(namenode_url)
            .map_err(|e| StorageError::Generic(format!("invalid namenode URL '{}': {}", namenode_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            namenode_url,
            user: user.to_string(),
            client,
        })
    }

    /// `{namenode}/webhdfs/v1{path}?op=...&user.name=...`
    pub fn operation_url(&self, path: &str, op: &str, extra: &[(&str, &str)]) -> Result<Url, StorageError> {
        if !path.starts_with('/') {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        let mut url = self.namenode_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::InvalidPath(path.to_string()))?;
            segments.pop_if_empty().push("webhdfs").push("v1");
            for part in path.split('/').filter(|p| !p.is_empty()) {
                segments.push(part);
            }
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("op", op);
            for (k, v) in extra {
                query.append_pair(k, v);
            }
            query.append_pair("user.name", &self.user);
        }
        Ok(url)
    }

    async fn status_error(path: &str, response: reqwest::Response) -> StorageError {
        StorageError::Status {
            path: path.to_string(),
            status: response.status().as_u16(),
            message: response.text().await.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl BlobStore for WebHdfsStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, overwrite: bool) -> Result<(), StorageError> {
        let overwrite = if overwrite { "true" } else { "false" };
        let url = self.operation_url(path, "CREATE", &[("overwrite", overwrite)])?;

        let response = self.client.put(url).send().await?;
        if response.status() != StatusCode::TEMPORARY_REDIRECT {
            return Err(Self::status_error(path, response).await);
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StorageError::Generic(format!("namenode gave no datanode location for {}", path)))?
            .to_string();

        let response = self
            .client
            .put(&location)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        if response.status() != StatusCode::CREATED && !response.status().is_success() {
            return Err(Self::status_error(path, response).await);
        }

        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let url = self.operation_url(path, "OPEN", &[])?;
        let mut response = self.client.get(url).send().await?;

        if response.status() == StatusCode::TEMPORARY_REDIRECT {
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| StorageError::Generic(format!("namenode gave no datanode location for {}", path)))?;
            response = self.client.get(&location).send().await?;
        }

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.bytes().await?.to_vec())),
            _ => Err(Self::status_error(path, response).await),
        }
    }

    fn backend_name(&self) -> &'static str {
        "webhdfs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_url() {
        let store = WebHdfsStore::new("http://localhost:9870", "hdfs", Duration::from_secs(5)).unwrap();
        let url = store
            .operation_url("/user/hdfs/raw/sport/2024-04-22.json", "CREATE", &[("overwrite", "true")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9870/webhdfs/v1/user/hdfs/raw/sport/2024-04-22.json?op=CREATE&overwrite=true&user.name=hdfs"
        );
    }

    #[test]
    fn test_non_ascii_segments_are_encoded() {
        let store = WebHdfsStore::new("http://nn:9870/", "u", Duration::from_secs(5)).unwrap();
        let url = store
            .operation_url("/raw/politique-سياسة/2024-04-22.json", "OPEN", &[])
            .unwrap();
        assert!(url.path().starts_with("/webhdfs/v1/raw/politique-%D8%B3"));
        assert_eq!(url.query(), Some("op=OPEN&user.name=u"));
    }

    #[test]
    fn test_relative_path_rejected() {
        let store = WebHdfsStore::new("http://nn:9870", "u", Duration::from_secs(5)).unwrap();
        assert!(store.operation_url("raw/x.json", "OPEN", &[]).is_err());
    }

    #[test]
    fn test_invalid_namenode_url() {
        assert!(WebHdfsStore::new("not a url", "u", Duration::from_secs(5)).is_err());
    }
}
