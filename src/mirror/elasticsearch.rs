use super::{MirrorError, SearchIndex};
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ElasticsearchIndex {
    base_url: Url,
    index: String,
    username: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
}

impl ElasticsearchIndex {
    pub fn new(
        url: &str,
        index: &str,
        username: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self, MirrorError> {
        let base_url = Url::parse(url)
            .map_err(|e| MirrorError::Config(format!("invalid Elasticsearch URL '{}': {}", url, e)))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            index: index.to_string(),
            username,
            password,
            client,
        })
    }

    /// `{url}/{index}/_doc/{id}` with the id encoded as one path segment.
    pub fn document_url(&self, id: &str) -> Result<Url, MirrorError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MirrorError::Config(format!("cannot use '{}' as a base URL", self.base_url)))?
            .pop_if_empty()
            .push(&self.index)
            .push("_doc")
            .push(id);
        Ok(url)
    }
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    async fn upsert(&self, id: &str, document: &serde_json::Value) -> Result<(), MirrorError> {
        let url = self.document_url(id)?;
        let mut request = self.client.put(url).json(document);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MirrorError::Rejected {
                id: id.to_string(),
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}
