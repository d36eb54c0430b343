use super::{ClassifyError, Classifier};
use crate::record::Label;
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;

/// Classifier behind an HTTP endpoint.
///
/// Each comment is POSTed as `{"text": ..., "title": ...}`. The response body
/// is treated as free model output and normalized with
/// [`Label::from_model_output`].
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    url: Url,
    client: reqwest::Client,
}

impl HttpClassifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ClassifyError> {
        let url = Url::parse(url)
            .map_err(|e| ClassifyError::Config(format!("invalid classifier URL '{}': {}", url, e)))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, text: &str, title: &str) -> Result<Label, ClassifyError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&serde_json::json!({ "text": text, "title": title }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClassifyError::Rejected {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(Label::from_model_output(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Helper: serve one canned HTTP response and hand back the request body
    async fn serve_once(status: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/classify", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        socket.write_all(response.as_bytes()).await.unwrap();
                        return text[header_end + 4..].to_string();
                    }
                }
                if n == 0 {
                    return String::new();
                }
            }
        });
        (url, handle)
    }

    #[tokio::test]
    async fn test_response_body_is_normalized() {
        let (url, server) = serve_once("200 OK", "Sentiment: NEGATIVE").await;
        let classifier = HttpClassifier::new(&url, Duration::from_secs(5)).unwrap();

        let label = classifier.classify("مقال سيء", "عنوان").await.unwrap();
        assert_eq!(label, Label::Negative);

        let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent["text"], "مقال سيء");
        assert_eq!(sent["title"], "عنوان");
    }

    #[tokio::test]
    async fn test_error_status_is_rejected() {
        let (url, _server) = serve_once("503 Service Unavailable", "model loading").await;
        let classifier = HttpClassifier::new(&url, Duration::from_secs(5)).unwrap();

        match classifier.classify("text", "title").await {
            Err(ClassifyError::Rejected { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "model loading");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            HttpClassifier::new("not a url", Duration::from_secs(1)),
            Err(ClassifyError::Config(_))
        ));
    }
}
