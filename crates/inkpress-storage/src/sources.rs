//! Batch upload of externally-sourced assets.
//!
//! Fetches source URLs and re-uploads them into the bucket. Individual
//! failures never abort the batch: the caller receives a report with both
//! partitions and decides whether the failures matter (the generation
//! worker only aborts when the primary asset is among them).

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::ObjectStorage;

/// One successfully re-uploaded source.
#[derive(Debug, Clone)]
pub struct UploadedObject {
    /// Original source URL
    pub source_url: String,
    /// Bucket key
    pub key: String,
    /// Public URL
    pub url: String,
}

/// One failed source.
#[derive(Debug, Clone)]
pub struct UploadFailure {
    /// Original source URL
    pub source_url: String,
    /// What went wrong
    pub error: String,
}

/// Outcome of a batch source upload.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<UploadedObject>,
    pub failed: Vec<UploadFailure>,
}

impl UploadReport {
    /// Whether the given source URL was uploaded.
    pub fn contains_source(&self, source_url: &str) -> bool {
        self.uploaded.iter().any(|u| u.source_url == source_url)
    }

    /// Keys of every uploaded object, for cleanup on compensation.
    pub fn uploaded_keys(&self) -> Vec<String> {
        self.uploaded.iter().map(|u| u.key.clone()).collect()
    }

    /// Public URLs in upload order.
    pub fn uploaded_urls(&self) -> Vec<String> {
        self.uploaded.iter().map(|u| u.url.clone()).collect()
    }
}

/// Fetches remote sources and stores them through an [`ObjectStorage`].
pub struct SourceUploader {
    http: reqwest::Client,
    storage: Arc<dyn ObjectStorage>,
}

impl SourceUploader {
    /// Create an uploader with a bounded fetch timeout.
    pub fn new(storage: Arc<dyn ObjectStorage>, fetch_timeout: Duration) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| StorageError::config_error(e.to_string()))?;

        Ok(Self { http, storage })
    }

    /// Fetch each source and upload it under `dest_prefix`.
    ///
    /// Never fails the batch for an individual source; per-item errors are
    /// collected in the report.
    pub async fn upload_sources(&self, sources: &[String], dest_prefix: &str) -> UploadReport {
        let mut report = UploadReport::default();

        for (index, source_url) in sources.iter().enumerate() {
            match self.upload_one(index, source_url, dest_prefix).await {
                Ok(object) => {
                    debug!("Uploaded {} to {}", source_url, object.key);
                    report.uploaded.push(object);
                }
                Err(e) => {
                    warn!("Failed to upload source {}: {}", source_url, e);
                    report.failed.push(UploadFailure {
                        source_url: source_url.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    async fn upload_one(
        &self,
        index: usize,
        source_url: &str,
        dest_prefix: &str,
    ) -> StorageResult<UploadedObject> {
        let response = self
            .http
            .get(source_url)
            .send()
            .await
            .map_err(|e| StorageError::fetch_failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::fetch_failed(format!(
                "{} returned {}",
                source_url,
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let data = response
            .bytes()
            .await
            .map_err(|e| StorageError::fetch_failed(e.to_string()))?
            .to_vec();

        let key = format!(
            "{}/{:02}_{}",
            dest_prefix.trim_end_matches('/'),
            index,
            filename_from_url(source_url)
        );

        self.storage
            .upload_bytes(data, &key, &content_type)
            .await?;

        Ok(UploadedObject {
            source_url: source_url.to_string(),
            url: self.storage.url(&key),
            key,
        })
    }
}

/// Derive a safe object filename from a source URL's last path segment.
fn filename_from_url(source_url: &str) -> String {
    let path = source_url
        .split(['?', '#'])
        .next()
        .unwrap_or(source_url);
    let segment = path.rsplit('/').next().unwrap_or("");

    let safe: String = segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();

    if safe.is_empty() {
        "asset".to_string()
    } else {
        safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn filename_extraction() {
        assert_eq!(
            filename_from_url("https://img.example.com/photos/cover.jpg?w=800"),
            "cover.jpg"
        );
        assert_eq!(filename_from_url("https://img.example.com/"), "asset");
        assert_eq!(filename_from_url("https://img.example.com/a b<>.png"), "ab.png");
    }

    #[tokio::test]
    async fn partial_failure_is_reported_not_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/cover.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(vec![0xFF, 0xD8, 0xFF]),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryStorage::new());
        let uploader =
            SourceUploader::new(storage.clone(), Duration::from_secs(5)).expect("uploader");

        let ok_url = format!("{}/cover.jpg", server.uri());
        let bad_url = format!("{}/missing.jpg", server.uri());
        let report = uploader
            .upload_sources(&[ok_url.clone(), bad_url.clone()], "articles/abc/images")
            .await;

        assert_eq!(report.uploaded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.contains_source(&ok_url));
        assert!(!report.contains_source(&bad_url));
        assert_eq!(report.uploaded[0].key, "articles/abc/images/00_cover.jpg");

        let stored = storage.object(&report.uploaded[0].key).await.unwrap();
        assert_eq!(stored.content_type, "image/jpeg");
        assert_eq!(stored.data, vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn keys_are_indexed_in_source_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8]))
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryStorage::new());
        let uploader =
            SourceUploader::new(storage.clone(), Duration::from_secs(5)).expect("uploader");

        let sources = vec![
            format!("{}/a.png", server.uri()),
            format!("{}/b.png", server.uri()),
        ];
        let report = uploader.upload_sources(&sources, "articles/x").await;

        assert_eq!(
            report.uploaded_keys(),
            vec!["articles/x/00_a.png", "articles/x/01_b.png"]
        );
    }
}
