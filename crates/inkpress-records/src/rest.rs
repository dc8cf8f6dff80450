//! REST record store client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use inkpress_models::{Article, ArticleId};

use crate::error::{RecordStoreError, RecordStoreResult};
use crate::RecordStore;

/// REST client configuration.
#[derive(Debug, Clone)]
pub struct RestRecordStoreConfig {
    /// Base URL of the records API
    pub base_url: String,
    /// Bearer token for service-to-service calls
    pub api_token: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl RestRecordStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> RecordStoreResult<Self> {
        let base_url = std::env::var("RECORDS_API_URL")
            .map_err(|_| RecordStoreError::config_error("RECORDS_API_URL not set"))?;

        Ok(Self {
            base_url,
            api_token: std::env::var("RECORDS_API_TOKEN").ok(),
            timeout: Duration::from_secs(
                std::env::var("RECORDS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            connect_timeout: Duration::from_secs(5),
        })
    }
}

/// REST implementation of [`RecordStore`].
#[derive(Clone)]
pub struct RestRecordStore {
    http: Client,
    base_url: String,
    api_token: Option<String>,
}

impl RestRecordStore {
    /// Create a new client.
    pub fn new(config: RestRecordStoreConfig) -> RecordStoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("inkpress-records/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RecordStoreError::Network)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> RecordStoreResult<Self> {
        Self::new(RestRecordStoreConfig::from_env()?)
    }

    fn article_url(&self, id: &ArticleId) -> String {
        format!("{}/articles/{}", self.base_url, id)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: reqwest::Response) -> RecordStoreResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(RecordStoreError::api(status.as_u16(), message))
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn create(&self, article: &Article) -> RecordStoreResult<()> {
        let url = format!("{}/articles", self.base_url);
        let response = self.request(self.http.post(&url)).json(article).send().await?;
        Self::check(response).await?;

        debug!("Created article record {}", article.id);
        Ok(())
    }

    async fn find_by_id(&self, id: &ArticleId) -> RecordStoreResult<Option<Article>> {
        let response = self
            .request(self.http.get(self.article_url(id)))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = Self::check(response).await?;
        let article: Article = response.json().await?;
        Ok(Some(article))
    }

    async fn update(&self, article: &Article) -> RecordStoreResult<()> {
        let response = self
            .request(self.http.put(self.article_url(&article.id)))
            .json(article)
            .send()
            .await?;
        Self::check(response).await?;

        debug!("Updated article record {}", article.id);
        Ok(())
    }

    async fn delete(&self, id: &ArticleId) -> RecordStoreResult<()> {
        let response = self
            .request(self.http.delete(self.article_url(id)))
            .send()
            .await?;

        // Deleting an absent record keeps the compensation path idempotent.
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Delete of absent article {} treated as no-op", id);
            return Ok(());
        }

        Self::check(response).await?;
        debug!("Deleted article record {}", id);
        Ok(())
    }
}
