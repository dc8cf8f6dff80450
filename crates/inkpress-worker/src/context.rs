//! Shared worker context.
//!
//! Every collaborator is constructed once at process start and injected
//! here; job handlers receive the context by reference and hold no global
//! state of their own.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use inkpress_cache::{keys, Cache, RedisCache};
use inkpress_models::ArticleId;
use inkpress_queue::{QueueError, QueueJob, QueueManager};
use inkpress_records::{RecordStore, RestRecordStore};
use inkpress_storage::{ObjectStorage, R2Client, SourceUploader};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::generator::{ContentGenerator, GeminiGenerator};
use crate::email::{HttpMailer, Mailer};
use crate::speech::{SpeechClient, SpeechSynthesizer};

/// Enqueue seam for jobs chained by workers.
///
/// Workers never talk to the broker directly for chaining; the queue
/// manager implements this in production and tests record dispatches.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job: QueueJob) -> Result<(), QueueError>;
}

#[async_trait]
impl JobDispatcher for QueueManager {
    async fn dispatch(&self, job: QueueJob) -> Result<(), QueueError> {
        self.add_job(job).await.map(|_| ())
    }
}

/// Collaborators shared by every job handler.
pub struct WorkerContext {
    pub config: WorkerConfig,
    pub records: Arc<dyn RecordStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub uploader: SourceUploader,
    pub cache: Arc<dyn Cache>,
    pub generator: Arc<dyn ContentGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub mailer: Arc<dyn Mailer>,
    pub dispatcher: Arc<dyn JobDispatcher>,
}

impl WorkerContext {
    /// Assemble a context from explicit collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: WorkerConfig,
        records: Arc<dyn RecordStore>,
        storage: Arc<dyn ObjectStorage>,
        cache: Arc<dyn Cache>,
        generator: Arc<dyn ContentGenerator>,
        speech: Arc<dyn SpeechSynthesizer>,
        mailer: Arc<dyn Mailer>,
        dispatcher: Arc<dyn JobDispatcher>,
    ) -> WorkerResult<Self> {
        let uploader = SourceUploader::new(storage.clone(), config.source_fetch_timeout)?;

        Ok(Self {
            config,
            records,
            storage,
            uploader,
            cache,
            generator,
            speech,
            mailer,
            dispatcher,
        })
    }

    /// Assemble the production context from the environment.
    pub async fn from_env(
        config: WorkerConfig,
        manager: Arc<QueueManager>,
    ) -> WorkerResult<Self> {
        let records: Arc<dyn RecordStore> = Arc::new(RestRecordStore::from_env()?);
        let storage: Arc<dyn ObjectStorage> = Arc::new(R2Client::from_env().await?);
        let cache: Arc<dyn Cache> = Arc::new(RedisCache::from_env()?);
        let generator: Arc<dyn ContentGenerator> = Arc::new(GeminiGenerator::new()?);
        let speech: Arc<dyn SpeechSynthesizer> = Arc::new(SpeechClient::new()?);
        let mailer: Arc<dyn Mailer> = Arc::new(HttpMailer::new()?);

        Self::new(
            config, records, storage, cache, generator, speech, mailer, manager,
        )
    }

    /// Invalidate every cache entry that could reflect this article: its
    /// exact-id and exact-slug keys plus all cached listing/query results.
    ///
    /// Best effort: a stale cache entry is preferable to failing a job
    /// whose record mutation already landed.
    pub async fn invalidate_article(&self, id: &ArticleId, slug: &str) {
        if let Err(e) = self.cache.del(&keys::article_id_key(id)).await {
            warn!("Failed to invalidate id key for {}: {}", id, e);
        }
        if let Err(e) = self.cache.del(&keys::article_slug_key(slug)).await {
            warn!("Failed to invalidate slug key for {}: {}", id, e);
        }
        if let Err(e) = self.cache.del_pattern(keys::article_query_pattern()).await {
            warn!("Failed to invalidate query caches for {}: {}", id, e);
        }
    }
}
