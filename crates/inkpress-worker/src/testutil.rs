//! Shared fakes and harness for worker tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use inkpress_cache::MemoryCache;
use inkpress_models::{GenerationParams, VoiceConfig};
use inkpress_queue::{EmailJob, QueueError, QueueJob};
use inkpress_records::MemoryRecordStore;
use inkpress_storage::MemoryStorage;

use crate::config::WorkerConfig;
use crate::context::{JobDispatcher, WorkerContext};
use crate::email::Mailer;
use crate::error::{WorkerError, WorkerResult};
use crate::generator::{ContentGenerator, GeneratedContent};
use crate::speech::SpeechSynthesizer;

/// Generator fake returning a fixed draft.
pub struct FakeGenerator {
    pub content: GeneratedContent,
}

impl FakeGenerator {
    pub fn with_body(body: impl Into<String>) -> Self {
        Self {
            content: GeneratedContent {
                title: "Generated Title".to_string(),
                body: body.into(),
                media_sources: Vec::new(),
            },
        }
    }

    pub fn with_media(mut self, sources: Vec<String>) -> Self {
        self.content.media_sources = sources;
        self
    }
}

#[async_trait]
impl ContentGenerator for FakeGenerator {
    async fn generate(&self, _params: &GenerationParams) -> WorkerResult<GeneratedContent> {
        Ok(self.content.clone())
    }
}

/// Generator fake that always fails with a transient provider error.
pub struct FailingGenerator;

#[async_trait]
impl ContentGenerator for FailingGenerator {
    async fn generate(&self, _params: &GenerationParams) -> WorkerResult<GeneratedContent> {
        Err(WorkerError::generation_failed("provider returned 503"))
    }
}

/// Speech fake: records every synthesized chunk and returns one audio
/// byte per input byte, so concatenated lengths are easy to assert.
#[derive(Default)]
pub struct FakeSpeech {
    pub fail: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str, _voice: &VoiceConfig) -> WorkerResult<Vec<u8>> {
        if self.fail {
            return Err(WorkerError::speech_failed("provider returned 503"));
        }
        self.calls.lock().await.push(text.to_string());
        Ok(vec![0u8; text.len()])
    }
}

/// Mailer fake recording sent messages.
#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<EmailJob>>,
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, job: &EmailJob) -> WorkerResult<()> {
        self.sent.lock().await.push(job.clone());
        Ok(())
    }
}

/// Dispatcher fake recording chained jobs.
#[derive(Default)]
pub struct FakeDispatcher {
    pub dispatched: Mutex<Vec<QueueJob>>,
}

#[async_trait]
impl JobDispatcher for FakeDispatcher {
    async fn dispatch(&self, job: QueueJob) -> Result<(), QueueError> {
        self.dispatched.lock().await.push(job);
        Ok(())
    }
}

/// A worker context wired to in-memory collaborators, with handles kept
/// for assertions.
pub struct Harness {
    pub ctx: WorkerContext,
    pub records: Arc<MemoryRecordStore>,
    pub storage: Arc<MemoryStorage>,
    pub cache: Arc<MemoryCache>,
    pub speech: Arc<FakeSpeech>,
    pub mailer: Arc<FakeMailer>,
    pub dispatcher: Arc<FakeDispatcher>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_collaborators(
            Arc::new(FakeGenerator::with_body("A body.")),
            Arc::new(FakeSpeech::new()),
        )
    }

    pub fn with_collaborators(
        generator: Arc<dyn ContentGenerator>,
        speech: Arc<FakeSpeech>,
    ) -> Self {
        let records = Arc::new(MemoryRecordStore::new());
        let storage = Arc::new(MemoryStorage::new());
        let cache = Arc::new(MemoryCache::new());
        let mailer = Arc::new(FakeMailer::default());
        let dispatcher = Arc::new(FakeDispatcher::default());

        let ctx = WorkerContext::new(
            WorkerConfig::default(),
            records.clone(),
            storage.clone(),
            cache.clone(),
            generator,
            speech.clone(),
            mailer.clone(),
            dispatcher.clone(),
        )
        .expect("test context");

        Self {
            ctx,
            records,
            storage,
            cache,
            speech,
            mailer,
            dispatcher,
        }
    }
}
