//! Queue manager: owns queue handles, default job options, and lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use redis::AsyncCommands;
use tracing::{info, warn};

use inkpress_models::{JobId, QueueName};

use crate::broker::Broker;
use crate::error::{QueueError, QueueResult};
use crate::job::{EmailJob, GenerationJob, ImageUploadJob, NarrationJob, QueueJob};
use crate::queue::{JobOptions, JobQueue};

/// Handle returned by `add_job`.
#[derive(Debug, Clone)]
pub struct JobHandle {
    /// The payload's job ID
    pub job_id: JobId,
    /// Queue the job was placed on
    pub queue: QueueName,
    /// Broker stream message ID (empty for delayed jobs)
    pub stream_id: String,
}

/// Owns the per-queue handles and the enqueue-side lifecycle.
///
/// Built once at process start and shared as an `Arc`; queues are
/// registered before the manager is shared. Shutdown ordering is
/// workers-before-queues and is driven by the worker runtime: intake stops
/// first, workers drain their in-flight jobs, then `close` retires the
/// queue handles.
pub struct QueueManager {
    broker: Broker,
    queues: HashMap<QueueName, JobQueue>,
    initialized: AtomicBool,
    available: AtomicBool,
    accepting: AtomicBool,
}

impl QueueManager {
    /// Create a manager with no queues registered.
    pub fn new(broker: Broker) -> Self {
        Self {
            broker,
            queues: HashMap::new(),
            initialized: AtomicBool::new(false),
            available: AtomicBool::new(false),
            accepting: AtomicBool::new(true),
        }
    }

    /// Create a manager with every known queue registered with default
    /// job options.
    pub fn with_default_queues(broker: Broker) -> Self {
        let mut manager = Self::new(broker);
        for queue in QueueName::ALL {
            manager.create_queue(queue);
        }
        manager
    }

    /// Register a queue with default job options: 3 attempts, exponential
    /// backoff from 2s, completed retention 1h/100, failed retention 24h.
    pub fn create_queue(&mut self, name: QueueName) -> &JobQueue {
        self.create_queue_with_options(name, JobOptions::default())
    }

    /// Register a queue with explicit job options.
    pub fn create_queue_with_options(&mut self, name: QueueName, options: JobOptions) -> &JobQueue {
        self.queues
            .entry(name)
            .or_insert_with(|| JobQueue::new(self.broker.clone(), name, options))
    }

    /// Initialize the manager. Idempotent: a second call warns and returns
    /// without touching the broker. An unreachable or unconfigured broker
    /// is not an error; the manager stays unavailable and `add_job` fails
    /// synchronously so callers can fall back to synchronous execution.
    pub async fn initialize(&self) -> QueueResult<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            warn!("Queue manager already initialized, skipping");
            return Ok(());
        }

        if !self.broker.is_configured() {
            warn!("No broker configured, queuing unavailable");
            return Ok(());
        }

        if let Err(e) = self.broker.ping().await {
            warn!("Broker unreachable, queuing unavailable: {}", e);
            return Ok(());
        }

        for queue in self.queues.values() {
            queue.init().await?;
        }

        self.available.store(true, Ordering::SeqCst);
        info!("Queue manager initialized with {} queues", self.queues.len());
        Ok(())
    }

    /// Whether the broker is reachable and the manager accepts jobs.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst) && self.accepting.load(Ordering::SeqCst)
    }

    /// Get the handle for a registered queue.
    pub fn queue(&self, name: QueueName) -> QueueResult<&JobQueue> {
        self.queues
            .get(&name)
            .ok_or_else(|| QueueError::UnknownQueue(name.to_string()))
    }

    /// Registered queues, for the worker registry.
    pub fn queues(&self) -> impl Iterator<Item = &JobQueue> {
        self.queues.values()
    }

    fn check_accepting(&self) -> QueueResult<()> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(QueueError::unavailable("queue manager is shutting down"));
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(QueueError::unavailable(
                "no broker configured or broker unreachable",
            ));
        }
        Ok(())
    }

    /// Enqueue a job on the queue its payload belongs to.
    ///
    /// Fails synchronously with [`QueueError::Unavailable`] when the
    /// manager is unavailable; enqueue is otherwise fire-and-forget.
    pub async fn add_job(&self, job: QueueJob) -> QueueResult<JobHandle> {
        self.check_accepting()?;
        let queue = self.queue(job.queue())?;

        let stream_id = queue.enqueue(&job).await?;
        Ok(JobHandle {
            job_id: job.job_id().clone(),
            queue: job.queue(),
            stream_id,
        })
    }

    /// Enqueue a job that becomes visible after `delay`.
    pub async fn add_job_delayed(&self, job: QueueJob, delay: Duration) -> QueueResult<JobHandle> {
        self.check_accepting()?;
        let queue_name = job.queue();
        // Queue existence is checked before writing the delayed entry.
        self.queue(queue_name)?;

        let mut conn = self.broker.connect().await?;
        let payload = serde_json::to_string(&job)?;
        let ready_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;
        let delayed_key = self.broker.key(&["delayed", queue_name.as_str()]);
        let _: () = conn.zadd(&delayed_key, &payload, ready_at).await?;

        Ok(JobHandle {
            job_id: job.job_id().clone(),
            queue: queue_name,
            stream_id: String::new(),
        })
    }

    /// Enqueue a generation job.
    pub async fn enqueue_generation(&self, job: GenerationJob) -> QueueResult<JobHandle> {
        self.add_job(QueueJob::Generation(job)).await
    }

    /// Enqueue a narration job.
    pub async fn enqueue_narration(&self, job: NarrationJob) -> QueueResult<JobHandle> {
        self.add_job(QueueJob::Narration(job)).await
    }

    /// Enqueue an email job.
    pub async fn enqueue_email(&self, job: EmailJob) -> QueueResult<JobHandle> {
        self.add_job(QueueJob::Email(job)).await
    }

    /// Enqueue an image upload job.
    pub async fn enqueue_image_upload(&self, job: ImageUploadJob) -> QueueResult<JobHandle> {
        self.add_job(QueueJob::ImageUpload(job)).await
    }

    /// Stop accepting new jobs. First step of shutdown; workers drain
    /// their in-flight jobs before `close` runs.
    pub fn begin_shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        info!("Queue manager stopped accepting jobs");
    }

    /// Retire the queue handles. Called after every worker has closed so
    /// no worker polls a closed queue.
    pub fn close(&self) {
        self.available.store(false, Ordering::SeqCst);
        info!("Queue manager closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerConfig;
    use inkpress_models::{ArticleId, GenerationParams};

    fn unconfigured_manager() -> QueueManager {
        QueueManager::with_default_queues(Broker::new(BrokerConfig::unconfigured()))
    }

    #[tokio::test]
    async fn add_job_without_broker_fails_synchronously() {
        let manager = unconfigured_manager();
        manager.initialize().await.expect("initialize must not error");
        assert!(!manager.is_available());

        let job = GenerationJob::new(
            ArticleId::new(),
            "author_1",
            GenerationParams::new("A prompt"),
        );

        match manager.enqueue_generation(job).await {
            Err(QueueError::Unavailable(_)) => {}
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn initialize_twice_is_a_noop() {
        let manager = unconfigured_manager();
        manager.initialize().await.unwrap();
        // Second call must not error or reset state.
        manager.initialize().await.unwrap();
        assert!(!manager.is_available());
    }

    #[tokio::test]
    async fn shutdown_refuses_new_jobs() {
        let manager = unconfigured_manager();
        manager.initialize().await.unwrap();
        manager.begin_shutdown();

        let job = NarrationJob::new(ArticleId::new(), "text");
        match manager.enqueue_narration(job).await {
            Err(QueueError::Unavailable(msg)) => {
                assert!(msg.contains("shutting down"));
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn unknown_queue_is_an_error() {
        let broker = Broker::new(BrokerConfig::unconfigured());
        let manager = QueueManager::new(broker);
        assert!(manager.queue(QueueName::Generation).is_err());
    }
}
