//! Worker registry and per-queue job executors.
//!
//! Binds exactly one worker to each queue, each with its own concurrency
//! ceiling. The registry dispatches payloads to handlers with an
//! exhaustive match and emits events consumed only for logging; it holds
//! no business logic of its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use inkpress_models::{JobId, QueueName};
use inkpress_queue::{JobQueue, QueueJob, QueueManager};

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::{email, generation, image_upload, narration};

/// Event emitted by a worker, consumed only for logging/observability.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A worker loop started.
    WorkerStarted { queue: QueueName },
    /// A worker loop stopped.
    WorkerStopped { queue: QueueName },
    /// A job was picked up.
    JobStarted { queue: QueueName, job_id: JobId },
    /// A job completed successfully.
    JobCompleted { queue: QueueName, job_id: JobId },
    /// A job failed.
    JobFailed {
        queue: QueueName,
        job_id: JobId,
        error: String,
        will_retry: bool,
    },
}

/// One worker bound to one queue.
pub struct QueueWorker {
    queue: JobQueue,
    ctx: Arc<WorkerContext>,
    concurrency: usize,
    semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
    events: broadcast::Sender<WorkerEvent>,
}

impl QueueWorker {
    fn new(
        queue: JobQueue,
        ctx: Arc<WorkerContext>,
        concurrency: usize,
        events: broadcast::Sender<WorkerEvent>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("{}-worker-{}", queue.name(), Uuid::new_v4());

        Self {
            queue,
            ctx,
            concurrency,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            shutdown,
            consumer_name,
            events,
        }
    }

    /// Run the worker until shutdown.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting {} worker '{}' with concurrency {}",
            self.queue.name(),
            self.consumer_name,
            self.concurrency
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let maintenance = self.spawn_maintenance();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping {} worker", self.queue.name());
                        break;
                    }
                }
                result = self.consume_once() => {
                    if let Err(e) = result {
                        error!("Error consuming {} jobs: {}", self.queue.name(), e);
                        // Back off on broker errors
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        maintenance.abort();

        // No forced interruption: in-flight jobs run to completion.
        info!("Waiting for in-flight {} jobs to complete...", self.queue.name());
        let _ = tokio::time::timeout(self.ctx.config.shutdown_timeout, self.wait_for_jobs()).await;

        info!("{} worker stopped", self.queue.name());
        Ok(())
    }

    /// Periodic maintenance: promote due retries and claim deliveries
    /// orphaned by crashed workers.
    fn spawn_maintenance(&self) -> JoinHandle<()> {
        let queue = self.queue.clone();
        let ctx = Arc::clone(&self.ctx);
        let semaphore = Arc::clone(&self.semaphore);
        let events = self.events.clone();
        let consumer_name = self.consumer_name.clone();
        let claim_interval = self.ctx.config.claim_interval;
        let claim_min_idle = self.ctx.config.claim_min_idle;
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(e) = queue.promote_due(32).await {
                            warn!("Failed to promote delayed {} jobs: {}", queue.name(), e);
                        }

                        match queue
                            .claim_pending(&consumer_name, claim_min_idle.as_millis() as u64, 5)
                            .await
                        {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!("Claimed {} pending {} jobs", jobs.len(), queue.name());
                                for (message_id, job) in jobs {
                                    let permit =
                                        match semaphore.clone().acquire_owned().await {
                                            Ok(permit) => permit,
                                            Err(_) => break,
                                        };
                                    let ctx = Arc::clone(&ctx);
                                    let queue = queue.clone();
                                    let events = events.clone();
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        execute_job(ctx, queue, events, message_id, job).await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!("Failed to claim pending {} jobs: {}", queue.name(), e);
                            }
                        }
                    }
                }
            }
        })
    }

    /// Pull jobs while below the concurrency ceiling. This is the sole
    /// admission-control mechanism; there is no external rate limiter.
    async fn consume_once(&self) -> WorkerResult<()> {
        let available = self.semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(
                &self.consumer_name,
                1000, // Block for 1 second
                available.min(self.ctx.config.consume_batch),
            )
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from {}", jobs.len(), self.queue.name());

        for (message_id, job) in jobs {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;
            let ctx = Arc::clone(&self.ctx);
            let queue = self.queue.clone();
            let events = self.events.clone();

            tokio::spawn(async move {
                let _permit = permit;
                execute_job(ctx, queue, events, message_id, job).await;
            });
        }

        Ok(())
    }

    async fn wait_for_jobs(&self) {
        loop {
            if self.semaphore.available_permits() == self.concurrency {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Execute a single job with retry and DLQ handling.
async fn execute_job(
    ctx: Arc<WorkerContext>,
    queue: JobQueue,
    events: broadcast::Sender<WorkerEvent>,
    message_id: String,
    job: QueueJob,
) {
    let job_id = job.job_id().clone();
    let queue_name = queue.name();

    let _ = events.send(WorkerEvent::JobStarted {
        queue: queue_name,
        job_id: job_id.clone(),
    });
    info!("Executing {} job {}", queue_name, job_id);

    match process_job(&ctx, &job).await {
        Ok(()) => {
            let _ = events.send(WorkerEvent::JobCompleted {
                queue: queue_name,
                job_id: job_id.clone(),
            });
            if let Err(e) = queue.complete(&message_id, &job).await {
                error!("Failed to record completion of job {}: {}", job_id, e);
            }
        }
        Err(e) => {
            error!("Job {} failed: {}", job_id, e);

            // Malformed payloads and impossible requests go straight to
            // the DLQ; retrying cannot help.
            if !e.is_retryable() {
                let _ = events.send(WorkerEvent::JobFailed {
                    queue: queue_name,
                    job_id: job_id.clone(),
                    error: e.to_string(),
                    will_retry: false,
                });
                if let Err(dlq_err) = queue.dlq(&message_id, &job, &e.to_string()).await {
                    error!("Failed to move job {} to DLQ: {}", job_id, dlq_err);
                }
                return;
            }

            let max_attempts = queue.max_attempts();
            let attempts = match queue.increment_attempts(&job_id).await {
                Ok(attempts) => attempts,
                Err(count_err) => {
                    error!("Failed to count attempts for job {}: {}", job_id, count_err);
                    max_attempts
                }
            };

            if attempts >= max_attempts {
                warn!(
                    "Job {} exceeded max attempts ({}), moving to DLQ",
                    job_id, max_attempts
                );
                let _ = events.send(WorkerEvent::JobFailed {
                    queue: queue_name,
                    job_id: job_id.clone(),
                    error: e.to_string(),
                    will_retry: false,
                });
                if let Err(dlq_err) = queue.dlq(&message_id, &job, &e.to_string()).await {
                    error!("Failed to move job {} to DLQ: {}", job_id, dlq_err);
                }
            } else {
                info!(
                    "Job {} will be retried (attempt {}/{})",
                    job_id, attempts, max_attempts
                );
                let _ = events.send(WorkerEvent::JobFailed {
                    queue: queue_name,
                    job_id: job_id.clone(),
                    error: e.to_string(),
                    will_retry: true,
                });
                if let Err(retry_err) = queue.schedule_retry(&message_id, &job, attempts).await {
                    error!("Failed to schedule retry for job {}: {}", job_id, retry_err);
                }
            }
        }
    }
}

/// Validate and dispatch one job. Exhaustive over the payload enum so a
/// new job type is a compile-time-checked change. Every execution is
/// bounded by the configured job timeout so a stuck external call cannot
/// hold a concurrency slot indefinitely.
async fn process_job(ctx: &WorkerContext, job: &QueueJob) -> WorkerResult<()> {
    if let Err(msg) = job.validate_payload() {
        return Err(WorkerError::validation(msg));
    }

    let timeout = ctx.config.job_timeout;
    let run = async {
        match job {
            QueueJob::Generation(j) => generation::run(ctx, j).await,
            QueueJob::Narration(j) => narration::run(ctx, j).await,
            QueueJob::Email(j) => email::run(ctx, j).await,
            QueueJob::ImageUpload(j) => image_upload::run(ctx, j).await,
        }
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(result) => result,
        Err(_) => Err(WorkerError::Timeout(timeout.as_secs())),
    }
}

/// Binds one worker per queue and owns the event channel.
pub struct WorkerRegistry {
    manager: Arc<QueueManager>,
    ctx: Arc<WorkerContext>,
    events: broadcast::Sender<WorkerEvent>,
}

impl WorkerRegistry {
    pub fn new(manager: Arc<QueueManager>, ctx: Arc<WorkerContext>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            manager,
            ctx,
            events,
        }
    }

    /// Subscribe to worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.events.subscribe()
    }

    /// Start one worker per registered queue.
    pub fn start(&self) -> WorkerResult<WorkerSet> {
        let logger = spawn_event_logger(self.events.subscribe());

        let mut workers = Vec::new();
        let mut handles = Vec::new();

        for queue_name in QueueName::ALL {
            let queue = self.manager.queue(queue_name)?.clone();
            let concurrency = self.ctx.config.concurrency_for(queue_name);
            let worker = Arc::new(QueueWorker::new(
                queue,
                Arc::clone(&self.ctx),
                concurrency,
                self.events.clone(),
            ));

            let _ = self.events.send(WorkerEvent::WorkerStarted { queue: queue_name });

            let handle = tokio::spawn({
                let worker = Arc::clone(&worker);
                async move { worker.run().await }
            });

            workers.push(worker);
            handles.push(handle);
        }

        Ok(WorkerSet {
            workers,
            handles,
            logger,
            events: self.events.clone(),
        })
    }
}

/// Handles to the running workers.
pub struct WorkerSet {
    workers: Vec<Arc<QueueWorker>>,
    handles: Vec<JoinHandle<WorkerResult<()>>>,
    logger: JoinHandle<()>,
    events: broadcast::Sender<WorkerEvent>,
}

impl WorkerSet {
    /// Gracefully stop every worker, waiting for in-flight jobs.
    pub async fn shutdown(self) {
        for worker in &self.workers {
            let _ = self.events.send(WorkerEvent::WorkerStopped {
                queue: worker.queue.name(),
            });
            worker.shutdown();
        }

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Worker task join error: {}", e);
            }
        }

        self.logger.abort();
        info!("All workers stopped");
    }
}

fn spawn_event_logger(mut rx: broadcast::Receiver<WorkerEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(WorkerEvent::WorkerStarted { queue }) => {
                    info!(queue = %queue, "worker started");
                }
                Ok(WorkerEvent::WorkerStopped { queue }) => {
                    info!(queue = %queue, "worker stopping");
                }
                Ok(WorkerEvent::JobStarted { queue, job_id }) => {
                    debug!(queue = %queue, job_id = %job_id, "job started");
                }
                Ok(WorkerEvent::JobCompleted { queue, job_id }) => {
                    info!(queue = %queue, job_id = %job_id, "job completed");
                }
                Ok(WorkerEvent::JobFailed {
                    queue,
                    job_id,
                    error,
                    will_retry,
                }) => {
                    warn!(
                        queue = %queue,
                        job_id = %job_id,
                        will_retry,
                        "job failed: {}",
                        error
                    );
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Event logger lagged, dropped {} events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
