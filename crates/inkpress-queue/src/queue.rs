//! Per-queue stream operations on the broker.
//!
//! Each named queue is one Redis stream with one consumer group. Failed
//! attempts below the retry bound are parked in a per-queue delayed sorted
//! set (scored by ready-at time) and promoted back into the stream by the
//! worker loop; at the bound they move to a per-queue dead-letter stream.

use std::time::Duration;

use chrono::Utc;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use inkpress_models::{JobId, JobStatus, QueueName};

use crate::broker::Broker;
use crate::error::{QueueError, QueueResult};
use crate::job::QueueJob;

/// Default job options registered by `create_queue`.
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Max execution attempts before dead-lettering
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt
    pub backoff_base: Duration,
    /// Completed-job retention by age
    pub completed_max_age: Duration,
    /// Completed-job retention by count
    pub completed_max_count: usize,
    /// Failed-job retention by age (post-mortem window)
    pub failed_max_age: Duration,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
            completed_max_age: Duration::from_secs(3600),
            completed_max_count: 100,
            failed_max_age: Duration::from_secs(86400),
        }
    }
}

impl JobOptions {
    /// Delay before the given retry attempt (1-based): base * 2^(n-1).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base.saturating_mul(factor)
    }
}

/// Handle to one named queue on the broker.
#[derive(Clone)]
pub struct JobQueue {
    broker: Broker,
    name: QueueName,
    options: JobOptions,
    stream_key: String,
    group: String,
    dlq_key: String,
    delayed_key: String,
    done_key: String,
}

impl JobQueue {
    /// Create a handle for one queue.
    pub fn new(broker: Broker, name: QueueName, options: JobOptions) -> Self {
        let stream_key = broker.key(&["jobs", name.as_str()]);
        let group = broker.key(&["workers", name.as_str()]);
        let dlq_key = broker.key(&["dlq", name.as_str()]);
        let delayed_key = broker.key(&["delayed", name.as_str()]);
        let done_key = broker.key(&["done", name.as_str()]);

        Self {
            broker,
            name,
            options,
            stream_key,
            group,
            dlq_key,
            delayed_key,
            done_key,
        }
    }

    pub fn name(&self) -> QueueName {
        self.name
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    pub fn max_attempts(&self) -> u32 {
        self.options.max_attempts
    }

    fn retry_key(&self, job_id: &JobId) -> String {
        self.broker.key(&["retry", self.name.as_str(), job_id.as_str()])
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.broker.connect().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream_key)
            .arg(&self.group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Enqueue a job. Returns the stream message ID.
    pub async fn enqueue(&self, job: &QueueJob) -> QueueResult<String> {
        let mut conn = self.broker.connect().await?;
        let payload = serde_json::to_string(job)?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.stream_key)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        info!(
            "Enqueued {} job {} with message ID {}",
            self.name,
            job.job_id(),
            message_id
        );

        Ok(message_id)
    }

    /// Consume jobs from the queue as (message_id, job) pairs.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.broker.connect().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.stream_key)
            .arg(">") // Only new messages
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();

        for stream_key in result.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();

                if let Some(redis::Value::BulkString(payload)) = entry.map.get("job") {
                    let payload_str = String::from_utf8_lossy(payload);
                    match serde_json::from_str::<QueueJob>(&payload_str) {
                        Ok(job) => {
                            debug!("Consumed job {} from {}", job.job_id(), self.name);
                            jobs.push((message_id, job));
                        }
                        Err(e) => {
                            warn!("Failed to parse job payload: {}", e);
                            // Ack the malformed message to prevent reprocessing
                            self.ack(&message_id).await.ok();
                        }
                    }
                }
            }
        }

        Ok(jobs)
    }

    /// Claim pending deliveries that have been idle for too long.
    /// This handles jobs from crashed workers.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.broker.connect().await?;

        let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
            .arg(&self.stream_key)
            .arg(&self.group)
            .query_async(&mut conn)
            .await?;

        if pending.count() == 0 {
            return Ok(Vec::new());
        }

        let result: redis::streams::StreamClaimReply = redis::cmd("XCLAIM")
            .arg(&self.stream_key)
            .arg(&self.group)
            .arg(consumer_name)
            .arg(min_idle_ms)
            .arg("0-0")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();

        for entry in result.ids {
            let message_id = entry.id.clone();

            if let Some(redis::Value::BulkString(payload)) = entry.map.get("job") {
                let payload_str = String::from_utf8_lossy(payload);
                match serde_json::from_str::<QueueJob>(&payload_str) {
                    Ok(job) => {
                        info!("Claimed pending job {} from {}", job.job_id(), self.name);
                        jobs.push((message_id, job));
                    }
                    Err(e) => {
                        warn!("Failed to parse claimed job payload: {}", e);
                        self.ack(&message_id).await.ok();
                    }
                }
            }
        }

        Ok(jobs)
    }

    /// Acknowledge a delivery and drop it from the stream.
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.broker.connect().await?;

        redis::cmd("XACK")
            .arg(&self.stream_key)
            .arg(&self.group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.stream_key)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged delivery {}", message_id);
        Ok(())
    }

    /// Mark a job completed: ack the delivery, clear its attempt counter,
    /// and record it in the completed stream (retained 1h / 100 entries).
    pub async fn complete(&self, message_id: &str, job: &QueueJob) -> QueueResult<()> {
        self.ack(message_id).await?;

        let mut conn = self.broker.connect().await?;
        let _: () = conn.del(self.retry_key(job.job_id())).await?;

        redis::cmd("XADD")
            .arg(&self.done_key)
            .arg("*")
            .arg("job_id")
            .arg(job.job_id().as_str())
            .arg("status")
            .arg(JobStatus::Completed.as_str())
            .arg("completed_at")
            .arg(Utc::now().timestamp_millis())
            .query_async::<()>(&mut conn)
            .await?;

        let min_id = stream_min_id(self.options.completed_max_age);
        redis::cmd("XTRIM")
            .arg(&self.done_key)
            .arg("MINID")
            .arg("~")
            .arg(&min_id)
            .query_async::<()>(&mut conn)
            .await?;
        redis::cmd("XTRIM")
            .arg(&self.done_key)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.options.completed_max_count)
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    /// Increment the attempt counter for a job.
    ///
    /// Keyed by job ID, not delivery ID: retries re-enter the stream under
    /// fresh message IDs but must share one counter.
    pub async fn increment_attempts(&self, job_id: &JobId) -> QueueResult<u32> {
        let mut conn = self.broker.connect().await?;

        let key = self.retry_key(job_id);
        let count: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, self.options.failed_max_age.as_secs() as i64)
            .await?;
        Ok(count)
    }

    /// Park a failed job for a later retry: ack the failed delivery and
    /// schedule re-enqueue after the attempt's backoff delay.
    pub async fn schedule_retry(
        &self,
        message_id: &str,
        job: &QueueJob,
        attempt: u32,
    ) -> QueueResult<()> {
        let delay = self.options.backoff_delay(attempt);
        let ready_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;

        let mut conn = self.broker.connect().await?;
        let payload = serde_json::to_string(job)?;
        let _: () = conn.zadd(&self.delayed_key, &payload, ready_at).await?;

        self.ack(message_id).await?;

        info!(
            "Scheduled retry {} for job {} on {} in {:?}",
            attempt,
            job.job_id(),
            self.name,
            delay
        );
        Ok(())
    }

    /// Move due delayed jobs back into the stream. Returns how many were
    /// promoted. ZREM runs after XADD, so a crash between the two yields a
    /// duplicate delivery rather than a lost job.
    pub async fn promote_due(&self, max: usize) -> QueueResult<usize> {
        let mut conn = self.broker.connect().await?;
        let now = Utc::now().timestamp_millis();

        let due: Vec<String> = conn
            .zrangebyscore_limit(&self.delayed_key, "-inf", now, 0, max as isize)
            .await?;

        let mut promoted = 0;
        for payload in due {
            redis::cmd("XADD")
                .arg(&self.stream_key)
                .arg("*")
                .arg("job")
                .arg(&payload)
                .query_async::<String>(&mut conn)
                .await?;
            let _: () = conn.zrem(&self.delayed_key, &payload).await?;
            promoted += 1;
        }

        if promoted > 0 {
            debug!("Promoted {} delayed jobs on {}", promoted, self.name);
        }
        Ok(promoted)
    }

    /// Move a job to the dead letter queue.
    pub async fn dlq(&self, message_id: &str, job: &QueueJob, error: &str) -> QueueResult<()> {
        let mut conn = self.broker.connect().await?;
        let payload = serde_json::to_string(job)?;

        redis::cmd("XADD")
            .arg(&self.dlq_key)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("status")
            .arg(JobStatus::DeadLettered.as_str())
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        // Failed-job retention window for post-mortem inspection.
        let min_id = stream_min_id(self.options.failed_max_age);
        redis::cmd("XTRIM")
            .arg(&self.dlq_key)
            .arg("MINID")
            .arg("~")
            .arg(&min_id)
            .query_async::<()>(&mut conn)
            .await?;

        let _: () = conn.del(self.retry_key(job.job_id())).await?;
        self.ack(message_id).await?;

        warn!("Moved job {} on {} to DLQ: {}", job.job_id(), self.name, error);
        Ok(())
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.broker.connect().await?;
        let len: u64 = conn.xlen(&self.stream_key).await?;
        Ok(len)
    }

    /// Get DLQ length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.broker.connect().await?;
        let len: u64 = conn.xlen(&self.dlq_key).await?;
        Ok(len)
    }

    /// Get number of jobs parked for retry.
    pub async fn delayed_len(&self) -> QueueResult<u64> {
        let mut conn = self.broker.connect().await?;
        let len: u64 = conn.zcard(&self.delayed_key).await?;
        Ok(len)
    }
}

/// Stream ID lower bound for entries younger than `age`. Stream IDs are
/// millisecond timestamps, so trimming to `now - age` is an age bound.
fn stream_min_id(age: Duration) -> String {
    let cutoff = Utc::now().timestamp_millis() - age.as_millis() as i64;
    format!("{}-0", cutoff.max(0))
}
