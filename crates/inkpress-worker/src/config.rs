//! Worker configuration.

use std::time::Duration;

use inkpress_models::QueueName;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Concurrent generation jobs (cost-heavy LLM calls)
    pub generation_concurrency: usize,
    /// Concurrent narration jobs (cost-heavy speech calls)
    pub narration_concurrency: usize,
    /// Concurrent image upload jobs
    pub image_upload_concurrency: usize,
    /// Concurrent email jobs
    pub email_concurrency: usize,
    /// Per-job execution timeout
    pub job_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// How often the worker promotes due retries and scans for orphaned
    /// pending deliveries
    pub claim_interval: Duration,
    /// Minimum idle time before a pending delivery can be claimed
    /// (crash recovery)
    pub claim_min_idle: Duration,
    /// Max jobs pulled per consume round-trip
    pub consume_batch: usize,
    /// Speech provider request limit in UTF-8 bytes, kept conservatively
    /// under the provider's hard ceiling
    pub speech_byte_limit: usize,
    /// Timeout for fetching external asset sources
    pub source_fetch_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            generation_concurrency: 2,
            narration_concurrency: 2,
            image_upload_concurrency: 3,
            email_concurrency: 5,
            job_timeout: Duration::from_secs(600),
            shutdown_timeout: Duration::from_secs(30),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            consume_batch: 5,
            speech_byte_limit: 4500,
            source_fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            generation_concurrency: env_usize("WORKER_GENERATION_CONCURRENCY")
                .unwrap_or(defaults.generation_concurrency),
            narration_concurrency: env_usize("WORKER_NARRATION_CONCURRENCY")
                .unwrap_or(defaults.narration_concurrency),
            image_upload_concurrency: env_usize("WORKER_IMAGE_UPLOAD_CONCURRENCY")
                .unwrap_or(defaults.image_upload_concurrency),
            email_concurrency: env_usize("WORKER_EMAIL_CONCURRENCY")
                .unwrap_or(defaults.email_concurrency),
            job_timeout: env_secs("WORKER_JOB_TIMEOUT").unwrap_or(defaults.job_timeout),
            shutdown_timeout: env_secs("WORKER_SHUTDOWN_TIMEOUT")
                .unwrap_or(defaults.shutdown_timeout),
            claim_interval: env_secs("WORKER_CLAIM_INTERVAL_SECS")
                .unwrap_or(defaults.claim_interval),
            claim_min_idle: env_secs("WORKER_CLAIM_MIN_IDLE_SECS")
                .unwrap_or(defaults.claim_min_idle),
            consume_batch: env_usize("WORKER_CONSUME_BATCH").unwrap_or(defaults.consume_batch),
            speech_byte_limit: env_usize("SPEECH_BYTE_LIMIT")
                .unwrap_or(defaults.speech_byte_limit),
            source_fetch_timeout: env_secs("SOURCE_FETCH_TIMEOUT_SECS")
                .unwrap_or(defaults.source_fetch_timeout),
        }
    }

    /// Concurrency ceiling for a queue. These reflect the cost/rate-limit
    /// sensitivity of each downstream collaborator, not a platform limit.
    pub fn concurrency_for(&self, queue: QueueName) -> usize {
        let ceiling = match queue {
            QueueName::Generation => self.generation_concurrency,
            QueueName::Narration => self.narration_concurrency,
            QueueName::ImageUpload => self.image_upload_concurrency,
            QueueName::Email => self.email_concurrency,
        };
        ceiling.max(1)
    }
}

fn env_usize(var: &str) -> Option<usize> {
    std::env::var(var).ok().and_then(|s| s.parse().ok())
}

fn env_secs(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ceilings_follow_collaborator_cost() {
        let config = WorkerConfig::default();
        assert_eq!(config.concurrency_for(QueueName::Generation), 2);
        assert_eq!(config.concurrency_for(QueueName::Narration), 2);
        assert_eq!(config.concurrency_for(QueueName::ImageUpload), 3);
        assert_eq!(config.concurrency_for(QueueName::Email), 5);
    }

    #[test]
    fn ceiling_never_drops_to_zero() {
        let config = WorkerConfig {
            email_concurrency: 0,
            ..WorkerConfig::default()
        };
        assert_eq!(config.concurrency_for(QueueName::Email), 1);
    }
}
