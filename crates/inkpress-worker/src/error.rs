//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Malformed payload or impossible request; never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Content generation failed: {0}")]
    Generation(String),

    #[error("Speech synthesis failed: {0}")]
    Speech(String),

    #[error("Mail delivery failed: {0}")]
    Mail(String),

    /// Requested encoding cannot be byte-concatenated across chunks.
    #[error("Unsupported audio encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Job timed out after {0}s")]
    Timeout(u64),

    #[error("Storage error: {0}")]
    Storage(#[from] inkpress_storage::StorageError),

    #[error("Record store error: {0}")]
    RecordStore(#[from] inkpress_records::RecordStoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] inkpress_cache::CacheError),

    #[error("Queue error: {0}")]
    Queue(#[from] inkpress_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    pub fn speech_failed(msg: impl Into<String>) -> Self {
        Self::Speech(msg.into())
    }

    pub fn mail_failed(msg: impl Into<String>) -> Self {
        Self::Mail(msg.into())
    }

    pub fn unsupported_encoding(msg: impl Into<String>) -> Self {
        Self::UnsupportedEncoding(msg.into())
    }

    /// Whether the broker should retry the job. Validation-class errors
    /// fail immediately; everything else is treated as transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            WorkerError::Validation(_) | WorkerError::UnsupportedEncoding(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_not_retryable() {
        assert!(!WorkerError::validation("bad payload").is_retryable());
        assert!(!WorkerError::unsupported_encoding("ogg_opus").is_retryable());
    }

    #[test]
    fn provider_errors_are_retryable() {
        assert!(WorkerError::generation_failed("rate limited").is_retryable());
        assert!(WorkerError::speech_failed("503").is_retryable());
        assert!(WorkerError::Timeout(600).is_retryable());
    }
}
