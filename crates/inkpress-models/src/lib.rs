//! Shared data models for the Inkpress backend.
//!
//! This crate provides Serde-serializable types for:
//! - Articles and their generation/narration lifecycle
//! - Job identifiers and queue-level job state
//! - Voice configuration and audio encodings for narration

pub mod article;
pub mod job;
pub mod voice;

// Re-export common types
pub use article::{Article, ArticleId, GenerationParams, GenerationStatus, NarrationStatus};
pub use job::{JobId, JobStatus, QueueName};
pub use voice::{AudioEncoding, VoiceConfig};
