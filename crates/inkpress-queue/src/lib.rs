//! Redis Streams job queue for the Inkpress pipeline.
//!
//! This crate provides:
//! - A thin broker adapter over Redis; absent configuration the manager
//!   degrades to an unavailable mode where `add_job` fails synchronously
//! - Durable per-queue streams with consumer groups, delayed retries with
//!   exponential backoff, dead-letter streams, and bounded retention
//! - Strongly-typed job payloads dispatched as a tagged enum

pub mod broker;
pub mod error;
pub mod job;
pub mod manager;
pub mod queue;

pub use broker::{Broker, BrokerConfig};
pub use error::{QueueError, QueueResult};
pub use job::{EmailJob, GenerationJob, ImageUploadJob, NarrationJob, QueueJob};
pub use manager::{JobHandle, QueueManager};
pub use queue::{JobOptions, JobQueue};
