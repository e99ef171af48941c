//! # Sentra Queue
//!
//! Async background worker queue for batch scan jobs.
//!
//! Features:
//! - Generic `Job` trait
//! - Pluggable backend (Memory, SQLite)
//! - Priority + delayed scheduling
//! - Worker pool with concurrency control
//! - Retry with exponential backoff, dead-letter on exhaustion
//! - Progress reporting for long-running jobs

pub mod backend;
pub mod job;
pub mod memory;
pub mod worker;

pub use backend::{EnqueueOptions, QueueBackend, QueueError};
pub use job::{BackoffStrategy, Job, JobEntry, JobId, JobResult, JobStatus};
pub use memory::MemoryQueue;
pub use worker::{WorkerConfig, WorkerPool};
