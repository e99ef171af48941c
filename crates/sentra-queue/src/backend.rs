//! Queue Backend Trait

use crate::job::{JobEntry, JobStatus};
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Job not found")]
    NotFound,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Options for enqueueing a job
#[derive(Debug, Clone, Copy, Default)]
pub struct EnqueueOptions {
    /// Higher priority jobs are claimed first
    pub priority: i32,
    /// Delay before the job becomes runnable
    pub delay_secs: Option<u64>,
}

#[async_trait]
pub trait QueueBackend: Send + Sync + std::fmt::Debug {
    /// Enqueue a job payload on behalf of a submitter
    async fn enqueue(
        &self,
        submitted_by: &str,
        job_type: &str,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<Uuid, QueueError>;

    /// Claim the next runnable job: highest priority first, then oldest
    async fn dequeue(&self) -> Result<Option<JobEntry>, QueueError>;

    /// Update job status (ack/nack).
    /// `delay_secs` is used for retries - how long until the job is runnable again
    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error: Option<String>,
        delay_secs: Option<u64>,
    ) -> Result<(), QueueError>;

    /// Report completion percentage for a running job
    async fn set_progress(&self, id: Uuid, progress: u8) -> Result<(), QueueError>;

    /// Store the result value of a completed job
    async fn set_result(&self, id: Uuid, result: serde_json::Value) -> Result<(), QueueError>;

    /// Get job status, scoped to the submitter
    async fn get_status(&self, submitted_by: &str, id: Uuid) -> Result<JobStatus, QueueError>;

    /// Get the full job entry, scoped to the submitter
    async fn get_job(&self, submitted_by: &str, id: Uuid) -> Result<JobEntry, QueueError>;
}
