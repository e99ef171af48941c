//! In-memory queue implementation with priority scheduling

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::backend::{EnqueueOptions, QueueBackend, QueueError};
use crate::job::{JobEntry, JobStatus};

/// Heap entry - highest priority first, then earliest run_at
#[derive(Debug, Clone, Eq, PartialEq)]
struct HeapEntry {
    priority: i32,
    run_at: DateTime<Utc>,
    id: Uuid,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.run_at.cmp(&self.run_at))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct MemoryQueue {
    jobs: Arc<RwLock<HashMap<Uuid, JobEntry>>>,
    queue: Arc<RwLock<BinaryHeap<HeapEntry>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    async fn enqueue(
        &self,
        submitted_by: &str,
        job_type: &str,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<Uuid, QueueError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let run_at = now + Duration::seconds(options.delay_secs.unwrap_or(0) as i64);

        let entry = JobEntry {
            id,
            submitted_by: submitted_by.to_string(),
            job_type: job_type.to_string(),
            payload,
            priority: options.priority,
            status: JobStatus::Pending,
            created_at: now,
            run_at,
            attempts: 0,
            progress: 0,
            last_error: None,
            result: None,
        };

        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(id, entry);
        }

        let mut queue = self.queue.write().await;
        queue.push(HeapEntry {
            priority: options.priority,
            run_at,
            id,
        });

        Ok(id)
    }

    async fn dequeue(&self) -> Result<Option<JobEntry>, QueueError> {
        let mut queue = self.queue.write().await;
        let now = Utc::now();

        // The heap head is the highest-priority entry; a delayed head must
        // not shadow lower-priority jobs that are already due, so scan past
        // not-yet-runnable entries and push them back.
        let mut deferred = Vec::new();
        let mut claimed = None;

        while let Some(entry) = queue.pop() {
            if entry.run_at > now {
                deferred.push(entry);
                continue;
            }
            let mut jobs = self.jobs.write().await;
            if let Some(job) = jobs.get_mut(&entry.id) {
                // Only claim jobs still pending (retries re-push entries)
                if job.status == JobStatus::Pending {
                    job.status = JobStatus::Running;
                    claimed = Some(job.clone());
                    break;
                }
            }
        }

        for entry in deferred {
            queue.push(entry);
        }

        Ok(claimed)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error: Option<String>,
        delay_secs: Option<u64>,
    ) -> Result<(), QueueError> {
        // jobs lock is released before touching the heap; dequeue acquires
        // the locks in the opposite order
        let requeue = {
            let mut jobs = self.jobs.write().await;
            let Some(job) = jobs.get_mut(&id) else {
                return Ok(());
            };
            job.status = status;
            job.last_error = error;

            if let JobStatus::Failed(retry_count) = status {
                job.attempts = retry_count;
                // Use provided delay or fall back to exponential backoff
                let backoff_secs = delay_secs.unwrap_or_else(|| 2_u64.pow(retry_count.min(6)));
                let run_at = Utc::now() + Duration::seconds(backoff_secs as i64);
                job.run_at = run_at;
                job.status = JobStatus::Pending; // Reset to pending for retry

                tracing::debug!(
                    job_id = %id,
                    retry_count = retry_count,
                    delay_secs = backoff_secs,
                    "Re-queuing job with backoff"
                );

                Some(HeapEntry {
                    priority: job.priority,
                    run_at,
                    id,
                })
            } else {
                None
            }
        };

        if let Some(entry) = requeue {
            let mut queue = self.queue.write().await;
            queue.push(entry);
        }

        Ok(())
    }

    async fn set_progress(&self, id: Uuid, progress: u8) -> Result<(), QueueError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(QueueError::NotFound)?;
        job.progress = progress.min(100);
        Ok(())
    }

    async fn set_result(&self, id: Uuid, result: serde_json::Value) -> Result<(), QueueError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(QueueError::NotFound)?;
        job.result = Some(result);
        Ok(())
    }

    async fn get_status(&self, submitted_by: &str, id: Uuid) -> Result<JobStatus, QueueError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&id).ok_or(QueueError::NotFound)?;

        if job.submitted_by != submitted_by {
            return Err(QueueError::NotFound);
        }

        Ok(job.status)
    }

    async fn get_job(&self, submitted_by: &str, id: Uuid) -> Result<JobEntry, QueueError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&id).ok_or(QueueError::NotFound)?;

        if job.submitted_by != submitted_by {
            return Err(QueueError::NotFound);
        }

        Ok(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_enqueue_dequeue() {
        let queue = MemoryQueue::new();
        let payload = json!({ "scan_type": "all_transactions" });

        let id = queue
            .enqueue("ops", "batch_scan", payload.clone(), EnqueueOptions::default())
            .await
            .unwrap();

        let status = queue.get_status("ops", id).await.unwrap();
        assert_eq!(status, JobStatus::Pending);

        let job = queue.dequeue().await.unwrap().expect("Should have job");
        assert_eq!(job.id, id);
        assert_eq!(job.job_type, "batch_scan");
        assert_eq!(job.status, JobStatus::Running);

        // Queue drained
        let empty = queue.dequeue().await.unwrap();
        assert!(empty.is_none());
    }

    #[tokio::test]
    async fn test_priority_ordering() {
        let queue = MemoryQueue::new();

        let low = queue
            .enqueue("ops", "scan", json!({}), EnqueueOptions { priority: 1, delay_secs: None })
            .await
            .unwrap();
        let high = queue
            .enqueue("ops", "scan", json!({}), EnqueueOptions { priority: 5, delay_secs: None })
            .await
            .unwrap();

        let first = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(first.id, high);
        let second = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(second.id, low);
    }

    #[tokio::test]
    async fn test_delayed_job_does_not_block_due_jobs() {
        let queue = MemoryQueue::new();

        // High-priority but delayed
        let delayed = queue
            .enqueue(
                "ops",
                "scan",
                json!({}),
                EnqueueOptions { priority: 10, delay_secs: Some(60) },
            )
            .await
            .unwrap();
        // Low-priority but runnable now
        let due = queue
            .enqueue("ops", "scan", json!({}), EnqueueOptions::default())
            .await
            .unwrap();

        let job = queue.dequeue().await.unwrap().expect("due job available");
        assert_eq!(job.id, due);

        // The delayed one is still waiting
        assert!(queue.dequeue().await.unwrap().is_none());
        assert_eq!(
            queue.get_status("ops", delayed).await.unwrap(),
            JobStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_retry_requeues_with_backoff() {
        let queue = MemoryQueue::new();
        let id = queue
            .enqueue("ops", "scan", json!({}), EnqueueOptions::default())
            .await
            .unwrap();

        let _ = queue.dequeue().await.unwrap().unwrap();
        queue
            .update_status(id, JobStatus::Failed(1), Some("boom".into()), Some(0))
            .await
            .unwrap();

        // Reset to pending and runnable immediately (0s delay)
        let retried = queue.dequeue().await.unwrap().expect("requeued job");
        assert_eq!(retried.id, id);
        assert_eq!(retried.attempts, 1);
        assert_eq!(retried.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_progress_and_result() {
        let queue = MemoryQueue::new();
        let id = queue
            .enqueue("ops", "scan", json!({}), EnqueueOptions::default())
            .await
            .unwrap();

        queue.set_progress(id, 40).await.unwrap();
        queue.set_result(id, json!({"flagged": 3})).await.unwrap();

        let job = queue.get_job("ops", id).await.unwrap();
        assert_eq!(job.progress, 40);
        assert_eq!(job.result, Some(json!({"flagged": 3})));

        // Progress is clamped
        queue.set_progress(id, 250).await.unwrap();
        assert_eq!(queue.get_job("ops", id).await.unwrap().progress, 100);
    }

    #[tokio::test]
    async fn test_submitter_scoping() {
        let queue = MemoryQueue::new();
        let id = queue
            .enqueue("alice", "scan", json!({}), EnqueueOptions::default())
            .await
            .unwrap();

        assert!(queue.get_job("bob", id).await.is_err());
        assert!(queue.get_job("alice", id).await.is_ok());
    }
}
