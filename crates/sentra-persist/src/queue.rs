//! Durable queue backend over the `fraud_scan_jobs` table
//!
//! Claiming uses `UPDATE ... RETURNING` against the oldest pending row of
//! the highest priority, so concurrent workers never double-claim a job.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use sentra_queue::{
    backend::{EnqueueOptions, QueueError},
    job::{JobEntry, JobStatus},
    QueueBackend,
};

#[derive(Debug)]
pub struct SqliteQueueBackend {
    pool: SqlitePool,
}

impl SqliteQueueBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueueBackend for SqliteQueueBackend {
    async fn enqueue(
        &self,
        submitted_by: &str,
        job_type: &str,
        payload: Value,
        options: EnqueueOptions,
    ) -> Result<Uuid, QueueError> {
        let id = Uuid::new_v4();
        let run_at = if let Some(delay) = options.delay_secs {
            Utc::now() + chrono::Duration::seconds(delay as i64)
        } else {
            Utc::now()
        };

        sqlx::query(
            "INSERT INTO fraud_scan_jobs (id, submitted_by, job_type, payload, priority, status, run_at)
             VALUES (?, ?, ?, ?, ?, 'pending', ?)",
        )
        .bind(id.to_string())
        .bind(submitted_by)
        .bind(job_type)
        .bind(payload.to_string())
        .bind(options.priority)
        .bind(run_at)
        .execute(&self.pool)
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))?;

        Ok(id)
    }

    async fn dequeue(&self) -> Result<Option<JobEntry>, QueueError> {
        let worker_id = Uuid::new_v4().to_string();

        let row = sqlx::query(
            r#"
            UPDATE fraud_scan_jobs
            SET status = 'running',
                locked_at = CURRENT_TIMESTAMP,
                locked_by = ?
            WHERE id = (
                SELECT id FROM fraud_scan_jobs
                WHERE status = 'pending' AND run_at <= CURRENT_TIMESTAMP
                ORDER BY priority DESC, created_at ASC
                LIMIT 1
            )
            RETURNING id, submitted_by, job_type, payload, priority, run_at, created_at,
                      retries, progress, last_error
            "#,
        )
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(Self::claimed_row_to_entry(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error: Option<String>,
        delay_secs: Option<u64>,
    ) -> Result<(), QueueError> {
        if let JobStatus::Failed(_) = status {
            let delay = delay_secs.unwrap_or(60);
            sqlx::query(
                r#"
                UPDATE fraud_scan_jobs
                SET status = 'pending', last_error = ?, locked_at = NULL, locked_by = NULL,
                    retries = retries + 1, run_at = datetime('now', '+' || ? || ' seconds')
                WHERE id = ?
                "#,
            )
            .bind(error)
            .bind(delay as i64)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        } else {
            sqlx::query(
                r#"
                UPDATE fraud_scan_jobs
                SET status = ?, last_error = ?, locked_at = NULL, locked_by = NULL
                WHERE id = ?
                "#,
            )
            .bind(status.as_str())
            .bind(error)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        }

        Ok(())
    }

    async fn set_progress(&self, id: Uuid, progress: u8) -> Result<(), QueueError> {
        sqlx::query("UPDATE fraud_scan_jobs SET progress = ? WHERE id = ?")
            .bind(progress.min(100) as i64)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn set_result(&self, id: Uuid, result: Value) -> Result<(), QueueError> {
        sqlx::query("UPDATE fraud_scan_jobs SET result = ? WHERE id = ?")
            .bind(result.to_string())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get_status(&self, submitted_by: &str, id: Uuid) -> Result<JobStatus, QueueError> {
        let row = sqlx::query(
            "SELECT status, retries FROM fraud_scan_jobs WHERE id = ? AND submitted_by = ?",
        )
        .bind(id.to_string())
        .bind(submitted_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))?;

        match row {
            Some(row) => {
                let status: String = row
                    .try_get("status")
                    .map_err(|e| QueueError::Backend(e.to_string()))?;
                let retries: i64 = row.try_get("retries").unwrap_or(0);
                Ok(parse_status(&status, retries as u32))
            }
            None => Err(QueueError::NotFound),
        }
    }

    async fn get_job(&self, submitted_by: &str, id: Uuid) -> Result<JobEntry, QueueError> {
        let row = sqlx::query(
            "SELECT id, submitted_by, job_type, payload, priority, status, created_at, run_at,
                    retries, progress, last_error, result
             FROM fraud_scan_jobs
             WHERE id = ? AND submitted_by = ?",
        )
        .bind(id.to_string())
        .bind(submitted_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))?
        .ok_or(QueueError::NotFound)?;

        let status: String = row
            .try_get("status")
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        let retries: i64 = row.try_get("retries").unwrap_or(0);
        let result: Option<Value> = row
            .try_get::<Option<String>, _>("result")
            .ok()
            .flatten()
            .and_then(|s| serde_json::from_str(&s).ok());

        let mut entry = Self::row_to_entry(&row)?;
        entry.status = parse_status(&status, retries as u32);
        entry.result = result;
        Ok(entry)
    }
}

impl SqliteQueueBackend {
    fn claimed_row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<JobEntry, QueueError> {
        let mut entry = Self::row_to_entry(row)?;
        entry.status = JobStatus::Running;
        Ok(entry)
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<JobEntry, QueueError> {
        let id_str: String = row
            .try_get("id")
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        let id = Uuid::parse_str(&id_str).map_err(|_| QueueError::Backend("Invalid UUID".into()))?;
        let submitted_by: String = row
            .try_get("submitted_by")
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        let job_type: String = row
            .try_get("job_type")
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        let payload_str: String = row
            .try_get("payload")
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        let payload: Value = serde_json::from_str(&payload_str)?;
        let priority: i64 = row.try_get("priority").unwrap_or(0);
        let retries: i64 = row.try_get("retries").unwrap_or(0);
        let progress: i64 = row.try_get("progress").unwrap_or(0);
        let last_error: Option<String> = row.try_get("last_error").ok().flatten();

        let run_at: NaiveDateTime = row
            .try_get("run_at")
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        let created_at: NaiveDateTime = row
            .try_get("created_at")
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        Ok(JobEntry {
            id,
            submitted_by,
            job_type,
            payload,
            priority: priority as i32,
            status: JobStatus::Pending,
            created_at: created_at.and_utc(),
            run_at: run_at.and_utc(),
            attempts: retries as u32,
            progress: progress.clamp(0, 100) as u8,
            last_error,
            result: None,
        })
    }
}

fn parse_status(status: &str, retries: u32) -> JobStatus {
    match status {
        "pending" => JobStatus::Pending,
        "running" => JobStatus::Running,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed(retries),
        "dead_letter" => JobStatus::DeadLetter,
        _ => JobStatus::Pending,
    }
}
