//! Fraud alert storage

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::StorageError;
use sentra_core::scan::FraudAlert;

/// A persisted fraud alert row
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub alert_id: String,
    pub transaction_id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub severity: String,
    pub status: String,
    pub message: String,
    pub job_id: Option<String>,
    pub detected_at: chrono::DateTime<chrono::Utc>,
}

/// Store over the `fraud_alerts` table
#[derive(Debug, Clone)]
pub struct AlertStore {
    pool: SqlitePool,
}

impl AlertStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist the alerts produced by a scan job
    pub async fn record(&self, job_id: &str, alerts: &[FraudAlert]) -> Result<(), StorageError> {
        for alert in alerts {
            sqlx::query(
                "INSERT INTO fraud_alerts
                 (alert_id, transaction_id, rule_id, rule_name, severity, message, job_id)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&alert.transaction_id)
            .bind(&alert.rule_id)
            .bind(&alert.rule_name)
            .bind(alert.severity.as_str())
            .bind(&alert.message)
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        }
        Ok(())
    }

    /// Recent alerts, newest first, optionally filtered by severity
    pub async fn recent(
        &self,
        limit: i64,
        severity: Option<&str>,
    ) -> Result<Vec<AlertRecord>, StorageError> {
        let rows = match severity {
            Some(severity) => {
                sqlx::query(
                    "SELECT alert_id, transaction_id, rule_id, rule_name, severity, status,
                            message, job_id, detected_at
                     FROM fraud_alerts
                     WHERE severity = ?
                     ORDER BY detected_at DESC LIMIT ?",
                )
                .bind(severity)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT alert_id, transaction_id, rule_id, rule_name, severity, status,
                            message, job_id, detected_at
                     FROM fraud_alerts
                     ORDER BY detected_at DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let detected_at: NaiveDateTime = row
                    .try_get("detected_at")
                    .map_err(|e| StorageError::Query(e.to_string()))?;
                Ok(AlertRecord {
                    alert_id: row
                        .try_get("alert_id")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    transaction_id: row
                        .try_get("transaction_id")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    rule_id: row
                        .try_get("rule_id")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    rule_name: row
                        .try_get("rule_name")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    severity: row
                        .try_get("severity")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    status: row
                        .try_get("status")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    message: row
                        .try_get("message")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    job_id: row.try_get("job_id").ok().flatten(),
                    detected_at: detected_at.and_utc(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteStore;
    use sentra_core::scan::AlertSeverity;

    #[tokio::test]
    async fn test_record_and_list() {
        let store = SqliteStore::new("sqlite::memory:").await.unwrap();
        let alerts = AlertStore::new(store.pool().clone());

        alerts
            .record(
                "job-1",
                &[
                    FraudAlert {
                        transaction_id: "t1".into(),
                        rule_id: "rule-large-amount".into(),
                        rule_name: "Large transaction amount".into(),
                        severity: AlertSeverity::High,
                        message: "Transaction flagged by rule: Large transaction amount".into(),
                    },
                    FraudAlert {
                        transaction_id: "t2".into(),
                        rule_id: "rule-self-transfer".into(),
                        rule_name: "Same source and destination account".into(),
                        severity: AlertSeverity::Medium,
                        message: String::new(),
                    },
                ],
            )
            .await
            .unwrap();

        let all = alerts.recent(10, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|a| a.job_id.as_deref() == Some("job-1")));
        assert!(all.iter().all(|a| a.status == "active"));

        let high = alerts.recent(10, Some("high")).await.unwrap();
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].transaction_id, "t1");
    }
}
