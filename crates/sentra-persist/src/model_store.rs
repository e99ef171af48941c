//! Fraud detection model storage

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::StorageError;

/// A fraud detection model row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionModel {
    pub model_id: String,
    pub model_name: String,
    pub model_type: String,
    pub version: String,
    /// training, active, archived, failed
    pub status: String,
    pub description: String,
    pub accuracy: Option<f64>,
    pub precision_score: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub training_data_size: Option<i64>,
    pub training_parameters: serde_json::Value,
    pub is_active: bool,
    pub created_by: String,
    pub last_trained_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Performance metrics reported after a training/validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision_score: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub training_data_size: i64,
}

/// Store over the `fraud_detection_models` table
#[derive(Debug, Clone)]
pub struct ModelStore {
    pool: SqlitePool,
}

impl ModelStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a model row in `training` status and return its id
    pub async fn create_training(
        &self,
        model_name: &str,
        model_type: &str,
        description: &str,
        training_parameters: &serde_json::Value,
        created_by: &str,
    ) -> Result<String, StorageError> {
        let model_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO fraud_detection_models
             (model_id, model_name, model_type, version, status, description,
              training_parameters, created_by)
             VALUES (?, ?, ?, '1.0', 'training', ?, ?, ?)",
        )
        .bind(&model_id)
        .bind(model_name)
        .bind(model_type)
        .bind(description)
        .bind(training_parameters.to_string())
        .bind(created_by)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(model_id)
    }

    /// List all models, newest first
    pub async fn list(&self) -> Result<Vec<DetectionModel>, StorageError> {
        let rows = sqlx::query(
            "SELECT model_id, model_name, model_type, version, status, description,
                    accuracy, precision_score, recall, f1_score, training_data_size,
                    training_parameters, is_active, created_by, last_trained_at, created_at
             FROM fraud_detection_models
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.iter().map(Self::row_to_model).collect()
    }

    /// Load one model by id
    pub async fn get(&self, model_id: &str) -> Result<Option<DetectionModel>, StorageError> {
        let row = sqlx::query(
            "SELECT model_id, model_name, model_type, version, status, description,
                    accuracy, precision_score, recall, f1_score, training_data_size,
                    training_parameters, is_active, created_by, last_trained_at, created_at
             FROM fraud_detection_models
             WHERE model_id = ?",
        )
        .bind(model_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        row.as_ref().map(Self::row_to_model).transpose()
    }

    /// Record metrics after training completes and mark the model active
    pub async fn record_metrics(
        &self,
        model_id: &str,
        metrics: &ModelMetrics,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE fraud_detection_models
             SET accuracy = ?, precision_score = ?, recall = ?, f1_score = ?,
                 training_data_size = ?, status = 'active', is_active = 1,
                 last_trained_at = CURRENT_TIMESTAMP
             WHERE model_id = ?",
        )
        .bind(metrics.accuracy)
        .bind(metrics.precision_score)
        .bind(metrics.recall)
        .bind(metrics.f1_score)
        .bind(metrics.training_data_size)
        .bind(model_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("model {}", model_id)));
        }
        Ok(())
    }

    /// Deactivate a model (archived, no longer used for scans)
    pub async fn deactivate(&self, model_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE fraud_detection_models
             SET is_active = 0, status = 'archived'
             WHERE model_id = ?",
        )
        .bind(model_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_model(row: &sqlx::sqlite::SqliteRow) -> Result<DetectionModel, StorageError> {
        let training_parameters: String = row
            .try_get("training_parameters")
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let last_trained_at: Option<NaiveDateTime> = row
            .try_get("last_trained_at")
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let created_at: NaiveDateTime = row
            .try_get("created_at")
            .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(DetectionModel {
            model_id: row.try_get("model_id").map_err(|e| StorageError::Query(e.to_string()))?,
            model_name: row.try_get("model_name").map_err(|e| StorageError::Query(e.to_string()))?,
            model_type: row.try_get("model_type").map_err(|e| StorageError::Query(e.to_string()))?,
            version: row.try_get("version").map_err(|e| StorageError::Query(e.to_string()))?,
            status: row.try_get("status").map_err(|e| StorageError::Query(e.to_string()))?,
            description: row.try_get("description").map_err(|e| StorageError::Query(e.to_string()))?,
            accuracy: row.try_get("accuracy").ok(),
            precision_score: row.try_get("precision_score").ok(),
            recall: row.try_get("recall").ok(),
            f1_score: row.try_get("f1_score").ok(),
            training_data_size: row.try_get("training_data_size").ok(),
            training_parameters: serde_json::from_str(&training_parameters)
                .unwrap_or_else(|_| serde_json::json!({})),
            is_active: row.try_get::<i64, _>("is_active").map(|v| v != 0).unwrap_or(false),
            created_by: row.try_get("created_by").map_err(|e| StorageError::Query(e.to_string()))?,
            last_trained_at: last_trained_at.map(|t| t.and_utc()),
            created_at: created_at.and_utc(),
        })
    }
}
