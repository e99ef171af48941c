//! System configuration key/value store

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::StorageError;

/// One configuration entry
#[derive(Debug, Clone, Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_by: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Store over the `system_configuration` table
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pool: SqlitePool,
}

impl ConfigStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert a configuration value
    pub async fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
        updated_by: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO system_configuration (key, value, updated_by, updated_at)
             VALUES (?, ?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT (key) DO UPDATE SET
               value = excluded.value,
               updated_by = excluded.updated_by,
               updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value.to_string())
        .bind(updated_by)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }

    /// Get a configuration value
    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let row = sqlx::query("SELECT value FROM system_configuration WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let value: String = row
                    .try_get("value")
                    .map_err(|e| StorageError::Query(e.to_string()))?;
                Ok(serde_json::from_str(&value).ok())
            }
            None => Ok(None),
        }
    }

    /// List entries, optionally filtered by key prefix
    pub async fn list(&self, prefix: &str) -> Result<Vec<ConfigEntry>, StorageError> {
        let rows = sqlx::query(
            "SELECT key, value, updated_by, updated_at
             FROM system_configuration
             WHERE key LIKE ?
             ORDER BY key",
        )
        .bind(format!("{}%", prefix))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let value: String = row
                    .try_get("value")
                    .map_err(|e| StorageError::Query(e.to_string()))?;
                let updated_at: NaiveDateTime = row
                    .try_get("updated_at")
                    .map_err(|e| StorageError::Query(e.to_string()))?;
                Ok(ConfigEntry {
                    key: row
                        .try_get("key")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    value: serde_json::from_str(&value).unwrap_or(serde_json::Value::Null),
                    updated_by: row
                        .try_get("updated_by")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    updated_at: updated_at.and_utc(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_list() {
        let store = SqliteStore::new("sqlite::memory:").await.unwrap();
        let config = ConfigStore::new(store.pool().clone());

        config
            .set("scan.default_time_range_days", &json!(7), "ops")
            .await
            .unwrap();
        config
            .set("scan.max_batch_size", &json!(5000), "ops")
            .await
            .unwrap();
        config
            .set("consensus.default_rule", &json!("majority"), "ops")
            .await
            .unwrap();

        assert_eq!(
            config.get("scan.max_batch_size").await.unwrap(),
            Some(json!(5000))
        );
        assert_eq!(config.get("missing").await.unwrap(), None);

        // Upsert replaces
        config
            .set("scan.max_batch_size", &json!(10_000), "admin")
            .await
            .unwrap();
        assert_eq!(
            config.get("scan.max_batch_size").await.unwrap(),
            Some(json!(10_000))
        );

        let scan_entries = config.list("scan.").await.unwrap();
        assert_eq!(scan_entries.len(), 2);
        assert!(scan_entries.iter().all(|e| e.key.starts_with("scan.")));

        let all = config.list("").await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
