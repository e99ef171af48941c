//! SQLite store: connection pool, pragmas, and schema bootstrap

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use crate::StorageError;

/// SQLite configuration options
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database URL (e.g. "sqlite:sentra.db?mode=rwc" or "sqlite::memory:")
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Enable WAL journal mode for better concurrency
    pub wal_mode: bool,
    /// Enable foreign key enforcement
    pub foreign_keys: bool,
    /// Busy timeout in seconds
    pub busy_timeout_secs: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:sentra.db?mode=rwc".to_string(),
            max_connections: 5,
            wal_mode: true,
            foreign_keys: true,
            busy_timeout_secs: 30,
        }
    }
}

impl SqliteConfig {
    /// Config for an in-memory database (testing)
    pub fn memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            wal_mode: false,
            foreign_keys: true,
            busy_timeout_secs: 5,
        }
    }
}

/// The Sentra relational store
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect with default config for the given URL
    pub async fn new(url: &str) -> Result<Self, StorageError> {
        let config = if url.contains(":memory:") {
            SqliteConfig {
                url: url.to_string(),
                ..SqliteConfig::memory()
            }
        } else {
            SqliteConfig {
                url: url.to_string(),
                ..Default::default()
            }
        };
        Self::new_with_config(config).await
    }

    /// Connect with full configuration and bootstrap the schema
    pub async fn new_with_config(config: SqliteConfig) -> Result<Self, StorageError> {
        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if config.foreign_keys {
            options = options.pragma("foreign_keys", "ON");
        }
        options = options.pragma("busy_timeout", config.busy_timeout_secs.to_string());
        if config.wal_mode {
            options = options.pragma("journal_mode", "WAL");
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        info!(url = %config.url, wal = config.wal_mode, "Connected to SQLite");

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check if the store is reachable
    pub async fn is_healthy(&self) -> bool {
        !self.pool.is_closed()
            && sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Internal(format!("Schema bootstrap failed: {}", e)))?;
        Ok(())
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS fraud_detection_models (
    model_id TEXT PRIMARY KEY,
    model_name TEXT NOT NULL,
    model_type TEXT NOT NULL,
    version TEXT NOT NULL DEFAULT '1.0',
    status TEXT NOT NULL DEFAULT 'training',
    description TEXT NOT NULL DEFAULT '',
    accuracy REAL,
    precision_score REAL,
    recall REAL,
    f1_score REAL,
    training_data_size INTEGER,
    training_parameters TEXT NOT NULL DEFAULT '{}',
    is_active INTEGER NOT NULL DEFAULT 0,
    created_by TEXT NOT NULL DEFAULT 'system',
    last_trained_at DATETIME,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS fraud_scan_jobs (
    id TEXT PRIMARY KEY,
    submitted_by TEXT NOT NULL,
    job_type TEXT NOT NULL,
    payload TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    progress INTEGER NOT NULL DEFAULT 0,
    retries INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    result TEXT,
    locked_at DATETIME,
    locked_by TEXT,
    run_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_scan_jobs_claim
    ON fraud_scan_jobs (status, priority DESC, created_at ASC);

CREATE TABLE IF NOT EXISTS consensus_sessions (
    session_id TEXT PRIMARY KEY,
    topic TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    voting_rule TEXT NOT NULL,
    threshold REAL NOT NULL DEFAULT 0.5,
    required_votes INTEGER NOT NULL,
    current_votes INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'open',
    created_by TEXT NOT NULL DEFAULT 'system',
    started_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    deadline DATETIME,
    closed_at DATETIME,
    result TEXT,
    result_confidence REAL
);

CREATE TABLE IF NOT EXISTS consensus_votes (
    vote_id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES consensus_sessions(session_id),
    agent_id TEXT NOT NULL,
    choice TEXT NOT NULL,
    confidence REAL NOT NULL,
    reasoning TEXT NOT NULL DEFAULT '',
    cast_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (session_id, agent_id)
);

CREATE TABLE IF NOT EXISTS decision_analyses (
    analysis_id TEXT PRIMARY KEY,
    problem TEXT NOT NULL,
    method TEXT NOT NULL,
    result TEXT NOT NULL,
    requested_by TEXT NOT NULL DEFAULT 'system',
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS system_configuration (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_by TEXT NOT NULL DEFAULT 'system',
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS transactions (
    transaction_id TEXT PRIMARY KEY,
    amount REAL NOT NULL,
    currency TEXT NOT NULL DEFAULT 'USD',
    from_account TEXT NOT NULL,
    to_account TEXT NOT NULL,
    transaction_type TEXT NOT NULL DEFAULT 'domestic',
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_transactions_amount ON transactions (amount);

CREATE TABLE IF NOT EXISTS fraud_alerts (
    alert_id TEXT PRIMARY KEY,
    transaction_id TEXT NOT NULL,
    rule_id TEXT NOT NULL,
    rule_name TEXT NOT NULL DEFAULT '',
    severity TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    message TEXT NOT NULL DEFAULT '',
    job_id TEXT,
    detected_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_fraud_alerts_detected ON fraud_alerts (detected_at DESC);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_and_bootstrap() {
        let store = SqliteStore::new("sqlite::memory:").await.unwrap();
        assert!(store.is_healthy().await);

        // Bootstrap is idempotent
        store.init_schema().await.unwrap();

        // All tables exist
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN (
                'fraud_detection_models', 'fraud_scan_jobs', 'consensus_sessions',
                'consensus_votes', 'decision_analyses', 'system_configuration',
                'transactions', 'fraud_alerts')",
        )
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert_eq!(row.0, 8);
    }
}
