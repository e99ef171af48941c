//! # Sentra Persist
//!
//! SQLite persistence for the Sentra backend: detection models, consensus
//! sessions and votes, decision analyses, system configuration, and the
//! durable scan-job queue.

pub mod alert_store;
pub mod analysis_store;
pub mod config_store;
pub mod consensus_store;
pub mod model_store;
pub mod queue;
pub mod sqlite;
pub mod txn_store;

pub use alert_store::{AlertRecord, AlertStore};
pub use analysis_store::{AnalysisStore, AnalysisSummary};
pub use config_store::{ConfigEntry, ConfigStore};
pub use consensus_store::{ConsensusSession, ConsensusStore};
pub use model_store::{DetectionModel, ModelMetrics, ModelStore};
pub use queue::SqliteQueueBackend;
pub use sqlite::{SqliteConfig, SqliteStore};
pub use txn_store::{ScanFilters, TransactionStore};

/// Storage error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
