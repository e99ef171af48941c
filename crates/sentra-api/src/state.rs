//! Application State
//!
//! Centralizes access to the store, queue, LLM provider, and the
//! in-memory mediation conversations.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use sentra_core::mediation::Conversation;
use sentra_llm::{LlmProvider, Metrics};
use sentra_persist::{
    AlertStore, AnalysisStore, ConfigStore, ConsensusStore, ModelStore, SqliteStore,
    TransactionStore,
};
use sentra_queue::{QueueBackend, WorkerPool};

/// Live mediation conversations, keyed by conversation id
pub type ConversationMap = Arc<RwLock<HashMap<Uuid, Conversation>>>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    metrics: Arc<Metrics>,
    db: Arc<SqliteStore>,
    queue: Arc<WorkerPool<dyn QueueBackend>>,
    llm: Arc<dyn LlmProvider>,
    conversations: ConversationMap,
}

impl AppState {
    /// Create new application state
    pub fn new(
        metrics: Arc<Metrics>,
        db: Arc<SqliteStore>,
        queue: Arc<WorkerPool<dyn QueueBackend>>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            metrics,
            db,
            queue,
            llm,
            conversations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get metrics collector (cloned Arc for sharing)
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Get the relational store
    pub fn db(&self) -> Arc<SqliteStore> {
        self.db.clone()
    }

    /// Get queue worker pool (cloned Arc for sharing)
    pub fn queue(&self) -> Arc<WorkerPool<dyn QueueBackend>> {
        self.queue.clone()
    }

    /// Get the LLM provider
    pub fn llm(&self) -> Arc<dyn LlmProvider> {
        self.llm.clone()
    }

    /// Live mediation conversations
    pub fn conversations(&self) -> ConversationMap {
        self.conversations.clone()
    }

    /// Typed store over `fraud_detection_models`
    pub fn models(&self) -> ModelStore {
        ModelStore::new(self.db.pool().clone())
    }

    /// Typed store over `consensus_sessions` / `consensus_votes`
    pub fn consensus(&self) -> ConsensusStore {
        ConsensusStore::new(self.db.pool().clone())
    }

    /// Typed store over `decision_analyses`
    pub fn analyses(&self) -> AnalysisStore {
        AnalysisStore::new(self.db.pool().clone())
    }

    /// Typed store over `system_configuration`
    pub fn config(&self) -> ConfigStore {
        ConfigStore::new(self.db.pool().clone())
    }

    /// Typed store over `transactions`
    pub fn transactions(&self) -> TransactionStore {
        TransactionStore::new(self.db.pool().clone())
    }

    /// Typed store over `fraud_alerts`
    pub fn alerts(&self) -> AlertStore {
        AlertStore::new(self.db.pool().clone())
    }
}
