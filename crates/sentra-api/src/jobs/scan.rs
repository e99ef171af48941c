//! Batch fraud scan job
//!
//! Selects transactions matching the requested filters, runs every enabled
//! detection rule over them, persists the resulting alerts, and reports
//! progress back to the queue row while it works.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use sentra_core::scan::{self, FraudAlert, RiskLevel, ScanRule};
use sentra_persist::{AlertStore, ConfigStore, ScanFilters, TransactionStore};
use sentra_queue::job::BackoffStrategy;
use sentra_queue::{Job, JobResult, QueueBackend};

/// Configuration key holding the active rule set
pub const RULES_CONFIG_KEY: &str = "scan.rules";

/// Progress is reported every this many transactions
const PROGRESS_INTERVAL: usize = 100;

/// Payload for a batch scan job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJobPayload {
    #[serde(default)]
    pub scan_type: String,
    #[serde(default)]
    pub filters: ScanFilters,
    /// Upper bound on transactions scanned in one batch
    #[serde(default = "default_batch_limit")]
    pub max_transactions: i64,
    pub submitted_by: String,
}

fn default_batch_limit() -> i64 {
    10_000
}

/// Result summary stored on the queue row when the scan finishes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJobSummary {
    pub job_id: Uuid,
    pub processed: usize,
    pub flagged: usize,
    pub alerts: usize,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct BatchScanJob {
    pub job_id: Uuid,
    pub payload: ScanJobPayload,
    pub transactions: TransactionStore,
    pub alerts: AlertStore,
    pub config: ConfigStore,
    pub queue: Arc<dyn QueueBackend>,
    pub metrics: Arc<sentra_llm::Metrics>,
}

impl BatchScanJob {
    /// Load the configured rule set, falling back to the stock rules
    async fn load_rules(&self) -> Vec<ScanRule> {
        match self.config.get(RULES_CONFIG_KEY).await {
            Ok(Some(value)) => match serde_json::from_value::<Vec<ScanRule>>(value) {
                Ok(rules) if !rules.is_empty() => rules,
                Ok(_) => scan::default_rules(),
                Err(e) => {
                    error!(error = %e, "Invalid {} entry, using defaults", RULES_CONFIG_KEY);
                    scan::default_rules()
                }
            },
            _ => scan::default_rules(),
        }
    }
}

#[async_trait]
impl Job for BatchScanJob {
    fn name(&self) -> &str {
        "batch_scan"
    }

    async fn execute(&mut self) -> JobResult {
        info!(
            job_id = %self.job_id,
            scan_type = %self.payload.scan_type,
            "Starting batch fraud scan"
        );

        let rules = self.load_rules().await;

        let transactions = match self
            .transactions
            .select(&self.payload.filters, self.payload.max_transactions)
            .await
        {
            Ok(txns) => txns,
            Err(e) => return JobResult::Retry(format!("transaction query failed: {}", e)),
        };

        let total = transactions.len();
        let mut processed = 0usize;
        let mut flagged = 0usize;
        let mut all_alerts: Vec<FraudAlert> = Vec::new();

        for txn in &transactions {
            let alerts = scan::scan_transaction(&rules, txn);
            if !alerts.is_empty() {
                flagged += 1;
                all_alerts.extend(alerts);
            }
            processed += 1;

            if processed % PROGRESS_INTERVAL == 0 {
                let progress = ((processed * 100) / total.max(1)) as u8;
                let _ = self.queue.set_progress(self.job_id, progress).await;
            }
        }

        if let Err(e) = self.alerts.record(&self.job_id.to_string(), &all_alerts).await {
            // Alerts are the scan's output; losing them means the run failed
            return JobResult::Retry(format!("alert persistence failed: {}", e));
        }

        let risk_score = scan::batch_risk_score(processed, &all_alerts);
        let summary = ScanJobSummary {
            job_id: self.job_id,
            processed,
            flagged,
            alerts: all_alerts.len(),
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            completed_at: Utc::now(),
        };

        self.metrics.record_scan(all_alerts.len() as u64);

        info!(
            job_id = %self.job_id,
            processed = processed,
            flagged = flagged,
            risk_score = risk_score,
            "Batch fraud scan complete"
        );

        match serde_json::to_value(&summary) {
            Ok(value) => JobResult::Success(Some(value)),
            Err(e) => JobResult::Fatal(format!("summary serialization failed: {}", e)),
        }
    }

    fn max_retries(&self) -> u32 {
        3
    }

    fn backoff_strategy(&self) -> BackoffStrategy {
        BackoffStrategy::Exponential {
            initial_secs: 2,
            multiplier: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_persist::{SqliteQueueBackend, SqliteStore};
    use sentra_queue::backend::EnqueueOptions;
    use sentra_core::scan::TransactionRecord;

    async fn run_scan_against(
        transactions: Vec<TransactionRecord>,
    ) -> (SqliteStore, ScanJobSummary) {
        let store = SqliteStore::new("sqlite::memory:").await.unwrap();
        let txn_store = TransactionStore::new(store.pool().clone());
        txn_store.import(&transactions).await.unwrap();

        let queue: Arc<dyn QueueBackend> =
            Arc::new(SqliteQueueBackend::new(store.pool().clone()));
        let job_id = queue
            .enqueue("ops", "batch_scan", serde_json::json!({}), EnqueueOptions::default())
            .await
            .unwrap();

        let mut job = BatchScanJob {
            job_id,
            payload: ScanJobPayload {
                scan_type: "all_transactions".to_string(),
                filters: ScanFilters::default(),
                max_transactions: 1000,
                submitted_by: "ops".to_string(),
            },
            transactions: txn_store,
            alerts: AlertStore::new(store.pool().clone()),
            config: ConfigStore::new(store.pool().clone()),
            queue,
            metrics: Arc::new(sentra_llm::Metrics::new()),
        };

        let result = job.execute().await;
        let JobResult::Success(Some(value)) = result else {
            panic!("scan did not succeed");
        };
        let summary: ScanJobSummary = serde_json::from_value(value).unwrap();
        (store, summary)
    }

    fn txn(id: &str, amount: f64, kind: &str) -> TransactionRecord {
        TransactionRecord {
            id: id.to_string(),
            amount,
            currency: "USD".to_string(),
            from_account: "a".to_string(),
            to_account: "b".to_string(),
            kind: kind.to_string(),
        }
    }

    #[tokio::test]
    async fn scan_flags_and_persists_alerts() {
        let (store, summary) = run_scan_against(vec![
            txn("clean", 100.0, "domestic"),
            txn("big", 25_000.0, "domestic"),
            txn("intl", 8_000.0, "international"),
        ])
        .await;

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.flagged, 2);
        assert!(summary.alerts >= 2);
        assert!(summary.risk_score > 0.0);

        let alerts = AlertStore::new(store.pool().clone());
        let recorded = alerts.recent(50, None).await.unwrap();
        assert_eq!(recorded.len(), summary.alerts);
        assert!(recorded
            .iter()
            .any(|a| a.transaction_id == "big" && a.rule_id == "rule-large-amount"));
    }

    #[tokio::test]
    async fn empty_batch_completes_with_zero_risk() {
        let (_store, summary) = run_scan_against(vec![]).await;
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.flagged, 0);
        assert_eq!(summary.risk_score, 0.0);
        assert_eq!(summary.risk_level, RiskLevel::Low);
    }
}
