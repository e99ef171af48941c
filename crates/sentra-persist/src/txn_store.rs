//! Transaction storage for batch scans

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::StorageError;
use sentra_core::scan::TransactionRecord;

/// Filters applied when selecting transactions for a scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanFilters {
    pub amount_min: Option<f64>,
    pub amount_max: Option<f64>,
    pub currency: Option<String>,
    pub transaction_type: Option<String>,
}

/// Store over the `transactions` table
#[derive(Debug, Clone)]
pub struct TransactionStore {
    pool: SqlitePool,
}

impl TransactionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Bulk-import transactions; existing ids are replaced
    pub async fn import(&self, transactions: &[TransactionRecord]) -> Result<u64, StorageError> {
        let mut imported = 0;
        for txn in transactions {
            sqlx::query(
                "INSERT OR REPLACE INTO transactions
                 (transaction_id, amount, currency, from_account, to_account, transaction_type)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&txn.id)
            .bind(txn.amount)
            .bind(&txn.currency)
            .bind(&txn.from_account)
            .bind(&txn.to_account)
            .bind(&txn.kind)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
            imported += 1;
        }
        Ok(imported)
    }

    /// Select transactions matching the scan filters, oldest first
    pub async fn select(
        &self,
        filters: &ScanFilters,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, StorageError> {
        // Filter clauses are appended per present field; values are bound
        let mut query = String::from(
            "SELECT transaction_id, amount, currency, from_account, to_account, transaction_type
             FROM transactions WHERE 1=1",
        );
        if filters.amount_min.is_some() {
            query.push_str(" AND amount >= ?");
        }
        if filters.amount_max.is_some() {
            query.push_str(" AND amount <= ?");
        }
        if filters.currency.is_some() {
            query.push_str(" AND currency = ?");
        }
        if filters.transaction_type.is_some() {
            query.push_str(" AND transaction_type = ?");
        }
        query.push_str(" ORDER BY created_at ASC LIMIT ?");

        let mut q = sqlx::query(&query);
        if let Some(min) = filters.amount_min {
            q = q.bind(min);
        }
        if let Some(max) = filters.amount_max {
            q = q.bind(max);
        }
        if let Some(currency) = &filters.currency {
            q = q.bind(currency);
        }
        if let Some(kind) = &filters.transaction_type {
            q = q.bind(kind);
        }
        q = q.bind(limit);

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                Ok(TransactionRecord {
                    id: row
                        .try_get("transaction_id")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    amount: row
                        .try_get("amount")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    currency: row
                        .try_get("currency")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    from_account: row
                        .try_get("from_account")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    to_account: row
                        .try_get("to_account")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    kind: row
                        .try_get("transaction_type")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                })
            })
            .collect()
    }

    /// Count all stored transactions
    pub async fn count(&self) -> Result<i64, StorageError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteStore;

    fn txn(id: &str, amount: f64, currency: &str, kind: &str) -> TransactionRecord {
        TransactionRecord {
            id: id.to_string(),
            amount,
            currency: currency.to_string(),
            from_account: "acct-a".to_string(),
            to_account: "acct-b".to_string(),
            kind: kind.to_string(),
        }
    }

    #[tokio::test]
    async fn test_import_and_filtered_select() {
        let store = SqliteStore::new("sqlite::memory:").await.unwrap();
        let txns = TransactionStore::new(store.pool().clone());

        let imported = txns
            .import(&[
                txn("t1", 500.0, "USD", "domestic"),
                txn("t2", 15_000.0, "USD", "domestic"),
                txn("t3", 7_500.0, "EUR", "international"),
            ])
            .await
            .unwrap();
        assert_eq!(imported, 3);
        assert_eq!(txns.count().await.unwrap(), 3);

        let big = txns
            .select(
                &ScanFilters {
                    amount_min: Some(1_000.0),
                    ..Default::default()
                },
                100,
            )
            .await
            .unwrap();
        assert_eq!(big.len(), 2);

        let eur = txns
            .select(
                &ScanFilters {
                    currency: Some("EUR".to_string()),
                    ..Default::default()
                },
                100,
            )
            .await
            .unwrap();
        assert_eq!(eur.len(), 1);
        assert_eq!(eur[0].id, "t3");

        // Re-import replaces rather than duplicating
        txns.import(&[txn("t1", 600.0, "USD", "domestic")]).await.unwrap();
        assert_eq!(txns.count().await.unwrap(), 3);
    }
}
