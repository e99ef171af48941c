//! Decision analysis result storage

use chrono::NaiveDateTime;
use sqlx::{Row, SqlitePool};

use crate::StorageError;
use sentra_core::decision::DecisionAnalysis;

/// Store over the `decision_analyses` table. The full analysis is kept as
/// a JSON document; problem/method columns exist for listing queries.
#[derive(Debug, Clone)]
pub struct AnalysisStore {
    pool: SqlitePool,
}

/// Listing entry for analysis history
#[derive(Debug, Clone, serde::Serialize)]
pub struct AnalysisSummary {
    pub analysis_id: String,
    pub problem: String,
    pub method: String,
    pub requested_by: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl AnalysisStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a completed analysis
    pub async fn insert(
        &self,
        analysis: &DecisionAnalysis,
        requested_by: &str,
    ) -> Result<(), StorageError> {
        let result = serde_json::to_string(analysis)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        sqlx::query(
            "INSERT INTO decision_analyses (analysis_id, problem, method, result, requested_by)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(analysis.analysis_id.to_string())
        .bind(&analysis.problem)
        .bind(analysis.method.as_str())
        .bind(result)
        .bind(requested_by)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }

    /// Load a stored analysis by id
    pub async fn get(&self, analysis_id: &str) -> Result<Option<DecisionAnalysis>, StorageError> {
        let row = sqlx::query("SELECT result FROM decision_analyses WHERE analysis_id = ?")
            .bind(analysis_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let result: String = row
                    .try_get("result")
                    .map_err(|e| StorageError::Query(e.to_string()))?;
                let analysis = serde_json::from_str(&result)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(analysis))
            }
            None => Ok(None),
        }
    }

    /// Recent analysis history, newest first
    pub async fn recent(&self, limit: i64) -> Result<Vec<AnalysisSummary>, StorageError> {
        let rows = sqlx::query(
            "SELECT analysis_id, problem, method, requested_by, created_at
             FROM decision_analyses
             ORDER BY created_at DESC, analysis_id
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let created_at: NaiveDateTime = row
                    .try_get("created_at")
                    .map_err(|e| StorageError::Query(e.to_string()))?;
                Ok(AnalysisSummary {
                    analysis_id: row
                        .try_get("analysis_id")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    problem: row
                        .try_get("problem")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    method: row
                        .try_get("method")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    requested_by: row
                        .try_get("requested_by")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    created_at: created_at.and_utc(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteStore;
    use sentra_core::decision::{analyze, Alternative, Criterion, CriterionKind, McdaConfig, McdaMethod};
    use std::collections::HashMap;

    fn sample_analysis() -> DecisionAnalysis {
        let criteria = vec![Criterion {
            id: "risk".into(),
            name: "Risk".into(),
            kind: CriterionKind::Cost,
            weight: 1.0,
        }];
        let alternatives = vec![
            Alternative {
                id: "hold".into(),
                name: "Hold".into(),
                scores: HashMap::from([("risk".to_string(), 0.2)]),
            },
            Alternative {
                id: "release".into(),
                name: "Release".into(),
                scores: HashMap::from([("risk".to_string(), 0.7)]),
            },
        ];
        analyze(
            "hold or release the payment",
            &alternatives,
            &criteria,
            McdaMethod::WeightedSum,
            &McdaConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_get_recent() {
        let store = SqliteStore::new("sqlite::memory:").await.unwrap();
        let analyses = AnalysisStore::new(store.pool().clone());

        let analysis = sample_analysis();
        analyses.insert(&analysis, "analyst-1").await.unwrap();

        let loaded = analyses
            .get(&analysis.analysis_id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.analysis_id, analysis.analysis_id);
        assert_eq!(loaded.ranking, analysis.ranking);
        assert_eq!(loaded.recommended.as_deref(), Some("hold"));

        let history = analyses.recent(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].method, "weighted_sum");
        assert_eq!(history[0].requested_by, "analyst-1");

        assert!(analyses.get("missing").await.unwrap().is_none());
    }
}
