//! Consensus session and vote storage

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::StorageError;
use sentra_core::consensus::{Ballot, ConsensusOutcome, SessionStatus, VotingRule};

/// A persisted consensus session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSession {
    pub session_id: String,
    pub topic: String,
    pub description: String,
    pub voting_rule: VotingRule,
    pub threshold: f64,
    pub required_votes: i64,
    pub current_votes: i64,
    pub status: SessionStatus,
    pub created_by: String,
    pub started_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub result_confidence: Option<f64>,
}

/// Store over `consensus_sessions` and `consensus_votes`
#[derive(Debug, Clone)]
pub struct ConsensusStore {
    pool: SqlitePool,
}

impl ConsensusStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a new session and return its id
    #[allow(clippy::too_many_arguments)]
    pub async fn create_session(
        &self,
        topic: &str,
        description: &str,
        rule: VotingRule,
        threshold: f64,
        required_votes: i64,
        deadline_minutes: i64,
        created_by: &str,
    ) -> Result<String, StorageError> {
        let session_id = Uuid::new_v4().to_string();
        let deadline = Utc::now() + chrono::Duration::minutes(deadline_minutes);

        sqlx::query(
            "INSERT INTO consensus_sessions
             (session_id, topic, description, voting_rule, threshold, required_votes,
              created_by, deadline)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&session_id)
        .bind(topic)
        .bind(description)
        .bind(rule.as_str())
        .bind(threshold)
        .bind(required_votes)
        .bind(created_by)
        .bind(deadline)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(session_id)
    }

    /// Load a session by id
    pub async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ConsensusSession>, StorageError> {
        let row = sqlx::query(
            "SELECT session_id, topic, description, voting_rule, threshold, required_votes,
                    current_votes, status, created_by, started_at, deadline, closed_at,
                    result, result_confidence
             FROM consensus_sessions
             WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    /// Record (or replace) an agent's vote on an open session
    pub async fn record_vote(&self, session_id: &str, ballot: &Ballot) -> Result<(), StorageError> {
        let session = self
            .get_session(session_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("session {}", session_id)))?;

        if session.status != SessionStatus::Open {
            return Err(StorageError::Conflict(format!(
                "session {} is {}",
                session_id,
                session.status.as_str()
            )));
        }
        if let Some(deadline) = session.deadline {
            if Utc::now() > deadline {
                self.mark_expired(session_id).await?;
                return Err(StorageError::Conflict(format!(
                    "session {} deadline has passed",
                    session_id
                )));
            }
        }

        sqlx::query(
            "INSERT INTO consensus_votes
             (vote_id, session_id, agent_id, choice, confidence, reasoning, cast_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (session_id, agent_id) DO UPDATE SET
               choice = excluded.choice,
               confidence = excluded.confidence,
               reasoning = excluded.reasoning,
               cast_at = excluded.cast_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(session_id)
        .bind(&ballot.agent_id)
        .bind(ballot.choice.to_string())
        .bind(ballot.confidence)
        .bind(&ballot.reasoning)
        .bind(ballot.cast_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        sqlx::query(
            "UPDATE consensus_sessions
             SET current_votes = (SELECT COUNT(*) FROM consensus_votes WHERE session_id = ?)
             WHERE session_id = ?",
        )
        .bind(session_id)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }

    /// Load all ballots for a session in cast order
    pub async fn list_votes(&self, session_id: &str) -> Result<Vec<Ballot>, StorageError> {
        let rows = sqlx::query(
            "SELECT agent_id, choice, confidence, reasoning, cast_at
             FROM consensus_votes
             WHERE session_id = ?
             ORDER BY cast_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let choice: String = row
                    .try_get("choice")
                    .map_err(|e| StorageError::Query(e.to_string()))?;
                let cast_at: NaiveDateTime = row
                    .try_get("cast_at")
                    .map_err(|e| StorageError::Query(e.to_string()))?;
                Ok(Ballot {
                    agent_id: row
                        .try_get("agent_id")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    choice: serde_json::from_str(&choice)
                        .unwrap_or(serde_json::Value::String(choice)),
                    confidence: row
                        .try_get("confidence")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    reasoning: row
                        .try_get("reasoning")
                        .map_err(|e| StorageError::Query(e.to_string()))?,
                    cast_at: cast_at.and_utc(),
                })
            })
            .collect()
    }

    /// Store the tally outcome and close the session
    pub async fn store_outcome(
        &self,
        session_id: &str,
        outcome: &ConsensusOutcome,
    ) -> Result<(), StorageError> {
        let status = if outcome.reached {
            SessionStatus::Reached
        } else {
            SessionStatus::Failed
        };
        let result = outcome
            .decision
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "null".to_string());

        let updated = sqlx::query(
            "UPDATE consensus_sessions
             SET status = ?, result = ?, result_confidence = ?, closed_at = CURRENT_TIMESTAMP
             WHERE session_id = ? AND status = 'open'",
        )
        .bind(status.as_str())
        .bind(result)
        .bind(outcome.confidence)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        if updated.rows_affected() == 0 {
            return Err(StorageError::Conflict(format!(
                "session {} is not open",
                session_id
            )));
        }
        Ok(())
    }

    /// Mark all open sessions past their deadline as expired; returns count
    pub async fn expire_overdue(&self) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "UPDATE consensus_sessions
             SET status = 'expired', closed_at = CURRENT_TIMESTAMP
             WHERE status = 'open' AND deadline IS NOT NULL AND deadline < ?",
        )
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn mark_expired(&self, session_id: &str) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE consensus_sessions
             SET status = 'expired', closed_at = CURRENT_TIMESTAMP
             WHERE session_id = ? AND status = 'open'",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<ConsensusSession, StorageError> {
        let rule: String = row
            .try_get("voting_rule")
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let status: String = row
            .try_get("status")
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let started_at: NaiveDateTime = row
            .try_get("started_at")
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let deadline: Option<NaiveDateTime> = row
            .try_get("deadline")
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let closed_at: Option<NaiveDateTime> = row
            .try_get("closed_at")
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let result: Option<String> = row
            .try_get("result")
            .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(ConsensusSession {
            session_id: row
                .try_get("session_id")
                .map_err(|e| StorageError::Query(e.to_string()))?,
            topic: row
                .try_get("topic")
                .map_err(|e| StorageError::Query(e.to_string()))?,
            description: row
                .try_get("description")
                .map_err(|e| StorageError::Query(e.to_string()))?,
            voting_rule: VotingRule::parse(&rule)
                .map_err(|e| StorageError::Serialization(e.to_string()))?,
            threshold: row
                .try_get("threshold")
                .map_err(|e| StorageError::Query(e.to_string()))?,
            required_votes: row
                .try_get("required_votes")
                .map_err(|e| StorageError::Query(e.to_string()))?,
            current_votes: row
                .try_get("current_votes")
                .map_err(|e| StorageError::Query(e.to_string()))?,
            status: SessionStatus::parse(&status),
            created_by: row
                .try_get("created_by")
                .map_err(|e| StorageError::Query(e.to_string()))?,
            started_at: started_at.and_utc(),
            deadline: deadline.map(|t| t.and_utc()),
            closed_at: closed_at.map(|t| t.and_utc()),
            result: result.and_then(|r| serde_json::from_str(&r).ok()),
            result_confidence: row.try_get("result_confidence").ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_session_and_vote_round_trip() {
        let store = SqliteStore::new("sqlite::memory:").await.unwrap();
        let consensus = ConsensusStore::new(store.pool().clone());

        let id = consensus
            .create_session(
                "flag txn-42?",
                "guardian raised a velocity alert",
                VotingRule::Majority,
                0.5,
                3,
                60,
                "ops",
            )
            .await
            .unwrap();

        let session = consensus.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Open);
        assert_eq!(session.voting_rule, VotingRule::Majority);
        assert_eq!(session.current_votes, 0);

        consensus
            .record_vote(&id, &Ballot::new("guardian", json!("flag"), 0.9, "velocity hit"))
            .await
            .unwrap();
        consensus
            .record_vote(&id, &Ballot::new("assessor", json!("clear"), 0.6, "within band"))
            .await
            .unwrap();
        // Re-vote replaces, count stays at 2
        consensus
            .record_vote(&id, &Ballot::new("assessor", json!("flag"), 0.7, "changed mind"))
            .await
            .unwrap();

        let session = consensus.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.current_votes, 2);

        let votes = consensus.list_votes(&id).await.unwrap();
        assert_eq!(votes.len(), 2);
        let assessor = votes.iter().find(|b| b.agent_id == "assessor").unwrap();
        assert_eq!(assessor.choice, json!("flag"));

        let outcome = sentra_core::consensus::tally(VotingRule::Majority, &votes, 0.5);
        assert!(outcome.reached);
        consensus.store_outcome(&id, &outcome).await.unwrap();

        let session = consensus.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Reached);
        assert_eq!(session.result, Some(json!("flag")));

        // Closed sessions reject votes
        let err = consensus
            .record_vote(&id, &Ballot::new("late", json!("flag"), 0.5, ""))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_expiry() {
        let store = SqliteStore::new("sqlite::memory:").await.unwrap();
        let consensus = ConsensusStore::new(store.pool().clone());

        // Deadline in the past
        let id = consensus
            .create_session("stale", "", VotingRule::Unanimous, 0.5, 2, -5, "ops")
            .await
            .unwrap();

        let expired = consensus.expire_overdue().await.unwrap();
        assert_eq!(expired, 1);

        let session = consensus.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Expired);
    }
}
