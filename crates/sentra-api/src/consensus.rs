//! Multi-agent consensus endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::routes::default_identity;
use crate::state::AppState;
use sentra_core::consensus::{tally, Ballot, ConsensusOutcome, SessionStatus, VotingRule};
use sentra_persist::ConsensusSession;

/// Session start request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct StartSessionRequest {
    pub topic: String,
    #[serde(default)]
    pub description: String,
    /// unanimous, majority, supermajority, weighted, ranked_choice, bayesian
    #[serde(default = "default_rule")]
    pub voting_rule: String,
    /// Agreement threshold override for majority-family rules
    pub threshold: Option<f64>,
    /// Number of expected participants
    pub required_votes: i64,
    #[serde(default = "default_deadline_minutes")]
    pub deadline_minutes: i64,
    #[serde(default = "default_identity")]
    pub requested_by: String,
}

fn default_rule() -> String {
    "majority".to_string()
}

fn default_deadline_minutes() -> i64 {
    60
}

/// Session state response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SessionResponse {
    #[schema(value_type = Object)]
    pub session: ConsensusSession,
    /// Current tallies over ballots cast so far
    #[schema(value_type = Vec<Object>)]
    pub tallies: Vec<(String, f64)>,
}

/// Start a consensus session
#[utoipa::path(
    post,
    path = "/api/v1/consensus/sessions",
    request_body = StartSessionRequest,
    responses(
        (status = 200, description = "Session opened", body = SessionResponse),
        (status = 422, description = "Invalid configuration")
    )
)]
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> ApiResult<Json<SessionResponse>> {
    if req.topic.trim().is_empty() {
        return Err(ApiError::Validation("topic is required".to_string()));
    }
    if req.required_votes < 1 {
        return Err(ApiError::Validation(
            "required_votes must be at least 1".to_string(),
        ));
    }

    let rule = VotingRule::parse(&req.voting_rule)?;
    let threshold = req.threshold.unwrap_or_else(|| rule.default_threshold());
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ApiError::Validation(
            "threshold must be within [0, 1]".to_string(),
        ));
    }

    let store = state.consensus();
    let session_id = store
        .create_session(
            &req.topic,
            &req.description,
            rule,
            threshold,
            req.required_votes,
            req.deadline_minutes,
            &req.requested_by,
        )
        .await?;

    state.metrics().record_consensus_session();

    let session = store
        .get_session(&session_id)
        .await?
        .ok_or_else(|| ApiError::Internal("session vanished after insert".to_string()))?;

    Ok(Json(SessionResponse {
        session,
        tallies: Vec::new(),
    }))
}

/// Get session state and live tallies
#[utoipa::path(
    get,
    path = "/api/v1/consensus/sessions/{id}",
    params(
        ("id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session state", body = SessionResponse),
        (status = 404, description = "Session not found")
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let store = state.consensus();
    let session = store
        .get_session(&session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    let votes = store.list_votes(&session_id).await?;
    let outcome = tally(session.voting_rule, &votes, session.threshold);

    Ok(Json(SessionResponse {
        session,
        tallies: outcome.tallies,
    }))
}

/// Vote request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CastVoteRequest {
    pub agent_id: String,
    /// Choice value; shape depends on the session's voting rule
    #[schema(value_type = Object)]
    pub choice: serde_json::Value,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

fn default_confidence() -> f64 {
    0.5
}

/// Cast (or replace) a ballot on an open session
#[utoipa::path(
    post,
    path = "/api/v1/consensus/sessions/{id}/votes",
    params(
        ("id" = String, Path, description = "Session ID")
    ),
    request_body = CastVoteRequest,
    responses(
        (status = 200, description = "Ballot recorded", body = SessionResponse),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session is not open")
    )
)]
pub async fn cast_vote(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<CastVoteRequest>,
) -> ApiResult<Json<SessionResponse>> {
    if req.agent_id.trim().is_empty() {
        return Err(ApiError::Validation("agent_id is required".to_string()));
    }

    let store = state.consensus();
    let ballot = Ballot::new(&req.agent_id, req.choice, req.confidence, &req.reasoning);
    store.record_vote(&session_id, &ballot).await?;

    let session = store
        .get_session(&session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;
    let votes = store.list_votes(&session_id).await?;
    let outcome = tally(session.voting_rule, &votes, session.threshold);

    Ok(Json(SessionResponse {
        session,
        tallies: outcome.tallies,
    }))
}

/// Finalization response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OutcomeResponse {
    pub session_id: String,
    #[schema(value_type = Object)]
    pub outcome: ConsensusOutcome,
    pub status: String,
}

/// Tally ballots, store the outcome, and close the session
#[utoipa::path(
    post,
    path = "/api/v1/consensus/sessions/{id}/finalize",
    params(
        ("id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session finalized", body = OutcomeResponse),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session already closed")
    )
)]
pub async fn finalize_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<OutcomeResponse>> {
    let store = state.consensus();
    let session = store
        .get_session(&session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    if session.status != SessionStatus::Open {
        return Err(ApiError::Conflict(format!(
            "session is already {}",
            session.status.as_str()
        )));
    }

    let votes = store.list_votes(&session_id).await?;
    let outcome = tally(session.voting_rule, &votes, session.threshold);
    store.store_outcome(&session_id, &outcome).await?;

    let status = if outcome.reached {
        SessionStatus::Reached
    } else {
        SessionStatus::Failed
    };

    Ok(Json(OutcomeResponse {
        session_id,
        outcome,
        status: status.as_str().to_string(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/consensus/sessions", post(start_session))
        .route("/api/v1/consensus/sessions/{id}", get(get_session))
        .route("/api/v1/consensus/sessions/{id}/votes", post(cast_vote))
        .route(
            "/api/v1/consensus/sessions/{id}/finalize",
            post(finalize_session),
        )
}
