//! Conversation mediation endpoints
//!
//! Conversations live in memory behind the app state; the mediator
//! operates on them directly.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use sentra_core::mediation::{
    Conversation, MessageKind, Participant, Resolution, ResolutionStrategy, StanceConflict,
};

/// Conversation start request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct StartConversationRequest {
    pub topic: String,
    #[serde(default)]
    pub objective: String,
    #[schema(value_type = Vec<Object>)]
    pub participants: Vec<Participant>,
}

/// Conversation state response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ConversationResponse {
    #[schema(value_type = Object)]
    pub conversation: Conversation,
}

/// Start a mediated conversation
#[utoipa::path(
    post,
    path = "/api/v1/conversations",
    request_body = StartConversationRequest,
    responses(
        (status = 200, description = "Conversation started", body = ConversationResponse),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn start_conversation(
    State(state): State<AppState>,
    Json(req): Json<StartConversationRequest>,
) -> ApiResult<Json<ConversationResponse>> {
    if req.topic.trim().is_empty() {
        return Err(ApiError::Validation("topic is required".to_string()));
    }
    if req.participants.len() < 2 {
        return Err(ApiError::Validation(
            "a conversation needs at least two participants".to_string(),
        ));
    }

    let conversation = Conversation::new(&req.topic, &req.objective, req.participants);
    let id = conversation.id;

    let conversations = state.conversations();
    conversations.write().await.insert(id, conversation.clone());

    tracing::info!(conversation_id = %id, topic = %req.topic, "conversation started");

    Ok(Json(ConversationResponse { conversation }))
}

/// Get a conversation transcript and state
#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}",
    params(
        ("id" = Uuid, Path, description = "Conversation ID")
    ),
    responses(
        (status = 200, description = "Conversation transcript", body = ConversationResponse),
        (status = 404, description = "Conversation not found")
    )
)]
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ConversationResponse>> {
    let conversations = state.conversations();
    let guard = conversations.read().await;
    let conversation = guard
        .get(&id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))?;
    Ok(Json(ConversationResponse { conversation }))
}

/// Message post request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PostMessageRequest {
    pub sender: String,
    #[serde(default = "default_recipient")]
    pub recipient: String,
    /// request, response, notification, stance
    #[schema(value_type = String)]
    pub kind: MessageKind,
    #[schema(value_type = Object)]
    pub content: serde_json::Value,
}

fn default_recipient() -> String {
    "all".to_string()
}

/// Append a message to a conversation
#[utoipa::path(
    post,
    path = "/api/v1/conversations/{id}/messages",
    params(
        ("id" = Uuid, Path, description = "Conversation ID")
    ),
    request_body = PostMessageRequest,
    responses(
        (status = 200, description = "Message appended", body = ConversationResponse),
        (status = 404, description = "Conversation not found"),
        (status = 409, description = "Conversation closed")
    )
)]
pub async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> ApiResult<Json<ConversationResponse>> {
    let conversations = state.conversations();
    let mut guard = conversations.write().await;
    let conversation = guard
        .get_mut(&id)
        .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))?;

    conversation.append_message(&req.sender, &req.recipient, req.kind, req.content)?;

    Ok(Json(ConversationResponse {
        conversation: conversation.clone(),
    }))
}

/// Conflict listing response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ConflictsResponse {
    #[schema(value_type = Vec<Object>)]
    pub conflicts: Vec<StanceConflict>,
}

/// List detected stance conflicts
#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}/conflicts",
    params(
        ("id" = Uuid, Path, description = "Conversation ID")
    ),
    responses(
        (status = 200, description = "Detected conflicts", body = ConflictsResponse),
        (status = 404, description = "Conversation not found")
    )
)]
pub async fn list_conflicts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ConflictsResponse>> {
    let conversations = state.conversations();
    let guard = conversations.read().await;
    let conversation = guard
        .get(&id)
        .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))?;
    Ok(Json(ConflictsResponse {
        conflicts: conversation.detect_conflicts(),
    }))
}

/// Conflict resolution request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ResolveRequest {
    pub subject: String,
    /// majority_vote, weighted_vote, expert_arbitration, compromise
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Required for expert_arbitration
    pub arbiter: Option<String>,
}

fn default_strategy() -> String {
    "majority_vote".to_string()
}

/// Resolution response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ResolutionResponse {
    #[schema(value_type = Object)]
    pub resolution: Resolution,
    #[schema(value_type = Object)]
    pub conversation: Conversation,
}

/// Resolve a stance conflict with the chosen strategy
#[utoipa::path(
    post,
    path = "/api/v1/conversations/{id}/resolve",
    params(
        ("id" = Uuid, Path, description = "Conversation ID")
    ),
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "Resolution applied", body = ResolutionResponse),
        (status = 404, description = "Conversation or conflict not found"),
        (status = 409, description = "Strategy could not be applied")
    )
)]
pub async fn resolve_conflict(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolveRequest>,
) -> ApiResult<Json<ResolutionResponse>> {
    let strategy = ResolutionStrategy::parse(&req.strategy)?;

    let conversations = state.conversations();
    let mut guard = conversations.write().await;
    let conversation = guard
        .get_mut(&id)
        .ok_or_else(|| ApiError::NotFound("Conversation not found".to_string()))?;

    let resolution = conversation.resolve(&req.subject, strategy, req.arbiter.as_deref())?;

    Ok(Json(ResolutionResponse {
        resolution,
        conversation: conversation.clone(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/conversations", post(start_conversation))
        .route("/api/v1/conversations/{id}", get(get_conversation))
        .route("/api/v1/conversations/{id}/messages", post(post_message))
        .route("/api/v1/conversations/{id}/conflicts", get(list_conflicts))
        .route("/api/v1/conversations/{id}/resolve", post(resolve_conflict))
}
