//! Inter-agent message translation endpoint

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use sentra_core::translate::{self, WireProtocol};

/// Translation request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct TranslateRequest {
    /// The message to translate
    #[schema(value_type = Object)]
    pub message: serde_json::Value,
    /// Source protocol; sniffed from the message when omitted
    pub source_protocol: Option<String>,
    /// json_rpc, rest, websocket, graphql
    pub target_protocol: String,
}

/// Translation response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TranslateResponse {
    pub from: String,
    pub to: String,
    #[schema(value_type = Object)]
    pub output: serde_json::Value,
    pub warnings: Vec<String>,
}

/// Translate a message between agent wire protocols
#[utoipa::path(
    post,
    path = "/api/v1/translate",
    request_body = TranslateRequest,
    responses(
        (status = 200, description = "Translated message", body = TranslateResponse),
        (status = 422, description = "Unrecognized or malformed message")
    )
)]
pub async fn translate_message(
    State(state): State<AppState>,
    Json(req): Json<TranslateRequest>,
) -> ApiResult<Json<TranslateResponse>> {
    let target = WireProtocol::parse(&req.target_protocol).ok_or_else(|| {
        ApiError::Validation(format!("unknown target protocol: {}", req.target_protocol))
    })?;

    let translation = match &req.source_protocol {
        Some(source) => {
            let from = WireProtocol::parse(source).ok_or_else(|| {
                ApiError::Validation(format!("unknown source protocol: {}", source))
            })?;
            translate::translate_from(&req.message, from, target)?
        }
        None => translate::translate(&req.message, target)?,
    };

    state.metrics().record_translation();

    Ok(Json(TranslateResponse {
        from: translation.from.as_str().to_string(),
        to: translation.to.as_str().to_string(),
        output: translation.output,
        warnings: translation.warnings,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/translate", post(translate_message))
}
