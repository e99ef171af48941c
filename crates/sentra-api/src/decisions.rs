//! MCDA decision analysis endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::routes::default_identity;
use crate::state::AppState;
use sentra_core::decision::{
    analyze, Alternative, Criterion, DecisionAnalysis, McdaConfig, McdaMethod,
};
use sentra_llm::LlmRequest;

/// MCDA analysis request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AnalysisRequest {
    /// Description of the decision problem
    pub problem: String,
    #[schema(value_type = Vec<Object>)]
    pub alternatives: Vec<Alternative>,
    #[schema(value_type = Vec<Object>)]
    pub criteria: Vec<Criterion>,
    /// weighted_sum, weighted_product, topsis, electre, promethee, ahp, vikor
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub config: Option<McdaConfig>,
    /// Ask the configured LLM for a narrative rationale
    #[serde(default)]
    pub include_rationale: bool,
    #[serde(default = "default_identity")]
    pub requested_by: String,
}

fn default_method() -> String {
    "weighted_sum".to_string()
}

/// MCDA analysis response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AnalysisResponse {
    #[schema(value_type = Object)]
    pub analysis: DecisionAnalysis,
    pub rationale: Option<String>,
}

/// Run an MCDA analysis, persist it, and return the ranking
#[utoipa::path(
    post,
    path = "/api/v1/decision/mcda",
    request_body = AnalysisRequest,
    responses(
        (status = 200, description = "Analysis complete", body = AnalysisResponse),
        (status = 422, description = "Invalid model input")
    )
)]
pub async fn run_analysis(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> ApiResult<Json<AnalysisResponse>> {
    let method = McdaMethod::parse(&req.method)?;
    let config = req.config.unwrap_or_default();

    let analysis = analyze(&req.problem, &req.alternatives, &req.criteria, method, &config)?;

    state.analyses().insert(&analysis, &req.requested_by).await?;
    state.metrics().record_analysis();

    let rationale = if req.include_rationale {
        Some(generate_rationale(&state, &analysis).await?)
    } else {
        None
    };

    Ok(Json(AnalysisResponse { analysis, rationale }))
}

async fn generate_rationale(
    state: &AppState,
    analysis: &DecisionAnalysis,
) -> Result<String, ApiError> {
    let ranking = analysis
        .ranking
        .iter()
        .enumerate()
        .map(|(i, id)| {
            format!(
                "{}. {} (score {:.4})",
                i + 1,
                id,
                analysis.scores.get(id).copied().unwrap_or(0.0)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "A decision analysis for \"{}\" using the {} method produced this ranking:\n{}\n\
         Explain the recommendation in two short paragraphs for a compliance review log.",
        analysis.problem,
        analysis.method.as_str(),
        ranking
    );

    let llm = state.llm();
    let request = LlmRequest::with_role(
        "You are a compliance operations analyst writing decision rationales.",
        &prompt,
    );

    match llm.complete(request).await {
        Ok(response) => {
            state
                .metrics()
                .record_llm_call(response.tokens_used.unwrap_or(0) as u64, false);
            Ok(response.content)
        }
        Err(e) => {
            state.metrics().record_llm_call(0, true);
            Err(e.into())
        }
    }
}

/// Fetch a stored analysis
#[utoipa::path(
    get,
    path = "/api/v1/decision/analyses/{id}",
    params(
        ("id" = String, Path, description = "Analysis ID")
    ),
    responses(
        (status = 200, description = "Stored analysis", body = AnalysisResponse),
        (status = 404, description = "Analysis not found")
    )
)]
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> ApiResult<Json<AnalysisResponse>> {
    let analysis = state
        .analyses()
        .get(&analysis_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Analysis not found".to_string()))?;
    Ok(Json(AnalysisResponse {
        analysis,
        rationale: None,
    }))
}

/// Analysis history query
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    20
}

/// Analysis history response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AnalysisListResponse {
    #[schema(value_type = Vec<Object>)]
    pub analyses: Vec<sentra_persist::AnalysisSummary>,
}

/// List recent analyses
#[utoipa::path(
    get,
    path = "/api/v1/decision/analyses",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Recent analyses", body = AnalysisListResponse)
    )
)]
pub async fn list_analyses(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<AnalysisListResponse>> {
    let analyses = state.analyses().recent(query.limit.clamp(1, 200)).await?;
    Ok(Json(AnalysisListResponse { analyses }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/decision/mcda", post(run_analysis))
        .route("/api/v1/decision/analyses", get(list_analyses))
        .route("/api/v1/decision/analyses/{id}", get(get_analysis))
}
