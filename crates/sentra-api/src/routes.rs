//! API routes for Sentra endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::jobs::ScanJobPayload;
use crate::state::AppState;
use sentra_persist::{AlertRecord, ConfigEntry, DetectionModel, ScanFilters};
use sentra_queue::backend::EnqueueOptions;

/// Health check response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<ComponentHealth>,
}

/// Component health status
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ComponentHealth {
    pub database: ComponentStatus,
    pub queue: ComponentStatus,
}

/// Individual component status
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ComponentStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Basic health check handler (lightweight)
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Basic health check", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        components: None,
    })
}

/// Detailed health check with database connectivity
#[utoipa::path(
    get,
    path = "/health/detailed",
    responses(
        (status = 200, description = "Detailed health check with component status", body = HealthResponse)
    )
)]
pub async fn health_detailed(State(state): State<AppState>) -> Json<HealthResponse> {
    let start = std::time::Instant::now();

    let db_healthy = state.db().is_healthy().await;
    let db_latency = start.elapsed().as_millis() as u64;

    // Queue shares the database pool
    let queue_status = ComponentStatus {
        status: if db_healthy { "healthy" } else { "unhealthy" }.to_string(),
        latency_ms: Some(0),
    };

    let db_status = ComponentStatus {
        status: if db_healthy { "healthy" } else { "unhealthy" }.to_string(),
        latency_ms: Some(db_latency),
    };

    let overall_status = if db_healthy { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: overall_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        components: Some(ComponentHealth {
            database: db_status,
            queue: queue_status,
        }),
    })
}

/// Detection model listing response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ModelsResponse {
    #[schema(value_type = Vec<Object>)]
    pub models: Vec<DetectionModel>,
}

/// List fraud detection models
#[utoipa::path(
    get,
    path = "/api/v1/fraud/models",
    responses(
        (status = 200, description = "All registered detection models", body = ModelsResponse)
    )
)]
pub async fn list_models(State(state): State<AppState>) -> ApiResult<Json<ModelsResponse>> {
    let models = state.models().list().await?;
    Ok(Json(ModelsResponse { models }))
}

/// Model training request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct TrainModelRequest {
    pub model_name: String,
    pub model_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub training_parameters: serde_json::Value,
    #[serde(default = "default_identity")]
    pub requested_by: String,
}

pub(crate) fn default_identity() -> String {
    "system".to_string()
}

/// Model training response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TrainModelResponse {
    pub model_id: String,
    pub model_name: String,
    pub model_type: String,
    pub status: String,
    pub message: String,
}

/// Create a detection model training job
#[utoipa::path(
    post,
    path = "/api/v1/fraud/models/train",
    request_body = TrainModelRequest,
    responses(
        (status = 200, description = "Model created in training status", body = TrainModelResponse),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn train_model(
    State(state): State<AppState>,
    Json(req): Json<TrainModelRequest>,
) -> ApiResult<Json<TrainModelResponse>> {
    if req.model_name.trim().is_empty() || req.model_type.trim().is_empty() {
        return Err(ApiError::Validation(
            "model_name and model_type are required".to_string(),
        ));
    }

    let model_id = state
        .models()
        .create_training(
            &req.model_name,
            &req.model_type,
            &req.description,
            &req.training_parameters,
            &req.requested_by,
        )
        .await?;

    Ok(Json(TrainModelResponse {
        model_id,
        model_name: req.model_name,
        model_type: req.model_type,
        status: "training".to_string(),
        message: "Model training job created successfully".to_string(),
    }))
}

/// Model performance response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ModelPerformanceResponse {
    pub model_id: String,
    pub model_name: String,
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub training_data_size: Option<i64>,
    pub last_trained_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Get performance metrics for one model
#[utoipa::path(
    get,
    path = "/api/v1/fraud/models/{id}/performance",
    params(
        ("id" = String, Path, description = "Model ID")
    ),
    responses(
        (status = 200, description = "Model performance metrics", body = ModelPerformanceResponse),
        (status = 404, description = "Model not found")
    )
)]
pub async fn model_performance(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> ApiResult<Json<ModelPerformanceResponse>> {
    let model = state
        .models()
        .get(&model_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Model not found".to_string()))?;

    Ok(Json(ModelPerformanceResponse {
        model_id: model.model_id,
        model_name: model.model_name,
        accuracy: model.accuracy,
        precision: model.precision_score,
        recall: model.recall,
        f1_score: model.f1_score,
        training_data_size: model.training_data_size,
        last_trained_at: model.last_trained_at,
    }))
}

/// Transaction import request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ImportTransactionsRequest {
    #[schema(value_type = Vec<Object>)]
    pub transactions: Vec<sentra_core::scan::TransactionRecord>,
}

/// Transaction import response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ImportTransactionsResponse {
    pub imported: u64,
    pub total: i64,
}

/// Bulk-import transactions for scanning
#[utoipa::path(
    post,
    path = "/api/v1/fraud/transactions/import",
    request_body = ImportTransactionsRequest,
    responses(
        (status = 200, description = "Transactions imported", body = ImportTransactionsResponse)
    )
)]
pub async fn import_transactions(
    State(state): State<AppState>,
    Json(req): Json<ImportTransactionsRequest>,
) -> ApiResult<Json<ImportTransactionsResponse>> {
    if req.transactions.is_empty() {
        return Err(ApiError::Validation("no transactions supplied".to_string()));
    }
    let store = state.transactions();
    let imported = store.import(&req.transactions).await?;
    let total = store.count().await?;
    Ok(Json(ImportTransactionsResponse { imported, total }))
}

/// Batch scan request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BatchScanRequest {
    #[serde(default = "default_scan_type")]
    pub scan_type: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub filters: ScanFilters,
    /// Higher priority scans are claimed first
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_identity")]
    pub requested_by: String,
}

fn default_scan_type() -> String {
    "all_transactions".to_string()
}

/// Batch scan response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BatchScanResponse {
    pub job_id: Uuid,
    pub scan_type: String,
    pub status: String,
    pub message: String,
}

/// Enqueue a batch fraud scan
#[utoipa::path(
    post,
    path = "/api/v1/fraud/scan/batch",
    request_body = BatchScanRequest,
    responses(
        (status = 200, description = "Scan job queued", body = BatchScanResponse)
    )
)]
pub async fn batch_scan(
    State(state): State<AppState>,
    Json(req): Json<BatchScanRequest>,
) -> ApiResult<Json<BatchScanResponse>> {
    let payload = ScanJobPayload {
        scan_type: req.scan_type.clone(),
        filters: req.filters,
        max_transactions: 10_000,
        submitted_by: req.requested_by.clone(),
    };

    let backend = &state.queue().backend;
    let job_id = backend
        .enqueue(
            &req.requested_by,
            "batch_scan",
            serde_json::to_value(&payload)?,
            EnqueueOptions {
                priority: req.priority,
                delay_secs: None,
            },
        )
        .await?;

    Ok(Json(BatchScanResponse {
        job_id,
        scan_type: req.scan_type,
        status: "queued".to_string(),
        message: "Batch scan job created successfully".to_string(),
    }))
}

/// Alert listing query parameters
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct AlertsQuery {
    #[serde(default = "default_alert_limit")]
    pub limit: i64,
    pub severity: Option<String>,
}

fn default_alert_limit() -> i64 {
    50
}

/// Alert listing response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AlertsResponse {
    #[schema(value_type = Vec<Object>)]
    pub alerts: Vec<AlertRecord>,
}

/// List recent fraud alerts
#[utoipa::path(
    get,
    path = "/api/v1/fraud/alerts",
    params(AlertsQuery),
    responses(
        (status = 200, description = "Recent fraud alerts", body = AlertsResponse)
    )
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> ApiResult<Json<AlertsResponse>> {
    let alerts = state
        .alerts()
        .recent(query.limit.clamp(1, 500), query.severity.as_deref())
        .await?;
    Ok(Json(AlertsResponse { alerts }))
}

/// Job status query parameters
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct JobQuery {
    #[serde(default = "default_identity")]
    pub requested_by: String,
}

/// Job status response (for polling after batch scan)
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: String,
    pub progress: u8,
    #[schema(value_type = Option<Object>)]
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub queued_at: chrono::DateTime<chrono::Utc>,
    pub attempts: u32,
}

/// Get job status / result handler
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID returned from batch scan"),
        JobQuery
    ),
    responses(
        (status = 200, description = "Job status and result", body = JobStatusResponse),
        (status = 404, description = "Job not found")
    )
)]
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<JobQuery>,
) -> ApiResult<Json<JobStatusResponse>> {
    let backend = &state.queue().backend;

    let job = backend
        .get_job(&query.requested_by, job_id)
        .await
        .map_err(|_| ApiError::NotFound(format!("Job {} not found", job_id)))?;

    Ok(Json(JobStatusResponse {
        job_id,
        status: job.status.as_str().to_string(),
        progress: job.progress,
        result: job.result,
        error: job.last_error,
        queued_at: job.created_at,
        attempts: job.attempts,
    }))
}

/// Configuration listing response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ConfigResponse {
    #[schema(value_type = Vec<Object>)]
    pub entries: Vec<ConfigEntry>,
}

/// Configuration listing query
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ConfigQuery {
    #[serde(default)]
    pub prefix: String,
}

/// List system configuration entries
#[utoipa::path(
    get,
    path = "/api/v1/config",
    params(ConfigQuery),
    responses(
        (status = 200, description = "Configuration entries", body = ConfigResponse)
    )
)]
pub async fn list_config(
    State(state): State<AppState>,
    Query(query): Query<ConfigQuery>,
) -> ApiResult<Json<ConfigResponse>> {
    let entries = state.config().list(&query.prefix).await?;
    Ok(Json(ConfigResponse { entries }))
}

/// Configuration update request
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SetConfigRequest {
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
    #[serde(default = "default_identity")]
    pub requested_by: String,
}

/// Upsert one configuration entry
#[utoipa::path(
    put,
    path = "/api/v1/config/{key}",
    params(
        ("key" = String, Path, description = "Configuration key")
    ),
    request_body = SetConfigRequest,
    responses(
        (status = 200, description = "Configuration updated")
    )
)]
pub async fn set_config(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SetConfigRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .config()
        .set(&key, &req.value, &req.requested_by)
        .await?;
    Ok(Json(serde_json::json!({ "key": key, "status": "updated" })))
}

/// Metrics snapshot response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MetricsResponse {
    pub llm_calls: u64,
    pub llm_errors: u64,
    pub tokens_used: u64,
    pub analyses: u64,
    pub consensus_sessions: u64,
    pub scans_completed: u64,
    pub alerts_raised: u64,
    pub translations: u64,
    pub llm_error_rate: f64,
}

/// Get metrics handler (JSON snapshot)
#[utoipa::path(
    get,
    path = "/api/v1/metrics",
    responses(
        (status = 200, description = "Current system metrics", body = MetricsResponse)
    )
)]
pub async fn get_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let snapshot = state.metrics().snapshot();

    Json(MetricsResponse {
        llm_calls: snapshot.llm_calls,
        llm_errors: snapshot.llm_errors,
        tokens_used: snapshot.tokens_used,
        analyses: snapshot.analyses,
        consensus_sessions: snapshot.consensus_sessions,
        scans_completed: snapshot.scans_completed,
        alerts_raised: snapshot.alerts_raised,
        translations: snapshot.translations,
        llm_error_rate: state.metrics().llm_error_rate(),
    })
}

/// Prometheus metrics handler
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Prometheus formatted metrics", body = String)
    )
)]
pub async fn get_prometheus_metrics(State(state): State<AppState>) -> String {
    state.metrics().snapshot().to_prometheus()
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        health_detailed,
        list_models,
        train_model,
        model_performance,
        import_transactions,
        batch_scan,
        list_alerts,
        get_job_status,
        list_config,
        set_config,
        get_metrics,
        get_prometheus_metrics,
        crate::decisions::run_analysis,
        crate::decisions::get_analysis,
        crate::decisions::list_analyses,
        crate::consensus::start_session,
        crate::consensus::get_session,
        crate::consensus::cast_vote,
        crate::consensus::finalize_session,
        crate::mediation::start_conversation,
        crate::mediation::get_conversation,
        crate::mediation::post_message,
        crate::mediation::list_conflicts,
        crate::mediation::resolve_conflict,
        crate::translate::translate_message,
    ),
    components(
        schemas(
            HealthResponse, ComponentHealth, ComponentStatus,
            ModelsResponse, TrainModelRequest, TrainModelResponse, ModelPerformanceResponse,
            ImportTransactionsRequest, ImportTransactionsResponse,
            BatchScanRequest, BatchScanResponse, AlertsResponse,
            JobStatusResponse,
            ConfigResponse, SetConfigRequest,
            MetricsResponse,
            crate::decisions::AnalysisRequest, crate::decisions::AnalysisResponse,
            crate::decisions::AnalysisListResponse,
            crate::consensus::StartSessionRequest, crate::consensus::SessionResponse,
            crate::consensus::CastVoteRequest, crate::consensus::OutcomeResponse,
            crate::mediation::StartConversationRequest, crate::mediation::ConversationResponse,
            crate::mediation::PostMessageRequest, crate::mediation::ConflictsResponse,
            crate::mediation::ResolveRequest, crate::mediation::ResolutionResponse,
            crate::translate::TranslateRequest, crate::translate::TranslateResponse,
        )
    )
)]
pub struct ApiDoc;

/// Build the API router
pub fn api_router(state: AppState) -> Router {
    use utoipa_swagger_ui::SwaggerUi;

    Router::new()
        // Documentation endpoints
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public endpoints
        .route("/health", get(health))
        .route("/health/detailed", get(health_detailed))
        // Fraud model endpoints
        .route("/api/v1/fraud/models", get(list_models))
        .route("/api/v1/fraud/models/train", post(train_model))
        .route(
            "/api/v1/fraud/models/{id}/performance",
            get(model_performance),
        )
        // Scan endpoints
        .route(
            "/api/v1/fraud/transactions/import",
            post(import_transactions),
        )
        .route("/api/v1/fraud/scan/batch", post(batch_scan))
        .route("/api/v1/fraud/alerts", get(list_alerts))
        // Job polling endpoint
        .route("/api/v1/jobs/{id}", get(get_job_status))
        // Decision / consensus / mediation / translation endpoints
        .merge(crate::decisions::router())
        .merge(crate::consensus::router())
        .merge(crate::mediation::router())
        .merge(crate::translate::router())
        // Configuration endpoints
        .route("/api/v1/config", get(list_config))
        .route("/api/v1/config/{key}", put(set_config))
        // Metrics endpoints
        .route("/api/v1/metrics", get(get_metrics))
        .route("/metrics", get(get_prometheus_metrics))
        // State
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response() {
        let health = HealthResponse {
            status: "healthy".to_string(),
            version: "0.4.0".to_string(),
            timestamp: chrono::Utc::now(),
            components: None,
        };
        assert_eq!(health.status, "healthy");
    }
}
