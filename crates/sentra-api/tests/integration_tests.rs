use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

use sentra_api::{routes::api_router, state::AppState};
use sentra_llm::{Metrics, MockProvider};
use sentra_persist::{SqliteQueueBackend, SqliteStore};
use sentra_queue::{QueueBackend, WorkerConfig, WorkerPool};

async fn setup_state() -> AppState {
    let metrics = Arc::new(Metrics::new());

    // In-memory DB shared between the store and the queue
    let db = Arc::new(SqliteStore::new("sqlite::memory:").await.unwrap());

    let queue_backend: Arc<dyn QueueBackend> =
        Arc::new(SqliteQueueBackend::new(db.pool().clone()));
    let worker_pool = WorkerPool::new_with_arc(queue_backend, WorkerConfig::default());

    AppState::new(
        metrics,
        db,
        Arc::new(worker_pool),
        Arc::new(MockProvider::smart()),
    )
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_endpoints_respond() {
    let state = setup_state().await;
    let router = api_router(state);

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health/detailed")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["components"]["database"]["status"], "healthy");
}

#[tokio::test]
async fn model_train_and_performance_flow() {
    let state = setup_state().await;
    let router = api_router(state);

    // Train
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/fraud/models/train",
            serde_json::json!({
                "model_name": "velocity-v1",
                "model_type": "gradient_boosting",
                "description": "velocity rules",
                "requested_by": "analyst-1"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let model_id = body["model_id"].as_str().unwrap().to_string();
    assert_eq!(body["status"], "training");

    // List
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/fraud/models")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["models"].as_array().unwrap().len(), 1);

    // Performance for the new model (metrics still empty)
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/fraud/models/{}/performance", model_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["model_id"], model_id.as_str());
    assert!(body["accuracy"].is_null());

    // Missing model 404s with the error envelope
    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/v1/fraud/models/missing/performance")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn scan_enqueue_and_poll_flow() {
    let state = setup_state().await;
    let router = api_router(state.clone());

    // Import transactions
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/fraud/transactions/import",
            serde_json::json!({
                "transactions": [
                    {"id": "t1", "amount": 25000.0, "currency": "USD",
                     "from_account": "a", "to_account": "b", "kind": "domestic"},
                    {"id": "t2", "amount": 50.0, "currency": "USD",
                     "from_account": "a", "to_account": "c", "kind": "domestic"}
                ]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["imported"], 2);

    // Enqueue scan
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/fraud/scan/batch",
            serde_json::json!({
                "scan_type": "all_transactions",
                "priority": 3,
                "requested_by": "ops"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "queued");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    // Poll: queued job is visible to its submitter
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/jobs/{}?requested_by=ops", job_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "pending");

    // Other identities cannot see the job
    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/jobs/{}?requested_by=someone-else", job_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mcda_analysis_over_http() {
    let state = setup_state().await;
    let router = api_router(state);

    let request = serde_json::json!({
        "problem": "select a detection model",
        "method": "topsis",
        "alternatives": [
            {"id": "m1", "name": "Model 1", "scores": {"accuracy": 0.92, "cost": 20.0}},
            {"id": "m2", "name": "Model 2", "scores": {"accuracy": 0.80, "cost": 5.0}},
            {"id": "m3", "name": "Model 3", "scores": {"accuracy": 0.55, "cost": 60.0}}
        ],
        "criteria": [
            {"id": "accuracy", "name": "Accuracy", "kind": "benefit", "weight": 0.7},
            {"id": "cost", "name": "Cost", "kind": "cost", "weight": 0.3}
        ],
        "include_rationale": true,
        "requested_by": "analyst-1"
    });

    let response = router
        .clone()
        .oneshot(post_json("/api/v1/decision/mcda", request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    let ranking = body["analysis"]["ranking"].as_array().unwrap();
    assert_eq!(ranking.len(), 3);
    // m3 is dominated (worst accuracy, worst cost) and must rank last
    assert_eq!(ranking[2], "m3");
    assert!(body["rationale"].as_str().unwrap().contains("Decision rationale"));

    // Stored analysis is retrievable
    let analysis_id = body["analysis"]["analysis_id"].as_str().unwrap().to_string();
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/decision/analyses/{}", analysis_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Unknown method is a validation error
    let response = router
        .oneshot(post_json(
            "/api/v1/decision/mcda",
            serde_json::json!({
                "problem": "x",
                "method": "coin_flip",
                "alternatives": [{"id": "a", "name": "a", "scores": {}}],
                "criteria": [{"id": "c", "name": "c", "weight": 1.0}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn consensus_lifecycle_over_http() {
    let state = setup_state().await;
    let router = api_router(state);

    // Start
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/consensus/sessions",
            serde_json::json!({
                "topic": "flag txn-77?",
                "voting_rule": "majority",
                "required_votes": 3,
                "requested_by": "ops"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let session_id = body["session"]["session_id"].as_str().unwrap().to_string();
    assert_eq!(body["session"]["status"], "open");

    // Votes
    for (agent, choice, confidence) in [
        ("guardian", "flag", 0.9),
        ("assessor", "flag", 0.7),
        ("auditor", "clear", 0.8),
    ] {
        let response = router
            .clone()
            .oneshot(post_json(
                &format!("/api/v1/consensus/sessions/{}/votes", session_id),
                serde_json::json!({
                    "agent_id": agent,
                    "choice": choice,
                    "confidence": confidence
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // State shows all ballots
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/consensus/sessions/{}", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["session"]["current_votes"], 3);

    // Finalize
    let response = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/consensus/sessions/{}/finalize", session_id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "reached");
    assert_eq!(body["outcome"]["decision"], "flag");

    // Double finalize conflicts
    let response = router
        .oneshot(post_json(
            &format!("/api/v1/consensus/sessions/{}/finalize", session_id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn mediation_conflict_flow_over_http() {
    let state = setup_state().await;
    let router = api_router(state);

    // Start conversation
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/conversations",
            serde_json::json!({
                "topic": "txn-9 review",
                "objective": "agree on disposition",
                "participants": [
                    {"agent_id": "guardian", "expertise_weight": 2.0},
                    {"agent_id": "assessor"}
                ]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let convo_id = body["conversation"]["id"].as_str().unwrap().to_string();

    // Contradictory stances
    for (agent, position) in [("guardian", "flag"), ("assessor", "clear")] {
        let response = router
            .clone()
            .oneshot(post_json(
                &format!("/api/v1/conversations/{}/messages", convo_id),
                serde_json::json!({
                    "sender": agent,
                    "kind": "stance",
                    "content": {"subject": "txn-9", "position": position}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Conflict is visible
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/conversations/{}/conflicts", convo_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["conflicts"].as_array().unwrap().len(), 1);

    // Weighted resolution: guardian's expertise carries it
    let response = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/conversations/{}/resolve", convo_id),
            serde_json::json!({
                "subject": "txn-9",
                "strategy": "weighted_vote"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["resolution"]["resolved"], true);
    assert_eq!(body["resolution"]["outcome"], "flag");
    assert_eq!(body["conversation"]["state"], "consensus_reached");

    // Outsiders cannot post
    let response = router
        .oneshot(post_json(
            &format!("/api/v1/conversations/{}/messages", convo_id),
            serde_json::json!({
                "sender": "intruder",
                "kind": "request",
                "content": {}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn translate_endpoint_converts_protocols() {
    let state = setup_state().await;
    let router = api_router(state);

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/translate",
            serde_json::json!({
                "message": {
                    "jsonrpc": "2.0",
                    "method": "fraud.scan",
                    "params": {"amount": 9000},
                    "id": 4
                },
                "target_protocol": "rest"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["from"], "json_rpc");
    assert_eq!(body["output"]["path"], "/fraud/scan");
    assert_eq!(body["output"]["body"]["amount"], 9000);

    // Unrecognizable source protocol is rejected
    let response = router
        .oneshot(post_json(
            "/api/v1/translate",
            serde_json::json!({
                "message": {"hello": "world"},
                "target_protocol": "rest"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn config_round_trip_over_http() {
    let state = setup_state().await;
    let router = api_router(state);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/v1/config/scan.max_batch_size")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({"value": 5000, "requested_by": "admin"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/v1/config?prefix=scan.")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["value"], 5000);
    assert_eq!(entries[0]["updated_by"], "admin");
}

#[tokio::test]
async fn metrics_reflect_activity() {
    let state = setup_state().await;
    let router = api_router(state.clone());

    // One translation bumps the counter
    let _ = router
        .clone()
        .oneshot(post_json(
            "/api/v1/translate",
            serde_json::json!({
                "message": {"jsonrpc": "2.0", "method": "ping", "id": 1},
                "target_protocol": "websocket"
            }),
        ))
        .await
        .unwrap();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["translations"], 1);

    // Prometheus rendering includes the counter
    let response = router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("sentra_translations_total 1"));
}
