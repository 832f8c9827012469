//! REST API Server for the forward relay bot
//!
//! Exposes the bot's command surface over HTTP: forwarding messages,
//! analyze and clear commands, and health.

use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::commentary::CommentaryService;
use crate::models::{AnalyzeOutcome, IngestOutcome, UserId};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ForwardRequest {
    pub user_id: UserId,
    pub text: String,
    pub message_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserRequest {
    pub user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CommentRequest {
    pub user_id: UserId,
    pub text: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<CommentaryService>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "tracked_contexts": state.service.contexts().tracked_users(),
        "rate_limited_users": state.service.rate_limiter().tracked_users(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Command Endpoints
/// =============================

async fn start(State(state): State<ApiState>) -> Json<ApiResponse> {
    Json(ApiResponse::success(serde_json::json!({
        "reply": state.service.welcome_text(),
    })))
}

async fn forward_message(
    State(state): State<ApiState>,
    Json(req): Json<ForwardRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(
                "Forwarded message has no text. Only text content can be analyzed.".into(),
            )),
        );
    }

    let outcome = state
        .service
        .on_incoming_text(req.user_id, &req.text, req.message_id);

    let reply = match &outcome {
        IngestOutcome::Added { count, max } => format!(
            "✓ Message added to context ({}/{}). Use /analyze to generate a comment.",
            count, max
        ),
        IngestOutcome::TooShort => "Message is too short to keep in context.".to_string(),
    };

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "outcome": outcome,
            "reply": reply,
        }))),
    )
}

async fn analyze(
    State(state): State<ApiState>,
    Json(req): Json<UserRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!("Analyze request from user {}", req.user_id);
    let outcome = state.service.on_analyze_request(req.user_id).await;
    outcome_response(outcome)
}

async fn comment(
    State(state): State<ApiState>,
    Json(req): Json<CommentRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let outcome = state.service.on_comment_request(req.user_id, &req.text).await;
    outcome_response(outcome)
}

async fn clear(
    State(state): State<ApiState>,
    Json(req): Json<UserRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let existed = state.service.on_clear_request(req.user_id);

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "cleared": existed,
            "reply": "Context cleared. You can start collecting a new one.",
        }))),
    )
}

fn outcome_response(outcome: AnalyzeOutcome) -> (StatusCode, Json<ApiResponse>) {
    match outcome {
        AnalyzeOutcome::RateLimited { wait_seconds } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::error(format!(
                "Too many requests. Please wait {} seconds.",
                wait_seconds
            ))),
        ),
        AnalyzeOutcome::NoContext => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "outcome": outcome,
                "reply": "You have no accumulated context. Forward messages to build one.",
            }))),
        ),
        AnalyzeOutcome::Comment { ref text, .. } => {
            let reply = text.clone();
            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "outcome": outcome,
                    "reply": reply,
                }))),
            )
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(service: Arc<CommentaryService>) -> Router {
    let state = ApiState { service };

    Router::new()
        .route("/health", get(health))
        .route("/api/start", get(start))
        .route("/api/messages", post(forward_message))
        .route("/api/analyze", post(analyze))
        .route("/api/comment", post(comment))
        .route("/api/clear", post(clear))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    service: Arc<CommentaryService>,
    port: u16,
    shutdown: tokio_util::sync::CancellationToken,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(service);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
