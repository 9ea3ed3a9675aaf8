//! REST API server for the finance chat assistant
//!
//! Exposes the dialogue engine and the explicit confirm step over HTTP.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::assistant::Assistant;
use crate::error::AssistantError;
use crate::models::ActionKind;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub user_id: Option<String>,
    pub action: ActionKind,
    pub data: serde_json::Value,
    pub confirmation_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub user_id: Option<String>,
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
    pub assistant: Arc<Assistant>,
}

/// =============================
/// Helpers: user id resolution
/// =============================

fn stable_uuid_from_string(input: &str) -> uuid::Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    uuid::Uuid::from_bytes(bytes)
}

/// UUIDs pass through; any other id maps to a stable UUID
pub fn parse_or_stable_uuid(value: Option<&str>, fallback_seed: &str) -> uuid::Uuid {
    match value {
        Some(v) if !v.trim().is_empty() => {
            uuid::Uuid::parse_str(v.trim()).unwrap_or_else(|_| stable_uuid_from_string(v.trim()))
        }
        _ => stable_uuid_from_string(fallback_seed),
    }
}

fn status_for(error: &AssistantError) -> StatusCode {
    match error {
        AssistantError::Validation(_) | AssistantError::SerializationError(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "remote_parser": state.assistant.has_remote_parser(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoints
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = parse_or_stable_uuid(req.user_id.as_deref(), "anonymous-user");
    info!(user_id = %user_id, "chat_handler");

    let result = state.assistant.process_message(&req.message, user_id).await;

    (StatusCode::OK, Json(ApiResponse::success(result)))
}

async fn confirm_handler(
    State(state): State<ApiState>,
    Json(req): Json<ConfirmRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = parse_or_stable_uuid(req.user_id.as_deref(), "anonymous-user");

    match state
        .assistant
        .confirm(user_id, req.action, req.data, &req.confirmation_id)
        .await
    {
        Ok(committed) => (StatusCode::OK, Json(ApiResponse::success(committed))),
        Err(e) => {
            warn!(user_id = %user_id, action = ?req.action, "Confirm rejected: {}", e);
            (status_for(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

async fn reset_handler(
    State(state): State<ApiState>,
    Json(req): Json<ResetRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = parse_or_stable_uuid(req.user_id.as_deref(), "anonymous-user");

    match state.assistant.reset(user_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "user_id": user_id }))),
        ),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

async fn confirmations_handler(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = parse_or_stable_uuid(Some(&user_id), "anonymous-user");

    match state.assistant.confirmations(user_id).await {
        Ok(records) => (StatusCode::OK, Json(ApiResponse::success(records))),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(assistant: Arc<Assistant>) -> Router {
    let state = ApiState { assistant };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/confirm", post(confirm_handler))
        .route("/api/chat/reset", post(reset_handler))
        .route("/api/chat/confirmations/:user_id", get(confirmations_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    assistant: Arc<Assistant>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(assistant);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
