//! HTTP API and WebSocket subscriber channel
//!
//! - `GET  /health`      poll health and key counts
//! - `GET  /state`       full committed state
//! - `GET  /state/:key`  one committed value (or null)
//! - `POST /override`    commit a value directly, skipping the stability gate
//! - `GET  /ws`          snapshot-then-patch subscriber stream

mod ws;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::error::StateError;
use crate::poller::PollStatus;
use crate::protocol::timestamp;
use crate::state::{StateActorHandle, StateMap};

/// Shared state for API handlers
pub struct ApiState {
    /// Handle to the state actor
    pub state: StateActorHandle,
    /// Poll health counters
    pub poll_status: Arc<PollStatus>,
}

/// API error response
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request, mapped to 400
    BadRequest(String),
    /// State actor gone, mapped to 503
    Unavailable,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                StateError::Unavailable.to_string(),
            ),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<StateError> for ApiError {
    fn from(_: StateError) -> Self {
        ApiError::Unavailable
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    ok: bool,
    ts: String,
    last_fetch_ok_at: Option<String>,
    keys: usize,
    pending: usize,
    subscribers: usize,
    cycles: u64,
    failures: u64,
    last_error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ValueResponse {
    key: String,
    value: Option<String>,
}

#[derive(Debug, Serialize)]
struct StateResponse {
    state: StateMap,
}

/// Build the API router
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(get_state))
        .route("/state/:key", get(get_value))
        .route("/override", post(override_value))
        .route("/ws", get(subscribe_ws))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health
async fn health(State(api): State<Arc<ApiState>>) -> Result<Json<HealthResponse>, ApiError> {
    let stats = api.state.stats().await?;
    let poll = api.poll_status.snapshot();

    Ok(Json(HealthResponse {
        ok: true,
        ts: timestamp(Utc::now()),
        last_fetch_ok_at: poll.last_fetch_ok_at.map(timestamp),
        keys: stats.keys,
        pending: stats.pending,
        subscribers: stats.subscribers,
        cycles: poll.cycles,
        failures: poll.failures,
        last_error: poll.last_error,
    }))
}

/// GET /state
async fn get_state(State(api): State<Arc<ApiState>>) -> Result<Json<StateResponse>, ApiError> {
    let state = api.state.snapshot().await?;
    Ok(Json(StateResponse { state }))
}

/// GET /state/:key
async fn get_value(
    Path(key): Path<String>,
    State(api): State<Arc<ApiState>>,
) -> Result<Json<ValueResponse>, ApiError> {
    let value = api.state.get(key.clone()).await?;
    Ok(Json(ValueResponse { key, value }))
}

/// POST /override - direct commit, no debouncing
async fn override_value(
    State(api): State<Arc<ApiState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let (key, value) = parse_override(&body)?;

    let changed = api.state.override_value(key.clone(), value.clone()).await?;
    debug!(key = %key, changed, "Override applied");

    Ok(Json(json!({
        "ok": true,
        "key": key,
        "value": value,
        "changed": changed,
    })))
}

/// Extract `(key, value)` from an override body
///
/// `key` must be a non-empty string. `value` may be a string, number or
/// boolean (stringified); missing or `null` means `""`.
fn parse_override(body: &Value) -> Result<(String, String), ApiError> {
    let Some(fields) = body.as_object() else {
        return Err(ApiError::BadRequest("body must be a JSON object".to_string()));
    };

    let key = match fields.get("key") {
        Some(Value::String(key)) if !key.is_empty() => key.clone(),
        Some(Value::String(_)) => {
            return Err(ApiError::BadRequest("key must not be empty".to_string()))
        }
        Some(_) => return Err(ApiError::BadRequest("key must be a string".to_string())),
        None => return Err(ApiError::BadRequest("key is required".to_string())),
    };

    let value = match fields.get("value") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
        Some(_) => {
            return Err(ApiError::BadRequest(
                "value must be a string, number or boolean".to_string(),
            ))
        }
    };

    Ok((key, value))
}

/// GET /ws - snapshot followed by patches
async fn subscribe_ws(
    ws: WebSocketUpgrade,
    State(api): State<Arc<ApiState>>,
) -> impl IntoResponse {
    let state = api.state.clone();
    ws.on_upgrade(move |socket| ws::handle_socket(socket, state))
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve(
    state: Arc<ApiState>,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let router = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server on {}", addr))?;
    info!("API server listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    info!("API server stopped");
    Ok(())
}
