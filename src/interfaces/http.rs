use std::future::Future;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    application::state::SharedState,
    domain::error::DomainError,
    interfaces::{desk, whatsapp},
};

const SYNC_LOG_DEFAULT_LIMIT: usize = 100;
const SYNC_LOG_MAX_LIMIT: usize = 500;

pub fn build_router(state: SharedState) -> Router {
    let max_payload_bytes = state.config().max_payload_bytes;
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/sync/logs", get(sync_logs_handler))
        .route(
            "/webhooks/whatsapp",
            get(whatsapp::verify_handler).post(whatsapp::webhook_handler),
        )
        .route(
            "/webhooks/desk",
            get(desk::probe_handler).post(desk::webhook_handler),
        )
        .layer(DefaultBodyLimit::max(max_payload_bytes))
        .with_state(state)
}

pub async fn serve(
    listener: TcpListener,
    state: SharedState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DomainError> {
    let local_addr = listener.local_addr().map_err(|error| {
        DomainError::Unavailable(format!("failed to read listener address: {error}"))
    })?;

    info!(
        "deskgate-core listening on http://{}:{}, desk_verification={}",
        local_addr.ip(),
        local_addr.port(),
        state.desk_verification_label(),
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|error| DomainError::Unavailable(format!("server runtime error: {error}")))
}

async fn healthz_handler(State(state): State<SharedState>) -> impl IntoResponse {
    match state.health_payload().await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "ok": false,
                "error": error.to_string(),
            })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct SyncLogsQuery {
    #[serde(default)]
    limit: Option<usize>,
}

async fn sync_logs_handler(
    State(state): State<SharedState>,
    Query(query): Query<SyncLogsQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(SYNC_LOG_DEFAULT_LIMIT)
        .clamp(1, SYNC_LOG_MAX_LIMIT);

    match state.list_sync_logs(limit).await {
        Ok(entries) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "entries": entries,
            })),
        )
            .into_response(),
        Err(error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "ok": false,
                "error": error.to_string(),
            })),
        )
            .into_response(),
    }
}
