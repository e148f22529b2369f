//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the store cannot open a unit of work.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// `ok` or `unavailable`.
    pub store: &'static str,
}

async fn store_reachable(state: &AppState) -> bool {
    match state.store.begin().await {
        Ok(uow) => uow.rollback().await.is_ok(),
        Err(err) => {
            warn!(error = %err, "store health probe failed");
            false
        }
    }
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let reachable = store_reachable(&state).await;
    let (code, status, store) = if reachable {
        (StatusCode::OK, "ok", "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unavailable")
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            store,
        }),
    )
}

/// Returns the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
