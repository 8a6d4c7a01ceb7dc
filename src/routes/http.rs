// GET handlers: version, connected devices, lifetime stats

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::models::LifetimeStats;
use crate::version::{NAME, VERSION};

/// GET /version returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/devices: connection status of every device with a live session.
pub(super) async fn devices_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.registry.statuses())
}

/// GET /api/devices/{serial}/lifetime-stats: live counters when the device is connected,
/// otherwise the last stored blob.
pub(super) async fn lifetime_stats_handler(
    Path(serial): Path<String>,
    State(state): State<AppState>,
) -> Response {
    if let Some(session) = state.registry.get(&serial)
        && let Some(stats) = session.snapshot().await
    {
        return axum::Json(stats).into_response();
    }

    match state.store.get(&serial).await {
        Ok(Some(blob)) => match serde_json::from_str::<LifetimeStats>(&blob) {
            Ok(stats) => axum::Json(stats).into_response(),
            Err(e) => {
                tracing::warn!(serial = %serial, error = %e, "stored lifetime stats unreadable");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::warn!(serial = %serial, error = %e, operation = "get_lifetime_stats", "store read failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
