// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::registry::DeviceRegistry;
use crate::session::SessionConfig;
use crate::store::StatsStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<DeviceRegistry>,
    pub(crate) store: Arc<dyn StatsStore>,
    pub(crate) session_config: SessionConfig,
}

pub fn app(
    registry: Arc<DeviceRegistry>,
    store: Arc<dyn StatsStore>,
    config: &AppConfig,
) -> Router {
    let state = AppState {
        registry,
        store,
        session_config: SessionConfig {
            flush_threshold: config.stats.flush_threshold,
            save_interval_secs: config.stats.save_interval_secs,
            channel_capacity: config.stats.session_channel_capacity,
        },
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/devices", get(http::devices_handler)) // GET /api/devices
        .route(
            "/api/devices/{serial}/lifetime-stats",
            get(http::lifetime_stats_handler),
        ) // GET /api/devices/{serial}/lifetime-stats
        .route("/ws/device/{serial}", get(ws::ws_device)) // WS /ws/device/{serial}
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
