pub mod health;
pub mod logs;
pub mod ws;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::store::MetricsStore;

/// Build the application router with all API routes.
pub fn build_router(store: Arc<MetricsStore>) -> Router {
    let api = Router::new()
        .route("/health", get(health::health))
        .route("/logs", get(logs::get_logs))
        .route("/logs/refresh", post(logs::refresh_logs))
        .route("/ws", get(ws::ws_handler))
        .with_state(store);

    Router::new().nest("/api", api)
}
