use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::store::{MetricsStore, StoreState};

/// GET /api/logs — current store state
pub async fn get_logs(State(store): State<Arc<MetricsStore>>) -> Json<StoreState> {
    Json(store.snapshot())
}

/// POST /api/logs/refresh — re-fetch the full history, then return the state.
/// A failed fetch is reported through `error`, not the status code.
pub async fn refresh_logs(State(store): State<Arc<MetricsStore>>) -> Json<StoreState> {
    store.fetch_logs().await;
    Json(store.snapshot())
}
