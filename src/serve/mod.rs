pub mod routes;

use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::Profile;
use crate::gateway::LogGateway;
use crate::store::MetricsStore;

/// Run the dashboard feed until Ctrl-C.
pub async fn run(
    gateway: Arc<dyn LogGateway>,
    profile: &Profile,
    addr_override: Option<&str>,
) -> Result<(), String> {
    let addr = addr_override.unwrap_or_else(|| profile.listen_addr());
    tracing::info!("Starting growthlog serve on {}", addr);

    let store = Arc::new(MetricsStore::new(gateway).with_fetch_timeout(profile.fetch_timeout()));
    store.fetch_logs().await;
    if let Some(error) = store.snapshot().error {
        tracing::warn!("initial fetch failed: {}", error);
    }

    // Held for the server's lifetime; dropping it closes the LISTEN channel.
    let subscription = store.subscribe_to_logs().await;
    if subscription.is_none() {
        tracing::warn!("live updates unavailable, serving fetched history only");
    }

    let mut app = routes::build_router(store).layer(CorsLayer::permissive());

    if let Some(ref static_dir) = profile.static_dir {
        tracing::info!("Serving static files from {}", static_dir);
        app = app.fallback_service(ServeDir::new(static_dir));
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind {addr}: {e}"))?;

    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| format!("Server error: {e}"))?;

    drop(subscription);
    tracing::info!("Server stopped");
    Ok(())
}
