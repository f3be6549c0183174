use std::sync::Arc;
use std::time::Duration;

use crate::gateway::LogGateway;
use crate::output::{print_logs, OutputFormat};
use crate::store::MetricsStore;

pub async fn run(
    gateway: Arc<dyn LogGateway>,
    fetch_timeout: Duration,
    format: &OutputFormat,
) -> Result<(), String> {
    let store = MetricsStore::new(gateway).with_fetch_timeout(fetch_timeout);
    store.fetch_logs().await;

    let state = store.snapshot();
    if let Some(error) = state.error {
        return Err(format!("Fetch failed: {error}"));
    }
    print_logs(&state.logs, format)
}
