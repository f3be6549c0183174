//! Metrics store: the ordered in-memory history of training epochs, kept
//! current by bulk fetches and by the push subscription.
//!
//! The store is an ordinary owned value. Share it with `Arc<MetricsStore>`;
//! consumers observe it through [`MetricsStore::watch`], which yields a fresh
//! [`StoreState`] after every mutation. Mutations happen inside
//! `watch::Sender::send_modify`, so each one is atomic and leaves `logs`
//! sorted ascending by epoch.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::GatewayError;
use crate::gateway::LogGateway;
use crate::model::LogRecord;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// What consumers render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    /// Ascending by epoch; equal epochs keep arrival order.
    pub logs: Vec<LogRecord>,
    /// True only while at least one `fetch_logs` call is in flight.
    pub loading: bool,
    /// Message from the last failed operation, cleared when a fetch starts.
    pub error: Option<String>,
}

pub struct MetricsStore {
    gateway: Arc<dyn LogGateway>,
    fetch_timeout: Duration,
    state: Arc<watch::Sender<StoreState>>,
    in_flight: AtomicUsize,
}

impl MetricsStore {
    pub fn new(gateway: Arc<dyn LogGateway>) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            gateway,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            state: Arc::new(state),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    /// Receiver that is marked changed after every store mutation.
    pub fn watch(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    /// Replace the history with the table's current contents.
    ///
    /// Never fails: gateway errors and timeouts land in `error`, and `logs`
    /// keeps its previous value. `loading` is cleared when the call settles,
    /// including when the future is dropped mid-flight.
    pub async fn fetch_logs(&self) {
        let mut guard = FetchGuard::start(self);

        let fetch = self.gateway.fetch_ordered();
        let result = match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Query(format!(
                "fetch timed out after {}ms",
                self.fetch_timeout.as_millis()
            ))),
        };

        match &result {
            Ok(logs) => tracing::debug!(rows = logs.len(), "fetched logs"),
            Err(e) => tracing::warn!("fetch failed: {}", e),
        }
        guard.finish(result);
    }

    /// Open the push channel and merge each delivered insert into `logs`.
    ///
    /// Redelivered records (same `id`) are dropped. The returned handle owns
    /// the background task; dropping it closes the subscription. If the
    /// channel cannot be opened the failure is stored in `error` and `None`
    /// is returned.
    pub async fn subscribe_to_logs(&self) -> Option<SubscriptionHandle> {
        let mut subscription = match self.gateway.subscribe().await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!("subscribe failed: {}", e);
                self.state.send_modify(|s| s.error = Some(e.to_string()));
                return None;
            }
        };

        let state = self.state.clone();
        let task = tokio::spawn(async move {
            while let Some(record) = subscription.recv().await {
                let (id, epoch) = (record.id, record.epoch);
                if state.send_if_modified(|s| merge_record(&mut s.logs, record)) {
                    tracing::info!(epoch, %id, "new log received");
                } else {
                    tracing::debug!(epoch, %id, "duplicate delivery ignored");
                }
            }
            tracing::debug!("push channel ended");
        });

        Some(SubscriptionHandle { task })
    }
}

/// Append `record` unless a record with the same id is present, then restore
/// epoch order. Returns whether `logs` changed.
pub fn merge_record(logs: &mut Vec<LogRecord>, record: LogRecord) -> bool {
    if logs.iter().any(|r| r.id == record.id) {
        return false;
    }
    logs.push(record);
    // Stable, so equal epochs stay in arrival order.
    logs.sort_by_key(|r| r.epoch);
    true
}

/// Tracks one in-flight fetch so `loading` is cleared however it ends.
struct FetchGuard<'a> {
    store: &'a MetricsStore,
    done: bool,
}

impl<'a> FetchGuard<'a> {
    fn start(store: &'a MetricsStore) -> Self {
        store.state.send_modify(|s| {
            store.in_flight.fetch_add(1, Ordering::SeqCst);
            s.loading = true;
            s.error = None;
        });
        Self { store, done: false }
    }

    fn finish(&mut self, result: Result<Vec<LogRecord>, GatewayError>) {
        let in_flight = &self.store.in_flight;
        self.store.state.send_modify(|s| {
            match result {
                Ok(logs) => s.logs = logs,
                Err(e) => s.error = Some(e.to_string()),
            }
            s.loading = in_flight.fetch_sub(1, Ordering::SeqCst) > 1;
        });
        self.done = true;
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let in_flight = &self.store.in_flight;
        self.store.state.send_modify(|s| {
            s.loading = in_flight.fetch_sub(1, Ordering::SeqCst) > 1;
        });
    }
}

/// Owns a running push subscription. Dropping it stops merging.
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
