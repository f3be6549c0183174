//! In-process gateway. Deterministic and test-friendly; also backs `--db memory`
//! demos of the feed without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Mutex, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{LogGateway, Subscription, SUBSCRIPTION_BUFFER};
use crate::error::{GatewayError, GatewayResult};
use crate::model::{LogRecord, NewLogRecord};

#[derive(Default)]
pub struct MemoryGateway {
    rows: RwLock<Vec<LogRecord>>,
    subscribers: Mutex<Vec<mpsc::Sender<LogRecord>>>,
    query_failure: Mutex<Option<GatewayError>>,
    insert_failure: Mutex<Option<GatewayError>>,
    query_delay: Mutex<Option<Duration>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with existing rows, kept in the given (insertion) order.
    pub fn with_rows(rows: Vec<LogRecord>) -> Self {
        Self {
            rows: RwLock::new(rows),
            ..Self::default()
        }
    }

    /// Make every subsequent query fail with `err` until cleared.
    pub fn fail_queries(&self, err: Option<GatewayError>) {
        if let Ok(mut guard) = self.query_failure.lock() {
            *guard = err;
        }
    }

    pub fn fail_inserts(&self, err: Option<GatewayError>) {
        if let Ok(mut guard) = self.insert_failure.lock() {
            *guard = err;
        }
    }

    /// Delay `fetch_ordered` responses, simulating a slow server.
    pub fn delay_queries(&self, delay: Option<Duration>) {
        if let Ok(mut guard) = self.query_delay.lock() {
            *guard = delay;
        }
    }

    /// Deliver `record` to every subscriber without storing it, the way a
    /// redelivered notification would arrive.
    pub fn push_event(&self, record: LogRecord) {
        self.broadcast(record);
    }

    /// Number of subscribers whose channel is still open.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .map(|mut subs| {
                subs.retain(|tx| !tx.is_closed());
                subs.len()
            })
            .unwrap_or(0)
    }

    fn broadcast(&self, record: LogRecord) {
        let Ok(mut subs) = self.subscribers.lock() else {
            return;
        };
        subs.retain(|tx| match tx.try_send(record.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(epoch = record.epoch, "subscriber lagging, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    fn injected(slot: &Mutex<Option<GatewayError>>) -> GatewayResult<()> {
        match slot.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            },
            Err(_) => Err(GatewayError::Connection("gateway lock poisoned".to_string())),
        }
    }

    fn read_rows(&self) -> GatewayResult<Vec<LogRecord>> {
        self.rows
            .read()
            .map(|rows| rows.clone())
            .map_err(|_| GatewayError::Connection("rows lock poisoned".to_string()))
    }
}

#[async_trait]
impl LogGateway for MemoryGateway {
    async fn fetch_ordered(&self) -> GatewayResult<Vec<LogRecord>> {
        let delay = self.query_delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Self::injected(&self.query_failure)?;

        // Stable: equal epochs stay in insertion (created_at) order.
        let mut rows = self.read_rows()?;
        rows.sort_by_key(|r| r.epoch);
        Ok(rows)
    }

    async fn insert(&self, record: &NewLogRecord) -> GatewayResult<LogRecord> {
        Self::injected(&self.insert_failure)?;

        let stored = record.clone().into_record(Uuid::new_v4(), Utc::now());
        self.rows
            .write()
            .map_err(|_| GatewayError::Insert("rows lock poisoned".to_string()))?
            .push(stored.clone());
        self.broadcast(stored.clone());
        Ok(stored)
    }

    async fn count(&self) -> GatewayResult<i64> {
        Self::injected(&self.query_failure)?;
        Ok(self.read_rows()?.len() as i64)
    }

    async fn max_epoch(&self) -> GatewayResult<Option<i64>> {
        Self::injected(&self.query_failure)?;
        Ok(self.read_rows()?.iter().map(|r| r.epoch).max())
    }

    async fn subscribe(&self) -> GatewayResult<Subscription> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.subscribers
            .lock()
            .map_err(|_| GatewayError::Connection("subscribers lock poisoned".to_string()))?
            .push(tx);
        Ok(Subscription::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_orders_by_epoch() {
        let gw = MemoryGateway::new();
        for epoch in [2, 1, 3] {
            gw.insert(&NewLogRecord::new(epoch, 1.0, 0.1, 10.0))
                .await
                .unwrap();
        }
        let epochs: Vec<i64> = gw
            .fetch_ordered()
            .await
            .unwrap()
            .iter()
            .map(|r| r.epoch)
            .collect();
        assert_eq!(epochs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn equal_epochs_keep_insertion_order() {
        let first = NewLogRecord::new(2, 1.0, 0.1, 1.0).into_record(Uuid::new_v4(), Utc::now());
        let second = NewLogRecord::new(2, 2.0, 0.2, 2.0).into_record(Uuid::new_v4(), Utc::now());
        let gw = MemoryGateway::with_rows(vec![
            first.clone(),
            NewLogRecord::new(1, 1.0, 0.1, 1.0).into_record(Uuid::new_v4(), Utc::now()),
            second.clone(),
        ]);
        let rows = gw.fetch_ordered().await.unwrap();
        assert_eq!(rows[0].epoch, 1);
        assert_eq!(rows[1].id, first.id);
        assert_eq!(rows[2].id, second.id);
    }

    #[tokio::test]
    async fn insert_notifies_subscribers() {
        let gw = MemoryGateway::new();
        let mut sub = gw.subscribe().await.unwrap();
        let stored = gw
            .insert(&NewLogRecord::new(4, 1.0, 0.1, 10.0))
            .await
            .unwrap();
        assert_eq!(sub.recv().await, Some(stored));
    }

    #[tokio::test]
    async fn dropped_subscription_is_pruned() {
        let gw = MemoryGateway::new();
        let sub = gw.subscribe().await.unwrap();
        assert_eq!(gw.subscriber_count(), 1);
        drop(sub);
        assert_eq!(gw.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn injected_insert_failure_writes_nothing() {
        let gw = MemoryGateway::new();
        gw.fail_inserts(Some(GatewayError::Insert("duplicate key".into())));
        let err = gw
            .insert(&NewLogRecord::sample())
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Insert("duplicate key".into()));
        assert_eq!(gw.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn max_epoch_empty_is_none() {
        let gw = MemoryGateway::new();
        assert_eq!(gw.max_epoch().await.unwrap(), None);
        gw.insert(&NewLogRecord::new(9, 1.0, 0.1, 10.0)).await.unwrap();
        gw.insert(&NewLogRecord::new(4, 1.0, 0.1, 10.0)).await.unwrap();
        assert_eq!(gw.max_epoch().await.unwrap(), Some(9));
    }
}
