//! Persistence gateway: the query, insert, and push capabilities the store
//! and the upload path consume.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::GatewayResult;
use crate::model::{LogRecord, NewLogRecord};

pub use memory::MemoryGateway;
pub use postgres::PgGateway;

/// Capacity of the channel between a push listener and its consumer.
pub const SUBSCRIPTION_BUFFER: usize = 256;

/// Access to the `trader_growth_log` table.
#[async_trait]
pub trait LogGateway: Send + Sync {
    /// Every row, ordered by ascending epoch.
    async fn fetch_ordered(&self) -> GatewayResult<Vec<LogRecord>>;

    /// Insert one row and return it with its assigned `id` and `created_at`.
    async fn insert(&self, record: &NewLogRecord) -> GatewayResult<LogRecord>;

    async fn count(&self) -> GatewayResult<i64>;

    /// Highest epoch present, `None` for an empty table.
    async fn max_epoch(&self) -> GatewayResult<Option<i64>>;

    /// Open a push channel delivering each committed insert at least once.
    async fn subscribe(&self) -> GatewayResult<Subscription>;
}

/// Receiving end of a push channel.
///
/// Dropping it closes the channel; the producer notices and stops.
pub struct Subscription {
    rx: mpsc::Receiver<LogRecord>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<LogRecord>) -> Self {
        Self { rx }
    }

    /// Next pushed record, or `None` once the producer has gone away.
    pub async fn recv(&mut self) -> Option<LogRecord> {
        self.rx.recv().await
    }
}
