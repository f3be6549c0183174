//! tokio-postgres gateway. Queries share one cached connection; each push
//! subscription gets its own LISTEN connection.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_postgres::{AsyncMessage, Client, NoTls};

use super::{LogGateway, Subscription, SUBSCRIPTION_BUFFER};
use crate::error::{GatewayError, GatewayResult};
use crate::model::{LogRecord, NewLogRecord, TRADER_GROWTH_LOG_TABLE};

const SELECT_ORDERED: &str = "SELECT id, created_at, epoch, sharpe_ratio, mdd, reward \
     FROM trader_growth_log ORDER BY epoch ASC, created_at ASC";

const INSERT_ONE: &str = "INSERT INTO trader_growth_log (epoch, sharpe_ratio, mdd, reward) \
     VALUES ($1, $2, $3, $4) \
     RETURNING id, created_at, epoch, sharpe_ratio, mdd, reward";

const SELECT_SINCE: &str = "SELECT id, created_at, epoch, sharpe_ratio, mdd, reward \
     FROM trader_growth_log WHERE created_at >= $1 ORDER BY epoch ASC, created_at ASC";

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Slack, in seconds, for rows whose transaction started before the
/// watermark but committed after it.
const BACKFILL_OVERLAP_SECS: i64 = 30;

pub struct PgGateway {
    database_url: String,
    client: Mutex<Option<Arc<Client>>>,
}

impl PgGateway {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            client: Mutex::new(None),
        }
    }

    /// Get the shared client, reconnecting if the last one closed.
    async fn get(&self) -> GatewayResult<Arc<Client>> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            if !client.is_closed() {
                return Ok(client.clone());
            }
            tracing::info!("database connection closed, reconnecting");
        }

        let client = Arc::new(connect(&self.database_url).await?);
        *guard = Some(client.clone());
        Ok(client)
    }
}

async fn connect(database_url: &str) -> GatewayResult<Client> {
    let (client, connection) = tokio_postgres::connect(database_url, NoTls)
        .await
        .map_err(|e| GatewayError::Connection(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("database connection error: {}", e);
        }
    });

    Ok(client)
}

#[async_trait]
impl LogGateway for PgGateway {
    async fn fetch_ordered(&self) -> GatewayResult<Vec<LogRecord>> {
        let client = self.get().await?;
        let rows = client
            .query(SELECT_ORDERED, &[])
            .await
            .map_err(|e| GatewayError::Query(e.to_string()))?;
        rows.iter().map(LogRecord::from_row).collect()
    }

    async fn insert(&self, record: &NewLogRecord) -> GatewayResult<LogRecord> {
        let client = self.get().await?;
        let row = client
            .query_one(
                INSERT_ONE,
                &[
                    &record.epoch,
                    &record.sharpe_ratio,
                    &record.mdd,
                    &record.reward,
                ],
            )
            .await
            .map_err(|e| GatewayError::Insert(e.to_string()))?;
        LogRecord::from_row(&row)
    }

    async fn count(&self) -> GatewayResult<i64> {
        let client = self.get().await?;
        let row = client
            .query_one("SELECT count(*) FROM trader_growth_log", &[])
            .await
            .map_err(|e| GatewayError::Query(e.to_string()))?;
        row.try_get(0).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn max_epoch(&self) -> GatewayResult<Option<i64>> {
        let client = self.get().await?;
        let row = client
            .query_one("SELECT max(epoch) FROM trader_growth_log", &[])
            .await
            .map_err(|e| GatewayError::Query(e.to_string()))?;
        row.try_get(0).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn subscribe(&self) -> GatewayResult<Subscription> {
        // The first LISTEN happens here so a bad connection fails the call
        // instead of the background task.
        let listener = Listener::open(&self.database_url).await?;
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        tokio::spawn(forward_loop(self.database_url.clone(), listener, tx));
        Ok(Subscription::new(rx))
    }
}

/// A dedicated connection with LISTEN active on the table's channel.
struct Listener {
    // Dropping the client closes the connection.
    client: Client,
    messages: mpsc::UnboundedReceiver<AsyncMessage>,
    /// Server clock right after LISTEN took effect.
    listening_since: DateTime<Utc>,
}

impl Listener {
    async fn open(database_url: &str) -> GatewayResult<Self> {
        let (client, mut connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| GatewayError::Connection(e.to_string()))?;

        // The connection must be polled for LISTEN itself to complete, so
        // drive it from its own task and hand async messages over a channel.
        let (msg_tx, messages) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let stream = futures::stream::poll_fn(move |cx| connection.poll_message(cx));
            let mut stream = std::pin::pin!(stream);
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(msg) => {
                        if msg_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("LISTEN connection error: {}", e);
                        break;
                    }
                }
            }
        });

        client
            .batch_execute(&format!("LISTEN {TRADER_GROWTH_LOG_TABLE}"))
            .await
            .map_err(|e| GatewayError::Connection(e.to_string()))?;
        let listening_since: DateTime<Utc> = client
            .query_one("SELECT now()", &[])
            .await
            .map_err(|e| GatewayError::Connection(e.to_string()))?
            .try_get(0)
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        tracing::info!("LISTEN {} started", TRADER_GROWTH_LOG_TABLE);

        Ok(Self {
            client,
            messages,
            listening_since,
        })
    }

    /// Rows created at or after `from`, in the same order a fetch returns.
    async fn backfill(&self, from: DateTime<Utc>) -> GatewayResult<Vec<LogRecord>> {
        let rows = self
            .client
            .query(SELECT_SINCE, &[&from])
            .await
            .map_err(|e| GatewayError::Query(e.to_string()))?;
        rows.iter().map(LogRecord::from_row).collect()
    }

    /// Forward notifications until the connection ends or the consumer leaves.
    /// Returns `true` if the consumer is gone.
    async fn forward(&mut self, tx: &mpsc::Sender<LogRecord>, mark: &mut Watermark) -> bool {
        loop {
            let msg = tokio::select! {
                _ = tx.closed() => return true,
                msg = self.messages.recv() => msg,
            };
            let Some(msg) = msg else {
                return false;
            };
            let AsyncMessage::Notification(n) = msg else {
                continue;
            };
            tracing::debug!("notification: {}", n.payload());
            match LogRecord::from_notify_payload(n.payload()) {
                Ok(record) => {
                    mark.observe(&record);
                    if tx.send(record).await.is_err() {
                        return true;
                    }
                }
                Err(e) => tracing::warn!("skipping notification: {}", e),
            }
        }
    }
}

/// How far the push channel is known to have delivered. A reconnect replays
/// everything from slightly before this point; the store drops the overlap
/// by id.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Watermark {
    delivered_until: DateTime<Utc>,
}

impl Watermark {
    fn new(listening_since: DateTime<Utc>) -> Self {
        Self {
            delivered_until: listening_since,
        }
    }

    fn observe(&mut self, record: &LogRecord) {
        if record.created_at > self.delivered_until {
            self.delivered_until = record.created_at;
        }
    }

    /// `created_at` is the inserting transaction's start time, so a row can
    /// commit after rows with later timestamps. Back off to catch those.
    fn replay_from(&self) -> DateTime<Utc> {
        self.delivered_until - chrono::Duration::seconds(BACKFILL_OVERLAP_SECS)
    }
}

/// Reopen LISTEN and replay rows committed while it was down.
async fn reopen(
    database_url: &str,
    tx: &mpsc::Sender<LogRecord>,
    mark: &mut Watermark,
) -> GatewayResult<Option<Listener>> {
    let listener = Listener::open(database_url).await?;
    let missed = listener.backfill(mark.replay_from()).await?;
    tracing::info!(rows = missed.len(), "replaying rows from reconnect window");
    for record in missed {
        mark.observe(&record);
        if tx.send(record).await.is_err() {
            return Ok(None);
        }
    }
    Ok(Some(listener))
}

async fn forward_loop(database_url: String, first: Listener, tx: mpsc::Sender<LogRecord>) {
    let mut mark = Watermark::new(first.listening_since);
    let mut listener = Some(first);
    loop {
        if let Some(mut active) = listener.take() {
            if active.forward(&tx, &mut mark).await {
                tracing::info!("subscription closed by consumer");
                return;
            }
            tracing::info!("LISTEN connection closed, reconnecting...");
        }

        tokio::select! {
            _ = tx.closed() => return,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }

        match reopen(&database_url, &tx, &mut mark).await {
            Ok(Some(opened)) => listener = Some(opened),
            Ok(None) => return,
            Err(e) => tracing::error!("LISTEN error: {}, reconnecting in 2s...", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewLogRecord;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, secs).unwrap()
    }

    fn overlap() -> chrono::Duration {
        chrono::Duration::seconds(BACKFILL_OVERLAP_SECS)
    }

    fn created(secs: u32) -> LogRecord {
        NewLogRecord::new(1, 1.0, 0.1, 1.0).into_record(Uuid::new_v4(), at(secs))
    }

    #[test]
    fn replay_starts_before_listen_when_nothing_delivered() {
        let mark = Watermark::new(at(30));
        assert_eq!(mark.replay_from(), at(30) - overlap());
    }

    #[test]
    fn watermark_advances_with_delivered_rows() {
        let mut mark = Watermark::new(at(10));
        mark.observe(&created(40));
        assert_eq!(mark.replay_from(), at(40) - overlap());
    }

    #[test]
    fn late_committed_row_does_not_move_watermark_back() {
        let mut mark = Watermark::new(at(10));
        mark.observe(&created(40));
        mark.observe(&created(25));
        assert_eq!(mark.replay_from(), at(40) - overlap());
    }

    #[test]
    fn replay_query_orders_like_fetch() {
        assert!(SELECT_SINCE.contains("created_at >= $1"));
        assert!(SELECT_SINCE.ends_with("ORDER BY epoch ASC, created_at ASC"));
    }
}
