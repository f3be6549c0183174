use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GatewayError;

/// Table holding one row per training epoch.
pub const TRADER_GROWTH_LOG_TABLE: &str = "trader_growth_log";

/// One training epoch's metrics as stored in `trader_growth_log`.
///
/// `id` and `created_at` are assigned by the database on insert; a record is
/// never modified after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Training iteration number, the ordering key for every view.
    pub epoch: i64,
    pub sharpe_ratio: f64,
    /// Max drawdown for the epoch.
    pub mdd: f64,
    pub reward: f64,
}

/// Insert payload: a record before the database has assigned its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLogRecord {
    pub epoch: i64,
    pub sharpe_ratio: f64,
    pub mdd: f64,
    pub reward: f64,
}

impl NewLogRecord {
    pub fn new(epoch: i64, sharpe_ratio: f64, mdd: f64, reward: f64) -> Self {
        Self {
            epoch,
            sharpe_ratio,
            mdd,
            reward,
        }
    }

    /// The record the smoke test uploads.
    pub fn sample() -> Self {
        Self::new(1, 1.5, 0.2, 100.5)
    }

    /// Attach database-assigned identity.
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> LogRecord {
        LogRecord {
            id,
            created_at,
            epoch: self.epoch,
            sharpe_ratio: self.sharpe_ratio,
            mdd: self.mdd,
            reward: self.reward,
        }
    }
}

impl LogRecord {
    /// Map a `SELECT id, created_at, epoch, sharpe_ratio, mdd, reward` row.
    pub fn from_row(row: &tokio_postgres::Row) -> Result<Self, GatewayError> {
        let decode = |e: tokio_postgres::Error| GatewayError::Decode(e.to_string());
        Ok(Self {
            id: row.try_get("id").map_err(decode)?,
            created_at: row.try_get("created_at").map_err(decode)?,
            epoch: row.try_get("epoch").map_err(decode)?,
            sharpe_ratio: row.try_get("sharpe_ratio").map_err(decode)?,
            mdd: row.try_get("mdd").map_err(decode)?,
            reward: row.try_get("reward").map_err(decode)?,
        })
    }

    /// Parse a `row_to_json(NEW)` notification payload.
    pub fn from_notify_payload(payload: &str) -> Result<Self, GatewayError> {
        serde_json::from_str(payload)
            .map_err(|e| GatewayError::Decode(format!("invalid notification payload: {e}")))
    }
}
