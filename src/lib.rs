//! Live ingestion of RL trader training metrics.
//!
//! Rows of `trader_growth_log` reach a [`store::MetricsStore`] two ways: a
//! bulk ordered fetch and a push subscription fed by Postgres LISTEN/NOTIFY.
//! The store keeps them merged, deduplicated, and sorted by epoch, and
//! publishes every change to its watchers.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod model;
pub mod output;
pub mod schema;
pub mod serve;
pub mod store;
pub mod upload;

pub use error::{GatewayError, UploadError};
pub use gateway::{LogGateway, MemoryGateway, PgGateway};
pub use model::{LogRecord, NewLogRecord};
pub use store::{MetricsStore, StoreState, SubscriptionHandle};
pub use upload::upload_trader_growth_log;
