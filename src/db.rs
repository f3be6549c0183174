use postgres::{Client, NoTls};
use std::sync::Arc;

use crate::gateway::{LogGateway, MemoryGateway, PgGateway};

/// Connection string that selects the in-process gateway instead of Postgres.
pub const MEMORY_CONNECTION: &str = "memory";

/// Blocking connection for one-shot administrative statements.
pub fn connect(conn_str: &str) -> Result<Client, String> {
    Client::connect(conn_str, NoTls).map_err(|e| format!("Connection failed: {e}"))
}

/// Run a multi-statement SQL script in one round trip.
pub fn apply_schema(client: &mut Client, sql: &str) -> Result<(), String> {
    client
        .batch_execute(sql)
        .map_err(|e| format!("Schema migration failed: {e}"))
}

/// Gateway for the live commands.
pub fn open_gateway(conn_str: &str) -> Arc<dyn LogGateway> {
    if conn_str == MEMORY_CONNECTION {
        tracing::info!("using in-memory gateway");
        Arc::new(MemoryGateway::new())
    } else {
        Arc::new(PgGateway::new(conn_str))
    }
}
