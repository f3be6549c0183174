use crate::error::GatewayResult;
use crate::gateway::LogGateway;

/// Connectivity check: row count of the log table. A missing table shows up
/// here as a query failure, which is still a useful answer.
pub async fn check(gateway: &dyn LogGateway) -> GatewayResult<i64> {
    gateway.count().await
}

pub async fn run(gateway: &dyn LogGateway) -> Result<(), String> {
    let count = check(gateway)
        .await
        .map_err(|e| format!("Ping failed: {e}"))?;
    println!("Connected. trader_growth_log has {count} rows");
    Ok(())
}
