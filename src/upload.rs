use crate::error::UploadError;
use crate::gateway::LogGateway;
use crate::model::{LogRecord, NewLogRecord};

/// Insert one training log. A single all-or-nothing request, never retried;
/// failures come back with the gateway's message attached.
pub async fn upload_trader_growth_log(
    gateway: &dyn LogGateway,
    data: &NewLogRecord,
) -> Result<LogRecord, UploadError> {
    tracing::info!(
        epoch = data.epoch,
        sharpe_ratio = data.sharpe_ratio,
        mdd = data.mdd,
        reward = data.reward,
        "uploading log"
    );
    let stored = gateway.insert(data).await?;
    tracing::info!(id = %stored.id, epoch = stored.epoch, "log uploaded successfully");
    Ok(stored)
}
