use rand::Rng;
use std::time::Duration;

use crate::gateway::LogGateway;
use crate::model::NewLogRecord;
use crate::upload::upload_trader_growth_log;

/// Mock training session: resume after the highest stored epoch and upload
/// synthetic PPO-style metrics, one record per epoch.
pub async fn run(gateway: &dyn LogGateway, epochs: u32, interval: Duration) -> Result<(), String> {
    println!("Starting mock training session...");
    let start_epoch = resume_epoch(gateway).await;

    let mut uploaded = 0u32;
    for i in 0..epochs {
        let epoch = start_epoch + i64::from(i);
        // Scoped so the thread-local rng is not held across an await.
        let data = mock_metrics(epoch, &mut rand::thread_rng());
        println!(
            "Epoch {epoch}: uploading stats - sharpe {} mdd {} reward {}",
            data.sharpe_ratio, data.mdd, data.reward
        );

        match upload_trader_growth_log(gateway, &data).await {
            Ok(_) => uploaded += 1,
            Err(e) => eprintln!("Error uploading: {e}"),
        }

        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }

    println!("Uploaded {uploaded}/{epochs} epochs");
    Ok(())
}

async fn resume_epoch(gateway: &dyn LogGateway) -> i64 {
    match gateway.max_epoch().await {
        Ok(Some(max)) => {
            println!("Resuming from epoch {}...", max + 1);
            max + 1
        }
        Ok(None) => 1,
        Err(e) => {
            println!("Error fetching max epoch: {e}, starting from 1");
            1
        }
    }
}

/// Reward trends upward with the epoch so the chart shows growth.
pub fn mock_metrics(epoch: i64, rng: &mut impl Rng) -> NewLogRecord {
    let sharpe_ratio = round_to(rng.gen_range(0.5..2.5), 4);
    let mdd = round_to(rng.gen_range(0.05..0.30), 4);
    let reward = round_to(rng.gen_range(50.0..200.0) + epoch as f64 * 10.0, 2);
    NewLogRecord::new(epoch, sharpe_ratio, mdd, reward)
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}
