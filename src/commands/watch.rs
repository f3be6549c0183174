use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::gateway::LogGateway;
use crate::model::LogRecord;
use crate::output::{print_logs, render_record, OutputFormat};
use crate::store::MetricsStore;

/// Print the current history, then every record the push channel merges,
/// until Ctrl-C.
pub async fn run(
    gateway: Arc<dyn LogGateway>,
    fetch_timeout: Duration,
    format: &OutputFormat,
) -> Result<(), String> {
    let store = MetricsStore::new(gateway).with_fetch_timeout(fetch_timeout);
    let mut rx = store.watch();

    store.fetch_logs().await;
    let initial = store.snapshot();
    if let Some(error) = &initial.error {
        eprintln!("Warning: initial fetch failed: {error}");
    }
    print_logs(&initial.logs, format)?;
    let mut seen: HashSet<Uuid> = initial.logs.iter().map(|r| r.id).collect();

    let Some(_subscription) = store.subscribe_to_logs().await else {
        let error = store.snapshot().error.unwrap_or_default();
        return Err(format!("Subscribe failed: {error}"));
    };
    eprintln!("Watching for new logs (Ctrl-C to stop)...");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let logs = rx.borrow_and_update().logs.clone();
                for record in unseen(&mut seen, &logs) {
                    println!("{}", render_record(record, format)?);
                }
            }
        }
    }
    Ok(())
}

/// Records in `logs` not reported before, in epoch order.
fn unseen<'a>(seen: &mut HashSet<Uuid>, logs: &'a [LogRecord]) -> Vec<&'a LogRecord> {
    logs.iter().filter(|r| seen.insert(r.id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewLogRecord;
    use chrono::Utc;

    #[test]
    fn unseen_reports_each_record_once() {
        let a = NewLogRecord::new(1, 1.0, 0.1, 1.0).into_record(Uuid::new_v4(), Utc::now());
        let b = NewLogRecord::new(2, 1.0, 0.1, 1.0).into_record(Uuid::new_v4(), Utc::now());
        let mut seen = HashSet::from([a.id]);

        let logs = vec![a.clone(), b.clone()];
        let fresh: Vec<i64> = unseen(&mut seen, &logs).iter().map(|r| r.epoch).collect();
        assert_eq!(fresh, vec![2]);
        assert!(unseen(&mut seen, &logs).is_empty());
    }
}
