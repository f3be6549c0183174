use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};

use crate::model::LogRecord;

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

const COLUMNS: [&str; 6] = ["epoch", "sharpe_ratio", "mdd", "reward", "created_at", "id"];

fn cells(record: &LogRecord) -> Vec<String> {
    vec![
        record.epoch.to_string(),
        format!("{:.4}", record.sharpe_ratio),
        format!("{:.4}", record.mdd),
        format!("{:.2}", record.reward),
        record.created_at.to_rfc3339(),
        record.id.to_string(),
    ]
}

/// Render records in the requested format.
pub fn render_logs(logs: &[LogRecord], format: &OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL_CONDENSED);
            table.set_header(COLUMNS);
            for record in logs {
                table.add_row(cells(record));
            }
            Ok(table.to_string())
        }
        OutputFormat::Json => serde_json::to_string_pretty(logs)
            .map_err(|e| format!("failed to encode logs: {e}")),
        OutputFormat::Csv => {
            let mut out = COLUMNS.join(",");
            for record in logs {
                out.push('\n');
                out.push_str(&cells(record).join(","));
            }
            Ok(out)
        }
    }
}

/// One line per record, for streaming output.
pub fn render_record(record: &LogRecord, format: &OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string(record).map_err(|e| format!("failed to encode log: {e}"))
        }
        OutputFormat::Csv => Ok(cells(record).join(",")),
        OutputFormat::Table => Ok(format!(
            "epoch {:>5} | sharpe {:>8.4} | mdd {:>7.4} | reward {:>10.2}",
            record.epoch, record.sharpe_ratio, record.mdd, record.reward
        )),
    }
}

pub fn print_logs(logs: &[LogRecord], format: &OutputFormat) -> Result<(), String> {
    if logs.is_empty() {
        if let OutputFormat::Json = format {
            println!("[]");
        } else {
            println!("No logs found.");
        }
        return Ok(());
    }
    println!("{}", render_logs(logs, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewLogRecord;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn fixture() -> Vec<LogRecord> {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        vec![
            NewLogRecord::new(1, 1.5, 0.2, 100.5).into_record(Uuid::nil(), at),
            NewLogRecord::new(2, 0.75, 0.125, 130.0).into_record(Uuid::nil(), at),
        ]
    }

    #[test]
    fn csv_has_header_and_rows() {
        let out = render_logs(&fixture(), &OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "epoch,sharpe_ratio,mdd,reward,created_at,id");
        assert!(lines[1].starts_with("1,1.5000,0.2000,100.50,2025-01-02T03:04:05+00:00,"));
    }

    #[test]
    fn json_round_trips_records() {
        let logs = fixture();
        let out = render_logs(&logs, &OutputFormat::Json).unwrap();
        let back: Vec<LogRecord> = serde_json::from_str(&out).unwrap();
        assert_eq!(back, logs);
    }

    #[test]
    fn table_contains_every_epoch() {
        let out = render_logs(&fixture(), &OutputFormat::Table).unwrap();
        assert!(out.contains("sharpe_ratio"));
        assert!(out.contains("100.50"));
        assert!(out.contains("130.00"));
    }

    #[test]
    fn streaming_line_is_single_line() {
        let logs = fixture();
        let line = render_record(&logs[1], &OutputFormat::Table).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("reward     130.00"));
    }
}
