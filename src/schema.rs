/// Idempotent DDL for the log table and its insert notification.
///
/// Every committed insert sends `row_to_json(NEW)` on the channel named after
/// the table, which is what `PgGateway::subscribe` listens on.
pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS trader_growth_log (
    id           UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    epoch        BIGINT NOT NULL,
    sharpe_ratio DOUBLE PRECISION NOT NULL,
    mdd          DOUBLE PRECISION NOT NULL,
    reward       DOUBLE PRECISION NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_trader_growth_log_epoch
    ON trader_growth_log (epoch);

CREATE OR REPLACE FUNCTION notify_trader_growth_log() RETURNS trigger AS $$
BEGIN
    PERFORM pg_notify('trader_growth_log', row_to_json(NEW)::text);
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS trader_growth_log_notify ON trader_growth_log;
CREATE TRIGGER trader_growth_log_notify
    AFTER INSERT ON trader_growth_log
    FOR EACH ROW EXECUTE FUNCTION notify_trader_growth_log();
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TRADER_GROWTH_LOG_TABLE;

    #[test]
    fn notify_channel_matches_table() {
        let channel = format!("pg_notify('{TRADER_GROWTH_LOG_TABLE}'");
        assert!(DDL.contains(&channel));
    }

    #[test]
    fn ddl_is_rerunnable() {
        assert!(DDL.contains("CREATE TABLE IF NOT EXISTS"));
        assert!(DDL.contains("CREATE OR REPLACE FUNCTION"));
        assert!(DDL.contains("DROP TRIGGER IF EXISTS"));
    }
}
