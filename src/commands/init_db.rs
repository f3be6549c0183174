use crate::db;
use crate::schema;

pub fn run(conn_str: &str, file: Option<&str>) -> Result<(), String> {
    if conn_str == db::MEMORY_CONNECTION {
        return Err("init-db needs a Postgres connection, not `memory`".into());
    }

    let sql = match file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read schema file '{path}': {e}"))?,
        None => schema::DDL.to_string(),
    };

    println!("Connecting to database...");
    let mut client = db::connect(conn_str)?;
    println!("Connected to database!");

    println!("Running schema migration...");
    db::apply_schema(&mut client, &sql)?;
    println!("Database schema initialized successfully!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_connection_is_rejected() {
        let err = run(db::MEMORY_CONNECTION, None).unwrap_err();
        assert!(err.contains("needs a Postgres connection"));
    }

    #[test]
    fn unreadable_schema_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("schema.sql");
        let missing = missing.to_string_lossy();
        let err = run("postgres://localhost/growth", Some(&missing)).unwrap_err();
        assert!(err.starts_with("Failed to read schema file"));
    }
}
