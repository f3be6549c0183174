use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failures surfaced by a persistence gateway.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    /// Database unreachable or misconfigured.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Malformed query, missing table, or a fetch that hit its deadline.
    #[error("query failed: {0}")]
    Query(String),

    #[error("insert failed: {0}")]
    Insert(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

/// An upload that did not land. The message carries the gateway's reason.
#[derive(Debug, Error)]
#[error("Error uploading log: {0}")]
pub struct UploadError(#[from] pub GatewayError);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("No connection string. Use --db, DATABASE_URL, or set one in .growthlog/config.toml")]
    MissingConnection,
}
