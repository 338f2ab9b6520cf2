use thiserror::Error;

/// Errors from position storage.
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO error reading/writing the JSON document.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A record could not be mapped onto the current schema.
    #[error("invalid record for {ticker}: {reason}")]
    Schema { ticker: String, reason: String },

    /// A record written by a newer version of this program.
    #[error("record for {ticker} has unsupported schema version {version}")]
    UnsupportedVersion { ticker: String, version: u64 },
}

impl StoreError {
    pub(crate) fn schema(ticker: &str, reason: impl Into<String>) -> Self {
        Self::Schema {
            ticker: ticker.to_string(),
            reason: reason.into(),
        }
    }
}
