use thiserror::Error;

/// Failures talking to the upstream meal feed. None of these reach a caller of
/// the coordinator; they degrade to a cached or sentinel record.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("feed timed out after {0}s")]
    Timeout(u64),

    #[error("feed envelope malformed: {0}")]
    Decode(String),

    #[error("feed reported {code}: {message}")]
    Upstream { code: String, message: String },
}

/// Failures of the backing store. These are fatal for an ingestion call.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database round-trip timed out after {0}s")]
    Timeout(u64),

    #[error("malformed persistence response: {0}")]
    MalformedResponse(String),
}
