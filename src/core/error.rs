//! Error types for the Greyhound loader

use thiserror::Error;

/// Main error type for the loader
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    #[error("Invalid depth request: {0}")]
    InvalidDepthRequest(String),

    #[error("Fetch failure: {0}")]
    FetchFailure(String),

    #[error("Ingestion error: {0}")]
    IngestionError(String),

    #[error("Cancelled by user: {0}")]
    UserCancelled(String),

    #[error("A download is already running for this cloud")]
    DownloadInProgress,

    #[error("Unknown entity: {0}")]
    UnknownEntity(usize),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error means the operation was abandoned on purpose
    /// rather than failing.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::UserCancelled(_))
    }
}
