use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Qdrant answered with a non-success status
    #[error("Qdrant returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Body did not match the expected schema
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    /// Batch answer with a different number of result lists than searches sent
    #[error("Expected {expected} result lists, got {got}")]
    BatchShape { expected: usize, got: usize },
}

impl From<ClientError> for semvdb_core::Error {
    fn from(err: ClientError) -> Self {
        semvdb_core::Error::backend(err)
    }
}
