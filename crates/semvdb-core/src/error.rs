//! Error taxonomy for search and graph expansion.

use thiserror::Error;

use crate::PointId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Caller passed an out-of-range parameter
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Graph expansion takes exactly one seed
    #[error("Expected exactly one seed id, got {0}")]
    SeedCount(usize),
    /// Seed point does not exist in the store
    #[error("Point {0} not found")]
    NotFound(PointId),
    /// Payload has no text to expand from
    #[error("Point {id} has no text field `{field}` in its payload")]
    MissingText { id: PointId, field: String },
    /// Vector store failed or is unreachable
    #[error("Vector store error: {0}")]
    Backend(String),
    /// Embedding model or sparse encoder failed
    #[error("Encoder error: {0}")]
    Encoder(String),
}

impl Error {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }

    pub fn encoder(err: impl std::fmt::Display) -> Self {
        Self::Encoder(err.to_string())
    }
}
