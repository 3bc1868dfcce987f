//! Core retrieval logic for semantic-vdb.
//!
//! Dense and sparse nearest-neighbour results are fused into one ranking, and
//! repeated neighbour queries grow a bounded, undirected similarity graph over
//! point identifiers. The vector store and the encoders are collaborators
//! reached through [`VectorBackend`] and [`QueryEncoder`].

pub mod backend;
pub mod config;
pub mod error;
pub mod fusion;
pub mod graph;
pub mod memory;
pub mod search;
pub mod types;

pub use backend::{QueryEncoder, VectorBackend};
pub use config::{GraphParams, SearchParams, SearcherConfig};
pub use error::{Error, Result};
pub use graph::{Edge, SimilarityGraph};
pub use search::Searcher;
pub use types::{Candidate, Payload, PointId, Record, ScoredPoint, SearchResults, SparseVector};

/// Similarity score as reported by the vector store or produced by fusion.
pub type Score = f64;

#[cfg(test)]
mod tests;
