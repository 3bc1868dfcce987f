//! Capabilities the core consumes from its collaborators.

use async_trait::async_trait;

use crate::{Candidate, PointId, Record, Result, SparseVector};

/// Vector store with a dense and a sparse named vector field.
///
/// Search calls return at most `top_k` candidates ordered by descending score.
/// `retrieve` returns full records in no particular order; ids that do not
/// exist are simply absent from the output.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn search_dense(&self, vector: &[f64], top_k: usize) -> Result<Vec<Candidate>>;

    async fn search_sparse(&self, vector: &SparseVector, top_k: usize) -> Result<Vec<Candidate>>;

    /// Runs the dense and the sparse search for one query.
    ///
    /// Backends that can batch both requests into one round trip should
    /// override this.
    async fn search_hybrid(
        &self,
        dense: &[f64],
        sparse: &SparseVector,
        top_k: usize,
    ) -> Result<(Vec<Candidate>, Vec<Candidate>)> {
        let dense_hits = self.search_dense(dense, top_k).await?;
        let sparse_hits = self.search_sparse(sparse, top_k).await?;
        Ok((dense_hits, sparse_hits))
    }

    async fn retrieve(&self, ids: &[PointId]) -> Result<Vec<Record>>;
}

/// Maps query text to the two vector representations.
///
/// Both encodings must be deterministic for a fixed text.
#[async_trait]
pub trait QueryEncoder: Send + Sync {
    async fn encode_dense(&self, text: &str) -> Result<Vec<f64>>;

    fn encode_sparse(&self, text: &str) -> Result<SparseVector>;
}
