use std::sync::Arc;

use async_trait::async_trait;
use semvdb_core::{Error, QueryEncoder, Result, SparseVector};

use crate::{Bm25Encoder, Vectorizer};

/// Dense model plus BM25, exposed as a single query encoder.
pub struct HybridEncoder {
    dense: Arc<dyn Vectorizer>,
    sparse: Bm25Encoder,
}

impl HybridEncoder {
    pub fn new(dense: Arc<dyn Vectorizer>, sparse: Bm25Encoder) -> Self {
        Self { dense, sparse }
    }
}

#[async_trait]
impl QueryEncoder for HybridEncoder {
    async fn encode_dense(&self, text: &str) -> Result<Vec<f64>> {
        let mut vectors = self
            .dense
            .vectorize(vec![text.to_string()])
            .await
            .map_err(Error::encoder)?;
        match vectors.pop() {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(Error::Encoder("Dense model returned no vector".to_string())),
        }
    }

    // Stored sparse vectors were produced by the document encoding, and
    // queries go through the same path.
    fn encode_sparse(&self, text: &str) -> Result<SparseVector> {
        Ok(self.sparse.encode_document(text))
    }
}
