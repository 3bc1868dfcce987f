//! Brute-force in-memory collaborators.
//!
//! `MemoryBackend` scores every stored point on each query (cosine for the
//! dense field, dot product for the sparse field). `LookupEncoder` maps known
//! texts to fixed encodings. Both suit tests and small offline collections.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::{
    Candidate, Error, Payload, PointId, QueryEncoder, Record, Result, Score, SparseVector,
    VectorBackend,
};

#[derive(Debug, Clone)]
struct StoredPoint {
    id: PointId,
    dense: Vec<f64>,
    sparse: SparseVector,
    payload: Payload,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    points: Vec<StoredPoint>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a point.
    pub fn upsert(
        &mut self,
        id: PointId,
        dense: Vec<f64>,
        sparse: SparseVector,
        payload: Payload,
    ) {
        self.points.retain(|p| p.id != id);
        self.points.push(StoredPoint {
            id,
            dense,
            sparse,
            payload,
        });
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn top_k(mut scored: Vec<Candidate>, top_k: usize) -> Vec<Candidate> {
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        scored
    }
}

pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Score {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Dot product over shared indices; `None` when no index is shared.
pub fn sparse_dot(a: &SparseVector, b: &SparseVector) -> Option<Score> {
    let lookup: HashMap<u32, f32> = b
        .indices
        .iter()
        .copied()
        .zip(b.values.iter().copied())
        .collect();
    let mut overlap = false;
    let mut sum = 0.0;
    for (idx, val) in a.indices.iter().zip(&a.values) {
        if let Some(other) = lookup.get(idx) {
            overlap = true;
            sum += f64::from(*val) * f64::from(*other);
        }
    }
    overlap.then_some(sum)
}

#[async_trait]
impl VectorBackend for MemoryBackend {
    async fn search_dense(&self, vector: &[f64], top_k: usize) -> Result<Vec<Candidate>> {
        let scored = self
            .points
            .iter()
            .filter(|p| p.dense.len() == vector.len())
            .map(|p| Candidate {
                id: p.id.clone(),
                score: cosine_similarity(&p.dense, vector),
            })
            .collect();
        Ok(Self::top_k(scored, top_k))
    }

    async fn search_sparse(&self, vector: &SparseVector, top_k: usize) -> Result<Vec<Candidate>> {
        let scored = self
            .points
            .iter()
            .filter_map(|p| {
                sparse_dot(&p.sparse, vector).map(|score| Candidate {
                    id: p.id.clone(),
                    score,
                })
            })
            .collect();
        Ok(Self::top_k(scored, top_k))
    }

    async fn retrieve(&self, ids: &[PointId]) -> Result<Vec<Record>> {
        let wanted: HashSet<&PointId> = ids.iter().collect();
        Ok(self
            .points
            .iter()
            .filter(|p| wanted.contains(&p.id))
            .map(|p| Record {
                id: p.id.clone(),
                payload: p.payload.clone(),
            })
            .collect())
    }
}

/// Encoder backed by a fixed table of texts.
#[derive(Debug, Clone, Default)]
pub struct LookupEncoder {
    entries: HashMap<String, (Vec<f64>, SparseVector)>,
}

impl LookupEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, text: impl Into<String>, dense: Vec<f64>, sparse: SparseVector) {
        self.entries.insert(text.into(), (dense, sparse));
    }

    fn lookup(&self, text: &str) -> Result<&(Vec<f64>, SparseVector)> {
        self.entries
            .get(text)
            .ok_or_else(|| Error::Encoder(format!("No encoding registered for {text:?}")))
    }
}

#[async_trait]
impl QueryEncoder for LookupEncoder {
    async fn encode_dense(&self, text: &str) -> Result<Vec<f64>> {
        self.lookup(text).map(|(dense, _)| dense.clone())
    }

    fn encode_sparse(&self, text: &str) -> Result<SparseVector> {
        self.lookup(text).map(|(_, sparse)| sparse.clone())
    }
}
