//! JSON bodies of the Qdrant points API.

use semvdb_core::{Candidate, Payload, PointId, Record, Score, SparseVector};
use serde::{Deserialize, Serialize};

/// Query vector addressed to one named vector field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedVector<'a> {
    pub name: &'a str,
    pub vector: VectorData<'a>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VectorData<'a> {
    Dense(&'a [f64]),
    Sparse(&'a SparseVector),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest<'a> {
    pub vector: NamedVector<'a>,
    pub limit: usize,
    pub with_payload: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchBatchRequest<'a> {
    pub searches: Vec<SearchRequest<'a>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrieveRequest<'a> {
    pub ids: &'a [PointId],
    pub with_payload: bool,
    pub with_vector: bool,
}

/// Envelope around every successful response.
#[derive(Debug, Clone, Deserialize)]
pub struct Response<T> {
    pub result: T,
    #[serde(default)]
    pub time: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoredHit {
    pub id: PointId,
    pub score: Score,
}

impl From<ScoredHit> for Candidate {
    fn from(hit: ScoredHit) -> Self {
        Candidate {
            id: hit.id,
            score: hit.score,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievedPoint {
    pub id: PointId,
    #[serde(default)]
    pub payload: Option<Payload>,
}

impl From<RetrievedPoint> for Record {
    fn from(point: RetrievedPoint) -> Self {
        Record {
            id: point.id,
            payload: point.payload.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorStatus {
    error: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    status: ErrorStatus,
}

/// Message of a Qdrant error body, or the raw body when it has another shape.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|err| err.status.error)
        .unwrap_or_else(|_| body.to_string())
}
