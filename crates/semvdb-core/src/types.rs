use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::Score;

/// Stored point payload: an arbitrary JSON object.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Identifier of a stored point.
///
/// The store accepts unsigned integers and UUID strings. Numeric ids sort
/// before string ids, which gives every pair of ids a canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Uuid(s) => f.write_str(s),
        }
    }
}

impl FromStr for PointId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<u64>()
            .map_or_else(|_| Self::Uuid(s.to_string()), Self::Num))
    }
}

impl From<u64> for PointId {
    fn from(n: u64) -> Self {
        Self::Num(n)
    }
}

impl From<&str> for PointId {
    fn from(s: &str) -> Self {
        Self::Uuid(s.to_string())
    }
}

/// One hit of a single-modality search, ordered by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: PointId,
    pub score: Score,
}

impl Candidate {
    pub fn new(id: impl Into<PointId>, score: Score) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// A stored point as returned by retrieve-by-id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: PointId,
    #[serde(default)]
    pub payload: Payload,
}

/// Sparse (index, weight) representation of a text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn new(indices: Vec<u32>, values: Vec<f32>) -> Result<Self, String> {
        if indices.len() != values.len() {
            return Err(format!(
                "Sparse vector length mismatch: {} indices vs {} values",
                indices.len(),
                values.len()
            ));
        }
        Ok(Self { indices, values })
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// A ranked search hit with its retrieved payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPoint {
    #[serde(skip_serializing)]
    pub id: PointId,
    pub score: Score,
    pub payload: Payload,
}

/// Result of [`Searcher::search`](crate::Searcher::search).
///
/// Hits are kept ordered by descending score. Serialized as a JSON object
/// keyed by point id, each value carrying `score` and `payload`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    hits: Vec<ScoredPoint>,
}

impl SearchResults {
    /// Sorts `hits` by descending score. Ties keep their input order.
    pub fn from_hits(mut hits: Vec<ScoredPoint>) -> Self {
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self { hits }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn get(&self, id: &PointId) -> Option<&ScoredPoint> {
        self.hits.iter().find(|hit| &hit.id == id)
    }

    pub fn contains(&self, id: &PointId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredPoint> {
        self.hits.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &PointId> {
        self.hits.iter().map(|hit| &hit.id)
    }

    pub fn truncate(&mut self, len: usize) {
        self.hits.truncate(len);
    }
}

impl<'a> IntoIterator for &'a SearchResults {
    type Item = &'a ScoredPoint;
    type IntoIter = std::slice::Iter<'a, ScoredPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}

impl Serialize for SearchResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.hits.len()))?;
        for hit in &self.hits {
            map.serialize_entry(&hit.id, hit)?;
        }
        map.end()
    }
}
