use serde::{Deserialize, Serialize};

use crate::{Error, Result, Score};

/// Payload field holding the text used as an expansion query.
pub const DEFAULT_TEXT_FIELD: &str = "lyrics";

/// Searcher-wide settings that do not change per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearcherConfig {
    pub text_field: String,
}

impl Default for SearcherConfig {
    fn default() -> Self {
        Self {
            text_field: DEFAULT_TEXT_FIELD.to_string(),
        }
    }
}

/// Per-request parameters of a search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub top_k: usize,
    /// Hits scoring strictly below this are dropped
    pub threshold: Option<Score>,
    /// Fuse dense and sparse results; dense only when false
    pub hybrid: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: None,
            hybrid: true,
        }
    }
}

impl SearchParams {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidArgument("top_k must be positive".to_string()));
        }
        validate_threshold(self.threshold)
    }
}

/// Per-request parameters of a graph expansion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphParams {
    /// Neighbours requested per expanded node
    pub top_k: usize,
    /// Node budget of the final graph
    pub target_size: usize,
    pub threshold: Option<Score>,
    pub hybrid: bool,
}

impl Default for GraphParams {
    fn default() -> Self {
        Self {
            top_k: 10,
            target_size: 25,
            threshold: Some(0.2),
            hybrid: false,
        }
    }
}

impl GraphParams {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidArgument("top_k must be positive".to_string()));
        }
        if self.target_size == 0 {
            return Err(Error::InvalidArgument(
                "target_size must be positive".to_string(),
            ));
        }
        validate_threshold(self.threshold)
    }

    /// Search parameters used for every neighbour query of the expansion.
    pub fn neighbour_search(&self) -> SearchParams {
        SearchParams {
            top_k: self.top_k,
            threshold: self.threshold,
            hybrid: self.hybrid,
        }
    }
}

fn validate_threshold(threshold: Option<Score>) -> Result<()> {
    match threshold {
        Some(t) if !t.is_finite() => Err(Error::InvalidArgument(format!(
            "threshold must be finite, got {t}"
        ))),
        _ => Ok(()),
    }
}
