use std::collections::HashMap;

use tracing::debug;

use crate::fusion;
use crate::{
    Candidate, Error, Payload, PointId, QueryEncoder, Result, ScoredPoint, SearchParams,
    SearchResults, SearcherConfig, VectorBackend,
};

/// Runs hybrid searches and graph expansions against one collection.
///
/// Holds no per-request state, so one instance can serve concurrent requests.
pub struct Searcher<B, E> {
    pub(crate) backend: B,
    pub(crate) encoder: E,
    pub(crate) config: SearcherConfig,
}

impl<B: VectorBackend, E: QueryEncoder> Searcher<B, E> {
    pub fn new(backend: B, encoder: E) -> Self {
        Self::with_config(backend, encoder, SearcherConfig::default())
    }

    pub fn with_config(backend: B, encoder: E, config: SearcherConfig) -> Self {
        Self {
            backend,
            encoder,
            config,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &SearcherConfig {
        &self.config
    }

    /// Searches for the points nearest to `query`.
    ///
    /// In hybrid mode the dense and sparse rankings are fused; otherwise the
    /// dense ranking is used as returned by the store. Payloads are fetched in
    /// one bulk retrieve, hits below the threshold are dropped, and at most
    /// `top_k` hits remain.
    pub async fn search(&self, query: &str, params: &SearchParams) -> Result<SearchResults> {
        params.validate()?;

        let dense = self.encoder.encode_dense(query).await?;
        let ranked = if params.hybrid {
            let sparse = self.encoder.encode_sparse(query)?;
            let (dense_hits, sparse_hits) = self
                .backend
                .search_hybrid(&dense, &sparse, params.top_k)
                .await?;
            debug!(
                dense = dense_hits.len(),
                sparse = sparse_hits.len(),
                "fusing hybrid results"
            );
            fusion::fuse(&dense_hits, &sparse_hits)
        } else {
            fusion::passthrough(self.backend.search_dense(&dense, params.top_k).await?)
        };

        let mut hits = self.attach_payloads(ranked).await?;
        if let Some(threshold) = params.threshold {
            hits.retain(|hit| hit.score >= threshold);
        }

        let mut results = SearchResults::from_hits(hits);
        results.truncate(params.top_k);
        Ok(results)
    }

    /// Retrieves payloads for every ranked id and re-associates them by id.
    ///
    /// Ids the store does not return are dropped. Output keeps ranking order.
    async fn attach_payloads(&self, ranked: Vec<Candidate>) -> Result<Vec<ScoredPoint>> {
        if ranked.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<PointId> = ranked.iter().map(|c| c.id.clone()).collect();
        let mut payloads: HashMap<PointId, Payload> = self
            .backend
            .retrieve(&ids)
            .await?
            .into_iter()
            .map(|record| (record.id, record.payload))
            .collect();

        Ok(ranked
            .into_iter()
            .filter_map(|c| {
                payloads.remove(&c.id).map(|payload| ScoredPoint {
                    id: c.id,
                    score: c.score,
                    payload,
                })
            })
            .collect())
    }

    /// Fetches one point's payload.
    pub async fn retrieve_one(&self, id: &PointId) -> Result<Payload> {
        self.backend
            .retrieve(std::slice::from_ref(id))
            .await?
            .into_iter()
            .find(|record| &record.id == id)
            .map(|record| record.payload)
            .ok_or_else(|| Error::NotFound(id.clone()))
    }

    /// Text of a payload used as the expansion query.
    pub(crate) fn text_of<'p>(&self, id: &PointId, payload: &'p Payload) -> Result<&'p str> {
        payload
            .get(&self.config.text_field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::MissingText {
                id: id.clone(),
                field: self.config.text_field.clone(),
            })
    }
}
