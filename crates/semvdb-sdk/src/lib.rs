//! Qdrant REST client for semantic-vdb.
//!
//! The collection is expected to hold one named dense vector and one named
//! sparse vector per point, plus a JSON payload. [`Client`] implements
//! [`semvdb_core::VectorBackend`] on top of the points search, batch search
//! and retrieve endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use semvdb_core::{Candidate, PointId, Record, SparseVector, VectorBackend};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

pub mod error;
pub mod wire;

pub use error::ClientError;
use wire::{
    NamedVector, RetrieveRequest, RetrievedPoint, ScoredHit, SearchBatchRequest, SearchRequest,
    VectorData,
};

pub const DEFAULT_DENSE_VECTOR: &str = "text-dense";
pub const DEFAULT_SPARSE_VECTOR: &str = "text-sparse";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    pub collection: String,
    pub dense_vector: String,
    pub sparse_vector: String,
    /// Sent as the `api-key` header
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            collection: collection.into(),
            dense_vector: DEFAULT_DENSE_VECTOR.to_string(),
            sparse_vector: DEFAULT_SPARSE_VECTOR.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_vector_names(
        mut self,
        dense: impl Into<String>,
        sparse: impl Into<String>,
    ) -> Self {
        self.dense_vector = dense.into();
        self.sparse_vector = sparse.into();
        self
    }
}

pub struct Client {
    http: reqwest::Client,
    base: String,
    config: ClientConfig,
}

impl Client {
    pub fn new(url: impl Into<String>, collection: impl Into<String>) -> Result<Self> {
        Self::with_config(ClientConfig::new(url, collection))
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        let base = config.url.trim_end_matches('/').to_string();
        Ok(Self { http, base, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base, path));
        match &self.config.api_key {
            Some(key) => req.header("api-key", key),
            None => req,
        }
    }

    fn points_path(&self, suffix: &str) -> String {
        format!("/collections/{}/points{}", self.config.collection, suffix)
    }

    async fn call<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self.request(Method::POST, path).json(body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: wire::error_message(&text),
            });
        }
        let envelope: wire::Response<T> = serde_json::from_str(&text)?;
        if let Some(time) = envelope.time {
            debug!(path, server_time = time, "qdrant call finished");
        }
        Ok(envelope.result)
    }

    fn dense_search<'a>(&'a self, vector: &'a [f64], limit: usize) -> SearchRequest<'a> {
        SearchRequest {
            vector: NamedVector {
                name: &self.config.dense_vector,
                vector: VectorData::Dense(vector),
            },
            limit,
            with_payload: false,
        }
    }

    fn sparse_search<'a>(&'a self, vector: &'a SparseVector, limit: usize) -> SearchRequest<'a> {
        SearchRequest {
            vector: NamedVector {
                name: &self.config.sparse_vector,
                vector: VectorData::Sparse(vector),
            },
            limit,
            with_payload: false,
        }
    }

    /// Nearest neighbours by the named dense vector.
    pub async fn search_dense(&self, vector: &[f64], limit: usize) -> Result<Vec<Candidate>> {
        let hits: Vec<ScoredHit> = self
            .call(&self.points_path("/search"), &self.dense_search(vector, limit))
            .await?;
        Ok(hits.into_iter().map(Candidate::from).collect())
    }

    /// Nearest neighbours by the named sparse vector.
    ///
    /// An empty query vector matches nothing and is not sent.
    pub async fn search_sparse(
        &self,
        vector: &SparseVector,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        if vector.is_empty() {
            return Ok(Vec::new());
        }
        let hits: Vec<ScoredHit> = self
            .call(&self.points_path("/search"), &self.sparse_search(vector, limit))
            .await?;
        Ok(hits.into_iter().map(Candidate::from).collect())
    }

    /// Dense and sparse search in one batched request.
    pub async fn search_batch(
        &self,
        dense: &[f64],
        sparse: &SparseVector,
        limit: usize,
    ) -> Result<(Vec<Candidate>, Vec<Candidate>)> {
        if sparse.is_empty() {
            return Ok((self.search_dense(dense, limit).await?, Vec::new()));
        }
        let body = SearchBatchRequest {
            searches: vec![
                self.dense_search(dense, limit),
                self.sparse_search(sparse, limit),
            ],
        };
        let lists: Vec<Vec<ScoredHit>> = self
            .call(&self.points_path("/search/batch"), &body)
            .await?;
        let got = lists.len();
        let mut lists = lists.into_iter();
        match (lists.next(), lists.next(), lists.next()) {
            (Some(dense_hits), Some(sparse_hits), None) => Ok((
                dense_hits.into_iter().map(Candidate::from).collect(),
                sparse_hits.into_iter().map(Candidate::from).collect(),
            )),
            _ => Err(ClientError::BatchShape { expected: 2, got }),
        }
    }

    /// Points with payload and without vectors. Unknown ids are omitted.
    pub async fn retrieve(&self, ids: &[PointId]) -> Result<Vec<Record>> {
        let body = RetrieveRequest {
            ids,
            with_payload: true,
            with_vector: false,
        };
        let points: Vec<RetrievedPoint> = self.call(&self.points_path(""), &body).await?;
        Ok(points.into_iter().map(Record::from).collect())
    }

    /// Liveness probe of the Qdrant node.
    pub async fn health(&self) -> Result<()> {
        let resp = self.request(Method::GET, "/healthz").send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let text = resp.text().await?;
        Err(ClientError::Status {
            status: status.as_u16(),
            message: wire::error_message(&text),
        })
    }
}

#[async_trait]
impl VectorBackend for Client {
    async fn search_dense(
        &self,
        vector: &[f64],
        top_k: usize,
    ) -> semvdb_core::Result<Vec<Candidate>> {
        Ok(Client::search_dense(self, vector, top_k).await?)
    }

    async fn search_sparse(
        &self,
        vector: &SparseVector,
        top_k: usize,
    ) -> semvdb_core::Result<Vec<Candidate>> {
        Ok(Client::search_sparse(self, vector, top_k).await?)
    }

    async fn search_hybrid(
        &self,
        dense: &[f64],
        sparse: &SparseVector,
        top_k: usize,
    ) -> semvdb_core::Result<(Vec<Candidate>, Vec<Candidate>)> {
        Ok(self.search_batch(dense, sparse, top_k).await?)
    }

    async fn retrieve(&self, ids: &[PointId]) -> semvdb_core::Result<Vec<Record>> {
        Ok(Client::retrieve(self, ids).await?)
    }
}
