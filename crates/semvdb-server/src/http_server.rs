use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use semvdb_core::{
    Error, GraphParams, PointId, QueryEncoder, SearchParams, SearchResults, Searcher,
    SimilarityGraph, VectorBackend,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub const DEFAULT_SEARCH_TOP_K: usize = 20;
pub const DEFAULT_GRAPH_TOP_K: usize = 20;
pub const DEFAULT_GRAPH_SIZE: usize = 15;
pub const DEFAULT_GRAPH_THRESHOLD: f64 = 0.1;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default = "default_search_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    pub key: String,
    #[serde(default = "default_graph_top_k")]
    pub top_k: usize,
    /// Node budget
    #[serde(rename = "N", default = "default_graph_size")]
    pub n: usize,
    #[serde(alias = "threshold", default = "default_graph_threshold")]
    pub treshold: f64,
}

fn default_search_top_k() -> usize {
    DEFAULT_SEARCH_TOP_K
}

fn default_graph_top_k() -> usize {
    DEFAULT_GRAPH_TOP_K
}

fn default_graph_size() -> usize {
    DEFAULT_GRAPH_SIZE
}

fn default_graph_threshold() -> f64 {
    DEFAULT_GRAPH_THRESHOLD
}

impl SearchQuery {
    /// Hybrid, unthresholded: what the search page expects.
    pub fn params(&self) -> SearchParams {
        SearchParams {
            top_k: self.top_k,
            threshold: None,
            hybrid: true,
        }
    }
}

impl GraphQuery {
    pub fn seed(&self) -> PointId {
        match self.key.parse() {
            Ok(id) => id,
            Err(never) => match never {},
        }
    }

    pub fn params(&self) -> GraphParams {
        GraphParams {
            top_k: self.top_k,
            target_size: self.n,
            threshold: Some(self.treshold),
            hybrid: false,
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadQuery(String),
    Search(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Search(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadQuery(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadQuery(_) => StatusCode::BAD_REQUEST,
            Self::Search(err) => match err {
                Error::InvalidArgument(_) | Error::SeedCount(_) => StatusCode::BAD_REQUEST,
                Error::NotFound(_) => StatusCode::NOT_FOUND,
                Error::MissingText { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                Error::Backend(_) | Error::Encoder(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::BadQuery(msg) => msg,
            Self::Search(err) => err.to_string(),
        };
        if status.is_server_error() {
            warn!(%status, error = %message, "request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type Shared<B, E> = Arc<Searcher<B, E>>;

async fn search<B, E>(
    State(searcher): State<Shared<B, E>>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<SearchResults>, ApiError>
where
    B: VectorBackend + 'static,
    E: QueryEncoder + 'static,
{
    let Query(query) = query?;
    let results = searcher.search(&query.query, &query.params()).await?;
    Ok(Json(results))
}

async fn graph<B, E>(
    State(searcher): State<Shared<B, E>>,
    query: Result<Query<GraphQuery>, QueryRejection>,
) -> Result<Json<SimilarityGraph>, ApiError>
where
    B: VectorBackend + 'static,
    E: QueryEncoder + 'static,
{
    let Query(query) = query?;
    let graph = searcher
        .retrieve_graph(&[query.seed()], &query.params())
        .await?;
    Ok(Json(graph))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({}))
}

pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.iter().any(|origin| origin.trim() == "*") {
        bail!("Wildcard CORS origin `*` cannot be used with credentials; list origins explicitly");
    }
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin {origin:?}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

pub fn router<B, E>(searcher: Shared<B, E>, cors: CorsLayer) -> Router
where
    B: VectorBackend + 'static,
    E: QueryEncoder + 'static,
{
    Router::new()
        .route("/api/search", get(search::<B, E>))
        .route("/api/graph", get(graph::<B, E>))
        .route("/api/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(searcher)
}

pub async fn serve(app: Router, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "HTTP API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
