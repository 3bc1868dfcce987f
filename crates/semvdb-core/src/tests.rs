use super::*;

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Backend answering each query from a fixed script.
///
/// Queries are identified by the first component of the dense vector (or the
/// first sparse index), which `ScriptedEncoder` sets to the text's code.
#[derive(Default)]
struct ScriptedBackend {
    dense: HashMap<u64, Vec<Candidate>>,
    sparse: HashMap<u64, Vec<Candidate>>,
    records: HashMap<PointId, Payload>,
    searches: AtomicUsize,
    retrieves: AtomicUsize,
    offline: bool,
}

impl ScriptedBackend {
    fn point(mut self, id: u64, text: &str) -> Self {
        self.records.insert(PointId::Num(id), lyrics(text));
        self
    }

    fn dense_hits(mut self, code: u64, hits: &[(u64, f64)]) -> Self {
        self.dense.insert(code, candidates(hits));
        self
    }

    fn sparse_hits(mut self, code: u64, hits: &[(u64, f64)]) -> Self {
        self.sparse.insert(code, candidates(hits));
        self
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            return Err(Error::Backend("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorBackend for ScriptedBackend {
    async fn search_dense(&self, vector: &[f64], top_k: usize) -> Result<Vec<Candidate>> {
        self.check_online()?;
        self.searches.fetch_add(1, Ordering::SeqCst);
        let code = vector[0] as u64;
        let mut hits = self.dense.get(&code).cloned().unwrap_or_default();
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn search_sparse(&self, vector: &SparseVector, top_k: usize) -> Result<Vec<Candidate>> {
        self.check_online()?;
        let code = u64::from(vector.indices[0]);
        let mut hits = self.sparse.get(&code).cloned().unwrap_or_default();
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn retrieve(&self, ids: &[PointId]) -> Result<Vec<Record>> {
        self.check_online()?;
        self.retrieves.fetch_add(1, Ordering::SeqCst);
        // Reverse to make sure callers re-associate by id
        Ok(ids
            .iter()
            .rev()
            .filter_map(|id| {
                self.records.get(id).map(|payload| Record {
                    id: id.clone(),
                    payload: payload.clone(),
                })
            })
            .collect())
    }
}

#[derive(Default)]
struct ScriptedEncoder {
    codes: HashMap<String, u64>,
}

impl ScriptedEncoder {
    fn text(mut self, text: &str, code: u64) -> Self {
        self.codes.insert(text.to_string(), code);
        self
    }

    fn code(&self, text: &str) -> Result<u64> {
        self.codes
            .get(text)
            .copied()
            .ok_or_else(|| Error::Encoder(format!("unknown text {text}")))
    }
}

#[async_trait]
impl QueryEncoder for ScriptedEncoder {
    async fn encode_dense(&self, text: &str) -> Result<Vec<f64>> {
        Ok(vec![self.code(text)? as f64])
    }

    fn encode_sparse(&self, text: &str) -> Result<SparseVector> {
        Ok(SparseVector {
            indices: vec![self.code(text)? as u32],
            values: vec![1.0],
        })
    }
}

fn lyrics(text: &str) -> Payload {
    json!({ "lyrics": text, "title": format!("song {text}") })
        .as_object()
        .cloned()
        .unwrap()
}

fn candidates(hits: &[(u64, f64)]) -> Vec<Candidate> {
    hits.iter().map(|&(id, score)| Candidate::new(id, score)).collect()
}

fn id(n: u64) -> PointId {
    PointId::Num(n)
}

fn dense_only(top_k: usize, threshold: Option<f64>) -> SearchParams {
    SearchParams {
        top_k,
        threshold,
        hybrid: false,
    }
}

fn graph_params(top_k: usize, target_size: usize) -> GraphParams {
    GraphParams {
        top_k,
        target_size,
        threshold: None,
        hybrid: false,
    }
}

#[tokio::test]
async fn test_search_threshold_drops_and_sorts() {
    let backend = ScriptedBackend::default()
        .point(1, "a")
        .point(2, "b")
        .point(3, "c")
        .dense_hits(9, &[(1, 0.9), (2, 0.7), (3, 0.95)]);
    let encoder = ScriptedEncoder::default().text("x", 9);
    let searcher = Searcher::new(backend, encoder);

    let results = searcher.search("x", &dense_only(5, Some(0.8))).await.unwrap();

    let ids: Vec<_> = results.ids().cloned().collect();
    assert_eq!(ids, vec![id(3), id(1)]);
    assert!((results.get(&id(3)).unwrap().score - 0.95).abs() < 1e-12);
    assert_eq!(results.get(&id(1)).unwrap().payload["lyrics"], "a");
}

#[tokio::test]
async fn test_search_threshold_is_inclusive() {
    let backend = ScriptedBackend::default()
        .point(1, "a")
        .point(2, "b")
        .dense_hits(9, &[(1, 0.8), (2, 0.79)]);
    let searcher = Searcher::new(backend, ScriptedEncoder::default().text("x", 9));

    let results = searcher.search("x", &dense_only(5, Some(0.8))).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results.contains(&id(1)));
}

#[tokio::test]
async fn test_search_hybrid_fuses_modalities() {
    let backend = ScriptedBackend::default()
        .point(1, "a")
        .point(2, "b")
        .point(3, "c")
        .dense_hits(9, &[(1, 0.9), (2, 0.6), (3, 0.3)])
        .sparse_hits(9, &[(1, 14.0), (3, 2.0)]);
    let searcher = Searcher::new(backend, ScriptedEncoder::default().text("q", 9));

    let params = SearchParams {
        top_k: 3,
        threshold: None,
        hybrid: true,
    };
    let results = searcher.search("q", &params).await.unwrap();

    let hits: Vec<_> = results.iter().map(|h| (h.id.clone(), h.score)).collect();
    assert_eq!(hits[0].0, id(1));
    assert!((hits[0].1 - 1.0).abs() < 1e-12);
    // 2: dense 0.5, sparse missing -> 0.25
    let two = results.get(&id(2)).unwrap();
    assert!((two.score - 0.25).abs() < 1e-12);
    // 3: dense 0.0, sparse 0.0
    assert!(results.get(&id(3)).unwrap().score.abs() < 1e-12);
}

#[tokio::test]
async fn test_search_truncates_fused_union_to_top_k() {
    let backend = ScriptedBackend::default()
        .point(1, "a")
        .point(2, "b")
        .point(3, "c")
        .point(4, "d")
        .dense_hits(9, &[(1, 0.9), (2, 0.8)])
        .sparse_hits(9, &[(3, 5.0), (4, 1.0)]);
    let searcher = Searcher::new(backend, ScriptedEncoder::default().text("q", 9));

    let results = searcher.search("q", &SearchParams::default().with_top_k(2)).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|h| (0.0..=1.0).contains(&h.score)));
}

#[tokio::test]
async fn test_search_drops_ids_missing_from_store() {
    let backend = ScriptedBackend::default()
        .point(1, "a")
        .dense_hits(9, &[(1, 0.9), (404, 0.8)]);
    let searcher = Searcher::new(backend, ScriptedEncoder::default().text("x", 9));

    let results = searcher.search("x", &dense_only(5, None)).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(searcher.backend().retrieves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_search_skips_retrieve_when_nothing_found() {
    let searcher = Searcher::new(
        ScriptedBackend::default(),
        ScriptedEncoder::default().text("x", 9),
    );

    let results = searcher.search("x", &dense_only(5, None)).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(searcher.backend().retrieves.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_search_rejects_zero_top_k() {
    let searcher = Searcher::new(
        ScriptedBackend::default(),
        ScriptedEncoder::default().text("x", 9),
    );
    let err = searcher.search("x", &dense_only(0, None)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn test_search_propagates_backend_failure() {
    let backend = ScriptedBackend {
        offline: true,
        ..Default::default()
    };
    let searcher = Searcher::new(backend, ScriptedEncoder::default().text("x", 9));
    let err = searcher.search("x", &dense_only(5, None)).await.unwrap_err();
    assert!(matches!(err, Error::Backend(_)));
}

#[tokio::test]
async fn test_search_results_serialize_keyed_by_id() {
    let backend = ScriptedBackend::default()
        .point(7, "seven")
        .dense_hits(9, &[(7, 0.5)]);
    let searcher = Searcher::new(backend, ScriptedEncoder::default().text("x", 9));

    let results = searcher.search("x", &dense_only(5, None)).await.unwrap();
    let json = serde_json::to_value(&results).unwrap();
    assert_eq!(json["7"]["score"], 0.5);
    assert_eq!(json["7"]["payload"]["lyrics"], "seven");
}

#[tokio::test]
async fn test_graph_seed_with_two_neighbours() {
    // S=1 "hello" -> [A=2: 0.9, B=3: 0.5]; A's text finds B
    let backend = ScriptedBackend::default()
        .point(1, "hello")
        .point(2, "a")
        .point(3, "b")
        .dense_hits(10, &[(2, 0.9), (3, 0.5)])
        .dense_hits(20, &[(2, 1.0), (3, 0.7)])
        .dense_hits(30, &[(3, 1.0)]);
    let encoder = ScriptedEncoder::default()
        .text("hello", 10)
        .text("a", 20)
        .text("b", 30);
    let searcher = Searcher::new(backend, encoder);

    let graph = searcher
        .retrieve_graph(&[id(1)], &graph_params(2, 3))
        .await
        .unwrap();

    assert_eq!(graph.nodes(), &[id(1), id(2), id(3)]);
    assert!(graph.contains_edge(&id(1), &id(2)));
    assert!(graph.contains_edge(&id(1), &id(3)));
    assert!(graph.contains_edge(&id(2), &id(3)));
    assert_eq!(graph.edge_count(), 3);
    assert_eq!(graph.payload(&id(3)).unwrap()["lyrics"], "b");
    // every node searched exactly once
    assert_eq!(searcher.backend().searches.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_graph_budget_of_one_is_seed_only() {
    let backend = ScriptedBackend::default()
        .point(1, "hello")
        .point(2, "a")
        .dense_hits(10, &[(2, 0.9), (1, 0.8)]);
    let searcher = Searcher::new(backend, ScriptedEncoder::default().text("hello", 10));

    for top_k in [1, 5, 50] {
        let graph = searcher
            .retrieve_graph(&[id(1)], &graph_params(top_k, 1))
            .await
            .unwrap();
        assert_eq!(graph.nodes(), &[id(1)]);
        assert_eq!(graph.edge_count(), 0);
    }
}

#[tokio::test]
async fn test_graph_without_neighbours_is_seed_only() {
    let backend = ScriptedBackend::default().point(1, "hello");
    let searcher = Searcher::new(backend, ScriptedEncoder::default().text("hello", 10));

    let graph = searcher
        .retrieve_graph(&[id(1)], &graph_params(10, 25))
        .await
        .unwrap();
    assert_eq!(graph.nodes(), &[id(1)]);
    assert!(graph.edges().is_empty());
}

#[tokio::test]
async fn test_graph_stops_mid_neighbour_list() {
    let backend = ScriptedBackend::default()
        .point(1, "hello")
        .point(2, "a")
        .point(3, "b")
        .point(4, "c")
        .dense_hits(10, &[(2, 0.9), (3, 0.8), (4, 0.7)]);
    let encoder = ScriptedEncoder::default()
        .text("hello", 10)
        .text("a", 20)
        .text("b", 30);
    let searcher = Searcher::new(backend, encoder);

    let graph = searcher
        .retrieve_graph(&[id(1)], &graph_params(10, 3))
        .await
        .unwrap();
    assert_eq!(graph.node_count(), 3);
    assert!(!graph.contains(&id(4)));
}

#[tokio::test]
async fn test_graph_closure_links_nodes_from_different_paths() {
    // 1 -> {2, 3}; 2 -> {4}; 3 also finds 4 but only after the budget is spent
    let backend = ScriptedBackend::default()
        .point(1, "s")
        .point(2, "a")
        .point(3, "b")
        .point(4, "c")
        .dense_hits(10, &[(2, 0.9), (3, 0.8)])
        .dense_hits(20, &[(4, 0.9)])
        .dense_hits(30, &[(4, 0.6)]);
    let encoder = ScriptedEncoder::default()
        .text("s", 10)
        .text("a", 20)
        .text("b", 30)
        .text("c", 40);
    let searcher = Searcher::new(backend, encoder);

    let graph = searcher
        .retrieve_graph(&[id(1)], &graph_params(10, 4))
        .await
        .unwrap();
    assert_eq!(graph.node_count(), 4);
    assert!(graph.contains_edge(&id(2), &id(4)));
    assert!(graph.contains_edge(&id(3), &id(4)));
    assert_eq!(graph.edge_count(), 4);
}

#[tokio::test]
async fn test_graph_collapses_reverse_discoveries() {
    let backend = ScriptedBackend::default()
        .point(1, "s")
        .point(2, "a")
        .dense_hits(10, &[(2, 0.9)])
        .dense_hits(20, &[(1, 0.9), (2, 0.8)]);
    let encoder = ScriptedEncoder::default().text("s", 10).text("a", 20);
    let searcher = Searcher::new(backend, encoder);

    let graph = searcher
        .retrieve_graph(&[id(1)], &graph_params(10, 5))
        .await
        .unwrap();
    assert_eq!(graph.edge_count(), 1);
    assert!(graph.contains_edge(&id(2), &id(1)));
}

#[tokio::test]
async fn test_graph_requires_exactly_one_seed() {
    let searcher = Searcher::new(ScriptedBackend::default(), ScriptedEncoder::default());

    let err = searcher
        .retrieve_graph(&[id(1), id(2)], &GraphParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SeedCount(2)));

    let err = searcher
        .retrieve_graph(&[], &GraphParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SeedCount(0)));
}

#[tokio::test]
async fn test_graph_rejects_zero_target_size() {
    let searcher = Searcher::new(
        ScriptedBackend::default().point(1, "s"),
        ScriptedEncoder::default(),
    );
    let err = searcher
        .retrieve_graph(&[id(1)], &graph_params(10, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn test_graph_unknown_seed() {
    let searcher = Searcher::new(ScriptedBackend::default(), ScriptedEncoder::default());
    let err = searcher
        .retrieve_graph(&[id(99)], &graph_params(10, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(PointId::Num(99))));
}

#[tokio::test]
async fn test_graph_seed_without_text() {
    let mut backend = ScriptedBackend::default();
    backend.records.insert(id(1), Payload::new());
    let searcher = Searcher::new(backend, ScriptedEncoder::default());

    let err = searcher
        .retrieve_graph(&[id(1)], &graph_params(10, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingText { .. }));
}

#[tokio::test]
async fn test_graph_uses_configured_text_field() {
    let mut backend = ScriptedBackend::default()
        .point(2, "a")
        .dense_hits(10, &[(2, 0.9)]);
    backend
        .records
        .insert(id(1), json!({ "title": "hello" }).as_object().cloned().unwrap());
    let config = SearcherConfig {
        text_field: "title".to_string(),
    };
    let encoder = ScriptedEncoder::default()
        .text("hello", 10)
        .text("song a", 20);
    let searcher = Searcher::with_config(backend, encoder, config);

    let graph = searcher
        .retrieve_graph(&[id(1)], &graph_params(10, 5))
        .await
        .unwrap();
    assert_eq!(graph.nodes(), &[id(1), id(2)]);
}
