//! Similarity-graph expansion from a single seed point.
//!
//! The graph is an arena of point ids plus a set of canonical undirected
//! edges. Expansion is breadth-first under a hard node budget, followed by a
//! closure pass that links nodes discovered along different paths.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use serde::Serialize;
use tracing::{debug, info};

use crate::{Error, GraphParams, Payload, PointId, QueryEncoder, Result, Searcher, VectorBackend};

/// Undirected edge stored with its endpoints in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Edge(PointId, PointId);

impl Edge {
    /// Canonical edge between `a` and `b`, or `None` for a self-loop.
    pub fn new(a: PointId, b: PointId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self(a, b)),
            std::cmp::Ordering::Greater => Some(Self(b, a)),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn endpoints(&self) -> (&PointId, &PointId) {
        (&self.0, &self.1)
    }

    pub fn touches(&self, id: &PointId) -> bool {
        &self.0 == id || &self.1 == id
    }
}

/// Nodes, their payloads, and the undirected edges between them.
///
/// Every edge endpoint is a node, no edge is a self-loop, and each unordered
/// pair is stored once.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimilarityGraph {
    nodes: Vec<PointId>,
    node_data: BTreeMap<PointId, Payload>,
    edges: BTreeSet<Edge>,
}

impl SimilarityGraph {
    pub fn with_seed(seed: PointId, payload: Payload) -> Self {
        let mut graph = Self::default();
        graph.add_node(seed, payload);
        graph
    }

    /// Adds a node; returns false if it was already present.
    pub fn add_node(&mut self, id: PointId, payload: Payload) -> bool {
        if self.node_data.contains_key(&id) {
            return false;
        }
        self.nodes.push(id.clone());
        self.node_data.insert(id, payload);
        true
    }

    /// Adds the edge `{a, b}`; returns false for self-loops, unknown
    /// endpoints, and edges already present in either orientation.
    pub fn add_edge(&mut self, a: &PointId, b: &PointId) -> bool {
        if !self.contains(a) || !self.contains(b) {
            return false;
        }
        match Edge::new(a.clone(), b.clone()) {
            Some(edge) => self.edges.insert(edge),
            None => false,
        }
    }

    pub fn contains(&self, id: &PointId) -> bool {
        self.node_data.contains_key(id)
    }

    pub fn contains_edge(&self, a: &PointId, b: &PointId) -> bool {
        Edge::new(a.clone(), b.clone()).is_some_and(|edge| self.edges.contains(&edge))
    }

    /// Nodes in discovery order, seed first.
    pub fn nodes(&self) -> &[PointId] {
        &self.nodes
    }

    pub fn node_data(&self) -> &BTreeMap<PointId, Payload> {
        &self.node_data
    }

    pub fn payload(&self, id: &PointId) -> Option<&Payload> {
        self.node_data.get(id)
    }

    pub fn edges(&self) -> &BTreeSet<Edge> {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

impl<B: VectorBackend, E: QueryEncoder> Searcher<B, E> {
    /// Grows a similarity graph around exactly one seed.
    ///
    /// Each dequeued node's text is searched and unseen hits join the graph
    /// linked to their discoverer, until `target_size` nodes exist or the
    /// queue runs dry. A closure pass then adds edges between any two nodes
    /// where one appears in the other's hits. A neighbourhood too sparse to
    /// reach `target_size` yields a smaller graph, not an error.
    pub async fn retrieve_graph(
        &self,
        seeds: &[PointId],
        params: &GraphParams,
    ) -> Result<SimilarityGraph> {
        let [seed] = seeds else {
            return Err(Error::SeedCount(seeds.len()));
        };
        params.validate()?;
        let search_params = params.neighbour_search();

        let payload = self.retrieve_one(seed).await?;
        let mut graph = SimilarityGraph::with_seed(seed.clone(), payload);
        let mut queue = VecDeque::from([seed.clone()]);
        // Hit lists of expanded nodes, reused by the closure pass
        let mut neighbours: HashMap<PointId, Vec<PointId>> = HashMap::new();

        while graph.node_count() < params.target_size {
            let Some(current) = queue.pop_front() else {
                break;
            };
            let text = self.node_text(&graph, &current)?;
            let results = self.search(&text, &search_params).await?;
            neighbours.insert(current.clone(), results.ids().cloned().collect());

            for hit in &results {
                if hit.id == current || graph.contains(&hit.id) {
                    continue;
                }
                graph.add_node(hit.id.clone(), hit.payload.clone());
                graph.add_edge(&current, &hit.id);
                queue.push_back(hit.id.clone());

                if graph.node_count() >= params.target_size {
                    break;
                }
            }
        }
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "breadth-first expansion finished"
        );

        let nodes = graph.nodes().to_vec();
        for node in &nodes {
            let hits = match neighbours.remove(node) {
                Some(hits) => hits,
                None => {
                    let text = self.node_text(&graph, node)?;
                    self.search(&text, &search_params)
                        .await?
                        .ids()
                        .cloned()
                        .collect()
                }
            };
            // add_edge ignores hits outside the graph
            for hit in &hits {
                graph.add_edge(node, hit);
            }
        }

        info!(
            seed = %seed,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "similarity graph built"
        );
        Ok(graph)
    }

    fn node_text(&self, graph: &SimilarityGraph, id: &PointId) -> Result<String> {
        let payload = graph
            .payload(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        self.text_of(id, payload).map(str::to_owned)
    }
}
