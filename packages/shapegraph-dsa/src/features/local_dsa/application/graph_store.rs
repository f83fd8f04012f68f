//! Graph Store
//!
//! Process-wide map procedure name → finished graph. Each procedure is
//! published exactly once; published graphs are immutable and shared.

use crate::errors::{DsaError, Result};
use crate::features::local_dsa::domain::Graph;
use crate::features::local_dsa::ports::ShapeGraphProvider;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Concurrent store of per-procedure memory graphs
#[derive(Debug, Default)]
pub struct GraphStore {
    graphs: DashMap<String, Arc<Graph>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a finished graph under its procedure name
    ///
    /// Fails with `DuplicateGraph` if the procedure was already published.
    pub fn insert(&self, graph: Graph) -> Result<Arc<Graph>> {
        match self.graphs.entry(graph.procedure().to_string()) {
            Entry::Occupied(entry) => Err(DsaError::DuplicateGraph(entry.key().clone())),
            Entry::Vacant(entry) => {
                let graph = Arc::new(graph);
                entry.insert(Arc::clone(&graph));
                Ok(graph)
            }
        }
    }

    pub fn has_graph(&self, procedure: &str) -> bool {
        self.graphs.contains_key(procedure)
    }

    pub fn get_graph(&self, procedure: &str) -> Result<Arc<Graph>> {
        self.graphs
            .get(procedure)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| DsaError::GraphNotFound(procedure.to_string()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// Published procedure names, sorted
    pub fn procedures(&self) -> Vec<String> {
        let mut names: Vec<String> = self.graphs.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl ShapeGraphProvider for GraphStore {
    fn has_graph(&self, procedure: &str) -> bool {
        GraphStore::has_graph(self, procedure)
    }

    fn get_graph(&self, procedure: &str) -> Result<Arc<Graph>> {
        GraphStore::get_graph(self, procedure)
    }
}
