//! Surrounding graph: a bounded neighbourhood explaining a set of entities

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, Fact};

/// Nodes and edges around a seed set of entities.
///
/// Edges keep insertion order; `index` mirrors them for duplicate checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurroundingGraph {
    pub nodes: BTreeSet<Entity>,
    pub edges: Vec<Fact>,
    #[serde(skip)]
    index: BTreeSet<Fact>,
}

impl PartialEq for SurroundingGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.edges == other.edges
    }
}

impl Eq for SurroundingGraph {}

impl SurroundingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from seed nodes, which stay in the graph even if isolated
    pub fn with_nodes(mut self, nodes: impl IntoIterator<Item = Entity>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    pub fn with_edges(mut self, edges: impl IntoIterator<Item = Fact>) -> Self {
        for edge in edges {
            self.add_edge(edge);
        }
        self
    }

    /// Add an edge and its endpoints; returns false for a duplicate edge
    pub fn add_edge(&mut self, fact: Fact) -> bool {
        // Deserialized graphs and direct pushes to `edges` leave the index behind
        if self.index.len() != self.edges.len() {
            self.index = self.edges.iter().cloned().collect();
        }
        if !self.index.insert(fact.clone()) {
            return false;
        }
        self.nodes.insert(fact.subject.clone());
        self.nodes.insert(fact.object.clone());
        self.edges.push(fact);
        true
    }

    /// Edges touching `entity`
    pub fn edges_of<'a>(&'a self, entity: &'a Entity) -> impl Iterator<Item = &'a Fact> + 'a {
        self.edges
            .iter()
            .filter(move |f| &f.subject == entity || &f.object == entity)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
