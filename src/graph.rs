//! The relation graph of a validated bundle

use std::collections::HashMap;
use std::fmt;

use petgraph::dot::{Config as DotConfig, Dot};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::endpoint::EndpointRef;

/// A relation between two applications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationEdge {
    pub a: EndpointRef,
    pub b: EndpointRef,

    /// Interface both endpoints speak, if the charms' metadata was available
    pub interface: Option<String>,
}

impl RelationEdge {
    /// Whether this is the same relation as `other`, regardless of side order
    pub fn same_as(&self, other: &RelationEdge) -> bool {
        (self.a == other.a && self.b == other.b) || (self.a == other.b && self.b == other.a)
    }
}

impl fmt::Display for RelationEdge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let a = self.a.endpoint.as_deref().unwrap_or("*");
        let b = self.b.endpoint.as_deref().unwrap_or("*");
        write!(f, "{}:{}", a, b)
    }
}

/// Applications as vertices, relations as edges
#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    graph: UnGraph<String, RelationEdge>,
    indices: HashMap<String, NodeIndex>,
}

impl RelationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_application(&mut self, name: &str) -> NodeIndex {
        if let Some(index) = self.indices.get(name) {
            return *index;
        }
        let index = self.graph.add_node(name.to_string());
        self.indices.insert(name.to_string(), index);
        index
    }

    /// Add a relation, whose applications must already have been added
    ///
    /// Returns false if the same relation is already in the graph.
    pub fn add_relation(&mut self, edge: RelationEdge) -> bool {
        let (a, b) = match (
            self.indices.get(&edge.a.application),
            self.indices.get(&edge.b.application),
        ) {
            (Some(a), Some(b)) => (*a, *b),
            _ => return false,
        };

        if self.relations().any(|existing| existing.same_as(&edge)) {
            return false;
        }

        self.graph.add_edge(a, b, edge);
        true
    }

    pub fn application_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn relation_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn applications(&self) -> impl Iterator<Item = &str> {
        self.graph.raw_nodes().iter().map(|n| n.weight.as_str())
    }

    pub fn relations(&self) -> impl Iterator<Item = &RelationEdge> {
        self.graph.raw_edges().iter().map(|e| &e.weight)
    }

    /// Relations the given application takes part in
    pub fn relations_of<'a>(&'a self, application: &str) -> Vec<&'a RelationEdge> {
        match self.indices.get(application) {
            Some(index) => self.graph.edges(*index).map(|e| e.weight()).collect(),
            None => vec![],
        }
    }

    /// Render as Graphviz dot
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::with_config(&self.graph, &[DotConfig::EdgeNoLabel]))
    }

    /// Render as Graphviz dot, labelling edges with their endpoint names
    pub fn to_labelled_dot(&self) -> String {
        format!("{}", Dot::new(&self.graph))
    }
}
