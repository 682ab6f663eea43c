//! Statement-level lineage, temp tables included.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::node_link::{DetailLinkData, NodeData, NodeLink, NodeLinkGraph};
use crate::schema::{StatementKind, TableKind};

/// A table node of a lineage graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineageNode {
    pub id: String,
    pub schema: String,
    pub table: String,
    pub kind: TableKind,
}

impl LineageNode {
    pub fn is_entity(&self) -> bool {
        self.kind.is_entity()
    }

    pub fn to_node_data(&self) -> NodeData {
        NodeData {
            id: self.id.clone(),
            schema: self.schema.clone(),
            table: self.table.clone(),
            node_type: self.kind.as_str().to_string(),
            is_entity: self.is_entity(),
        }
    }
}

/// The statement that moved data along a detail edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailEdge {
    pub script_id: String,
    pub statement_id: String,
    pub statement_index: u32,
    pub statement_kind: StatementKind,
}

/// One persisted detail edge with both endpoints resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRow {
    pub source: LineageNode,
    pub target: LineageNode,
    pub edge: DetailEdge,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetailStats {
    pub nodes: usize,
    pub edges: usize,
    pub entity_nodes: usize,
    pub temp_nodes: usize,
    pub cycles: usize,
}

/// Detail lineage of one script, or of every script when unscoped
#[derive(Debug, Clone, Default)]
pub struct DetailGraph {
    graph: DiGraph<LineageNode, DetailEdge>,
    node_index: HashMap<String, NodeIndex>,
    script_id: Option<String>,
}

impl DetailGraph {
    pub fn new(script_id: Option<&str>) -> Self {
        Self {
            graph: DiGraph::new(),
            node_index: HashMap::new(),
            script_id: script_id.map(str::to_string),
        }
    }

    pub fn from_rows(script_id: Option<&str>, rows: impl IntoIterator<Item = DetailRow>) -> Self {
        let mut graph = Self::new(script_id);
        for row in rows {
            graph.add_edge(row.source, row.target, row.edge);
        }
        graph
    }

    pub fn script_id(&self) -> Option<&str> {
        self.script_id.as_deref()
    }

    /// Get or create the node for a table
    pub fn add_node(&mut self, node: LineageNode) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(&node.id) {
            return idx;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.node_index.insert(id, idx);
        idx
    }

    /// Add a statement edge. Edges for distinct statements between the same pair are kept.
    pub fn add_edge(&mut self, source: LineageNode, target: LineageNode, edge: DetailEdge) {
        let from = self.add_node(source);
        let to = self.add_node(target);

        let exists = self
            .graph
            .edges_connecting(from, to)
            .any(|e| e.weight().statement_id == edge.statement_id);
        if !exists {
            self.graph.add_edge(from, to, edge);
        }
    }

    pub fn graph(&self) -> &DiGraph<LineageNode, DetailEdge> {
        &self.graph
    }

    pub fn node(&self, id: &str) -> Option<&LineageNode> {
        self.node_index.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.node_index.get(id).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &LineageNode> {
        self.graph.node_weights()
    }

    /// Strongly connected components that form cycles, as sorted node ids
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                // A single node is only a cycle if it has a self-loop
                scc.len() > 1 || self.graph.edges_connecting(scc[0], scc[0]).next().is_some()
            })
            .map(|scc| {
                let mut ids: Vec<String> =
                    scc.into_iter().map(|idx| self.graph[idx].id.clone()).collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    pub fn stats(&self) -> DetailStats {
        let entity_nodes = self.nodes().filter(|n| n.is_entity()).count();
        DetailStats {
            nodes: self.node_count(),
            edges: self.edge_count(),
            entity_nodes,
            temp_nodes: self.node_count() - entity_nodes,
            cycles: self.detect_cycles().len(),
        }
    }

    pub fn to_node_link(&self) -> NodeLinkGraph<DetailLinkData> {
        let mut export = NodeLinkGraph::multi();
        export.set_attr("lineage", "detail");
        if let Some(script_id) = &self.script_id {
            export.set_attr("script_id", script_id.as_str());
        }

        export.nodes = self.nodes().map(LineageNode::to_node_data).collect();
        export.links = self
            .graph
            .edge_references()
            .map(|e| {
                let edge = e.weight();
                NodeLink {
                    source: self.graph[e.source()].id.clone(),
                    target: self.graph[e.target()].id.clone(),
                    edge_type: "STATEMENT".to_string(),
                    script_id: Some(edge.script_id.clone()),
                    data: DetailLinkData {
                        statement_id: edge.statement_id.clone(),
                        statement_index: edge.statement_index,
                        statement_kind: edge.statement_kind,
                    },
                }
            })
            .collect();

        export
    }
}
