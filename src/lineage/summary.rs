//! Entity-level lineage derived from a script's detail graph.
//!
//! Every simple path between two entity tables, up to a hop cutoff, is counted
//! without being materialised. Temp tables only ever appear as intermediate hops.

use petgraph::graph::NodeIndex;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::detail::{DetailGraph, LineageNode};
use super::node_link::{NodeLink, NodeLinkGraph, SummaryLinkData};

/// Longest path, in hops, followed during derivation
pub const DEFAULT_MAX_PATH_LENGTH: u32 = 20;

/// Entity-to-entity edge of one script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEdge {
    pub source: String,
    pub target: String,
    pub script_id: String,
    pub path_count: u64,
    pub min_hop_count: u32,
    pub max_hop_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryStats {
    pub nodes: usize,
    pub edges: usize,
    pub total_paths: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SummaryGraph {
    script_id: Option<String>,
    nodes: BTreeMap<String, LineageNode>,
    edges: Vec<SummaryEdge>,
}

impl SummaryGraph {
    /// Assemble from persisted parts. Only nodes touched by an edge are kept.
    pub fn from_parts(
        script_id: Option<&str>,
        nodes: impl IntoIterator<Item = LineageNode>,
        mut edges: Vec<SummaryEdge>,
    ) -> Self {
        edges.sort_by(|a, b| {
            (&a.source, &a.target, &a.script_id).cmp(&(&b.source, &b.target, &b.script_id))
        });

        let mut used: BTreeMap<String, LineageNode> = BTreeMap::new();
        let mut candidates: HashMap<String, LineageNode> =
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        for edge in &edges {
            for id in [&edge.source, &edge.target] {
                if let Some(node) = candidates.remove(id) {
                    used.insert(id.clone(), node);
                }
            }
        }

        Self {
            script_id: script_id.map(str::to_string),
            nodes: used,
            edges,
        }
    }

    pub fn script_id(&self) -> Option<&str> {
        self.script_id.as_deref()
    }

    pub fn edges(&self) -> &[SummaryEdge] {
        &self.edges
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&SummaryEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &LineageNode> {
        self.nodes.values()
    }

    pub fn stats(&self) -> SummaryStats {
        SummaryStats {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            total_paths: self.edges.iter().map(|e| e.path_count).sum(),
        }
    }

    pub fn to_node_link(&self) -> NodeLinkGraph<SummaryLinkData> {
        // Across scripts the same pair may be linked once per script
        let mut export = if self.script_id.is_some() {
            NodeLinkGraph::new()
        } else {
            NodeLinkGraph::multi()
        };
        export.set_attr("lineage", "summary");
        if let Some(script_id) = &self.script_id {
            export.set_attr("script_id", script_id.as_str());
        }

        export.nodes = self
            .nodes
            .values()
            .map(LineageNode::to_node_data)
            .collect();

        export.links = self
            .edges
            .iter()
            .map(|e| NodeLink {
                source: e.source.clone(),
                target: e.target.clone(),
                edge_type: "SCRIPT".to_string(),
                script_id: Some(e.script_id.clone()),
                data: SummaryLinkData {
                    path_count: e.path_count,
                    min_hop_count: e.min_hop_count,
                    max_hop_count: e.max_hop_count,
                },
            })
            .collect();

        export
    }
}

/// Paths found from one source to one target
#[derive(Debug, Clone, Copy)]
struct PathTally {
    count: u64,
    min_hops: u32,
    max_hops: u32,
}

impl PathTally {
    fn first(hops: u32) -> Self {
        Self {
            count: 1,
            min_hops: hops,
            max_hops: hops,
        }
    }

    fn add(&mut self, hops: u32) {
        self.count += 1;
        self.min_hops = self.min_hops.min(hops);
        self.max_hops = self.max_hops.max(hops);
    }
}

struct PathWalker<'a> {
    detail: &'a DetailGraph,
    /// Distinct successors per node, ordered by id
    successors: Vec<Vec<NodeIndex>>,
    max_hops: u32,
    on_path: Vec<bool>,
    reached: HashMap<NodeIndex, PathTally>,
}

impl<'a> PathWalker<'a> {
    fn new(detail: &'a DetailGraph, max_hops: u32) -> Self {
        let graph = detail.graph();
        let successors = graph
            .node_indices()
            .map(|n| {
                let mut next: Vec<NodeIndex> =
                    graph.neighbors_directed(n, Direction::Outgoing).collect();
                next.sort_by(|a, b| graph[*a].id.cmp(&graph[*b].id));
                next.dedup();
                next
            })
            .collect();

        Self {
            detail,
            successors,
            max_hops,
            on_path: vec![false; graph.node_count()],
            reached: HashMap::new(),
        }
    }

    /// Tally every simple path from `source` to each reachable entity
    fn walk_from(&mut self, source: NodeIndex) -> HashMap<NodeIndex, PathTally> {
        self.reached.clear();
        self.visit(source, 0);
        std::mem::take(&mut self.reached)
    }

    fn visit(&mut self, node: NodeIndex, depth: u32) {
        if depth >= self.max_hops {
            return;
        }
        self.on_path[node.index()] = true;

        let detail = self.detail;
        let graph = detail.graph();
        for i in 0..self.successors[node.index()].len() {
            let next = self.successors[node.index()][i];
            if self.on_path[next.index()] {
                continue;
            }

            let hops = depth + 1;
            if graph[next].is_entity() {
                self.reached
                    .entry(next)
                    .and_modify(|t| t.add(hops))
                    .or_insert_with(|| PathTally::first(hops));
            }
            self.visit(next, hops);
        }

        self.on_path[node.index()] = false;
    }
}

/// Derive the summary graph of one script's detail graph
pub fn derive_summary(detail: &DetailGraph, script_id: &str, max_path_length: u32) -> SummaryGraph {
    let graph = detail.graph();

    let mut entities: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|&n| graph[n].is_entity())
        .collect();
    entities.sort_by(|a, b| graph[*a].id.cmp(&graph[*b].id));

    let mut walker = PathWalker::new(detail, max_path_length);
    let mut edges = Vec::new();

    for &source in &entities {
        let mut reached: Vec<(NodeIndex, PathTally)> = walker.walk_from(source).into_iter().collect();
        reached.sort_by(|a, b| graph[a.0].id.cmp(&graph[b.0].id));

        for (target, tally) in reached {
            edges.push(SummaryEdge {
                source: graph[source].id.clone(),
                target: graph[target].id.clone(),
                script_id: script_id.to_string(),
                path_count: tally.count,
                min_hop_count: tally.min_hops,
                max_hop_count: tally.max_hops,
            });
        }
    }

    tracing::debug!(
        script = script_id,
        entities = entities.len(),
        edges = edges.len(),
        "derived summary lineage"
    );

    SummaryGraph::from_parts(Some(script_id), graph.node_weights().cloned(), edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::detail::tests::{entity, stmt, temp};

    #[test]
    fn test_direct_insert_select() {
        let mut detail = DetailGraph::new(Some("job"));
        detail.add_edge(entity("B"), entity("A"), stmt("job", 2));

        let summary = derive_summary(&detail, "job", DEFAULT_MAX_PATH_LENGTH);
        assert_eq!(summary.edges().len(), 1);

        let edge = summary.edge("s__B__", "s__A__").unwrap();
        assert_eq!(edge.path_count, 1);
        assert_eq!(edge.min_hop_count, 1);
        assert_eq!(edge.max_hop_count, 1);
    }

    #[test]
    fn test_cycle_through_temps_still_reaches_entity() {
        let mut detail = DetailGraph::new(Some("job"));
        detail.add_edge(entity("B"), temp("tmp1", "job"), stmt("job", 1));
        detail.add_edge(temp("tmp1", "job"), temp("tmp2", "job"), stmt("job", 2));
        detail.add_edge(temp("tmp2", "job"), entity("B"), stmt("job", 3));
        detail.add_edge(temp("tmp2", "job"), entity("C"), stmt("job", 4));

        let summary = derive_summary(&detail, "job", DEFAULT_MAX_PATH_LENGTH);
        assert_eq!(summary.edges().len(), 1);

        let edge = summary.edge("s__B__", "s__C__").unwrap();
        assert_eq!(edge.path_count, 1);
        assert_eq!(edge.min_hop_count, 3);
        assert_eq!(summary.nodes().count(), 2);
    }

    #[test]
    fn test_parallel_edges_count_once_and_paths_pass_entities() {
        let mut detail = DetailGraph::new(Some("job"));
        detail.add_edge(entity("A"), entity("B"), stmt("job", 1));
        detail.add_edge(entity("A"), entity("B"), stmt("job", 2));
        detail.add_edge(entity("B"), entity("C"), stmt("job", 3));
        detail.add_edge(entity("A"), temp("t", "job"), stmt("job", 4));
        detail.add_edge(temp("t", "job"), entity("C"), stmt("job", 5));

        let summary = derive_summary(&detail, "job", DEFAULT_MAX_PATH_LENGTH);
        assert_eq!(summary.edge("s__A__", "s__B__").unwrap().path_count, 1);

        let a_to_c = summary.edge("s__A__", "s__C__").unwrap();
        assert_eq!(a_to_c.path_count, 2);
        assert_eq!(a_to_c.min_hop_count, 2);
        assert_eq!(a_to_c.max_hop_count, 2);
        assert_eq!(summary.stats().total_paths, 4);
    }

    #[test]
    fn test_cutoff_bounds_path_length() {
        let mut detail = DetailGraph::new(Some("job"));
        detail.add_edge(entity("A"), temp("t1", "job"), stmt("job", 1));
        detail.add_edge(temp("t1", "job"), temp("t2", "job"), stmt("job", 2));
        detail.add_edge(temp("t2", "job"), entity("B"), stmt("job", 3));

        assert!(derive_summary(&detail, "job", 2).edges().is_empty());
        assert_eq!(derive_summary(&detail, "job", 3).edges().len(), 1);
    }

    #[test]
    fn test_temp_only_graph_has_no_summary() {
        let mut detail = DetailGraph::new(Some("job"));
        detail.add_edge(temp("a", "job"), temp("b", "job"), stmt("job", 1));
        let summary = derive_summary(&detail, "job", DEFAULT_MAX_PATH_LENGTH);
        assert!(summary.edges().is_empty());
        assert_eq!(summary.nodes().count(), 0);
    }

    #[test]
    fn test_all_scripts_export_is_multigraph() {
        let edge = |script: &str| SummaryEdge {
            source: "s__B__".into(),
            target: "s__A__".into(),
            script_id: script.into(),
            path_count: 1,
            min_hop_count: 1,
            max_hop_count: 1,
        };
        let summary = SummaryGraph::from_parts(
            None,
            vec![entity("A"), entity("B"), entity("unused")],
            vec![edge("two"), edge("one")],
        );

        let export = summary.to_node_link();
        assert!(export.multigraph);
        assert_eq!(export.nodes.len(), 2);
        assert_eq!(export.links[0].script_id.as_deref(), Some("one"));
    }
}
