//! Cross-script lineage kept in one node-link file.
//!
//! The file has a single writer: load it once, merge each committed script, save.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

use super::node_link::{GlobalLinkData, NodeData, NodeLink, NodeLinkGraph};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalLineage {
    nodes: BTreeMap<String, NodeData>,
    /// (source, target) -> scripts that produced the edge, in merge order
    edges: BTreeMap<(String, String), Vec<String>>,
}

impl GlobalLineage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from disk; a missing file is an empty graph
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let file: NodeLinkGraph<GlobalLinkData> = NodeLinkGraph::read_json(path)?;
        let mut lineage = Self::new();
        for node in file.nodes {
            lineage.nodes.entry(node.id.clone()).or_insert(node);
        }
        for link in file.links {
            let scripts = lineage.edges.entry((link.source, link.target)).or_default();
            for script in link.data.script_paths {
                if !scripts.contains(&script) {
                    scripts.push(script);
                }
            }
        }
        Ok(lineage)
    }

    /// Union the script's sources x targets into the graph. Returns the number of new edges.
    pub fn merge(&mut self, script_id: &str, sources: &[NodeData], targets: &[NodeData]) -> usize {
        for node in sources.iter().chain(targets) {
            self.nodes
                .entry(node.id.clone())
                .or_insert_with(|| node.clone());
        }

        let mut added = 0;
        for source in sources {
            for target in targets.iter().filter(|t| t.id != source.id) {
                let scripts = self
                    .edges
                    .entry((source.id.clone(), target.id.clone()))
                    .or_insert_with(|| {
                        added += 1;
                        Vec::new()
                    });
                if !scripts.iter().any(|s| s == script_id) {
                    scripts.push(script_id.to_string());
                }
            }
        }
        added
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_node_link().write_json(path)
    }

    pub fn node(&self, id: &str) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    pub fn scripts_for(&self, source: &str, target: &str) -> Option<&[String]> {
        self.edges
            .get(&(source.to_string(), target.to_string()))
            .map(Vec::as_slice)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn to_node_link(&self) -> NodeLinkGraph<GlobalLinkData> {
        let mut export = NodeLinkGraph::new();
        export.set_attr("lineage", "global");
        export.nodes = self.nodes.values().cloned().collect();
        export.links = self
            .edges
            .iter()
            .map(|((source, target), scripts)| NodeLink {
                source: source.clone(),
                target: target.clone(),
                edge_type: "LINEAGE".to_string(),
                script_id: None,
                data: GlobalLinkData {
                    script_paths: scripts.clone(),
                },
            })
            .collect();
        export
    }
}
