//! Node-link JSON: `{directed, multigraph, graph, nodes, links}`

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::schema::{StatementKind, TableRecord};

/// A table node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    /// Persisted table id
    pub id: String,
    pub schema: String,
    pub table: String,
    /// Table kind (`PERSISTENT_TABLE`, `VIEW`, `TEMP_TABLE`)
    pub node_type: String,
    pub is_entity: bool,
}

impl NodeData {
    pub fn from_record(record: &TableRecord, script_id: &str) -> Self {
        Self {
            id: record.id(script_id),
            schema: record.key.schema.clone(),
            table: record.key.name.clone(),
            node_type: record.kind.as_str().to_string(),
            is_entity: record.kind.is_entity(),
        }
    }
}

/// A link with common fields and per-graph attributes flattened alongside
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLink<L> {
    pub source: String,
    pub target: String,
    pub edge_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,
    #[serde(flatten)]
    pub data: L,
}

/// Statement-level link attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailLinkData {
    pub statement_id: String,
    pub statement_index: u32,
    pub statement_kind: StatementKind,
}

/// Script-level link attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryLinkData {
    pub path_count: u64,
    pub min_hop_count: u32,
    pub max_hop_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyLinkData {
    pub statement_indexes: Vec<u32>,
}

/// Cross-script link attributes: every script that produced the edge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalLinkData {
    #[serde(default)]
    pub script_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLinkGraph<L> {
    pub directed: bool,
    pub multigraph: bool,
    #[serde(default)]
    pub graph: Map<String, Value>,
    #[serde(default = "Vec::new")]
    pub nodes: Vec<NodeData>,
    #[serde(default = "Vec::new")]
    pub links: Vec<NodeLink<L>>,
}

impl<L> NodeLinkGraph<L> {
    pub fn new() -> Self {
        Self {
            directed: true,
            multigraph: false,
            graph: Map::new(),
            nodes: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Graph that may hold parallel links
    pub fn multi() -> Self {
        Self {
            multigraph: true,
            ..Self::new()
        }
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<Value>) {
        self.graph.insert(key.to_string(), value.into());
    }
}

impl<L> Default for NodeLinkGraph<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Serialize> NodeLinkGraph<L> {
    /// Write pretty JSON, creating parent directories
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let file = File::create(path).with_context(|| format!("Failed to create: {:?}", path))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("Failed to write JSON: {:?}", path))?;
        Ok(())
    }
}

impl<L: DeserializeOwned> NodeLinkGraph<L> {
    pub fn read_json(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open: {:?}", path))?;
        let graph = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse node-link JSON: {:?}", path))?;
        Ok(graph)
    }
}
