use std::collections::{BTreeMap, BTreeSet};

use super::consolidate::ConsolidatedScript;
use super::types::{StatementKind, TableKey, TableRecord};
use crate::error::{LineageError, LineageResult};
use crate::lineage::node_link::{DependencyLinkData, NodeData, NodeLink, NodeLinkGraph};
use crate::parser::Statement;

/// Unqualified name prefixes treated as temporary when picking targets
pub const DEFAULT_TEMP_PREFIXES: &[&str] = &["VT_", "TMP_", "TEMP_", "VOLATILE_", "#"];

/// Name-based temp table test used only by target selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempTablePredicate {
    prefixes: Vec<String>,
}

impl TempTablePredicate {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.as_ref().to_ascii_uppercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_temp(&self, key: &TableKey) -> bool {
        if key.is_qualified() {
            return false;
        }
        let name = key.name.to_ascii_uppercase();
        self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }
}

impl Default for TempTablePredicate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMP_PREFIXES)
    }
}

/// Tables a script writes and reads from outside
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub targets: Vec<TableKey>,
    pub sources: Vec<TableKey>,
}

/// Table-level dependency graph of one script (edge source -> target)
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<TableRecord>,
    /// Map of table -> tables it reads from
    deps: BTreeMap<TableKey, BTreeSet<TableKey>>,
    /// Map of table -> tables that read from it
    reverse_deps: BTreeMap<TableKey, BTreeSet<TableKey>>,
    /// Statements behind each (source, target) edge
    statements: BTreeMap<(TableKey, TableKey), BTreeSet<u32>>,
}

impl DependencyGraph {
    pub fn build(consolidated: &ConsolidatedScript, statements: &[Statement]) -> Self {
        let mut graph = Self {
            nodes: consolidated.iter().cloned().collect(),
            deps: BTreeMap::new(),
            reverse_deps: BTreeMap::new(),
            statements: BTreeMap::new(),
        };

        for stmt in statements {
            if stmt.kind == StatementKind::Unknown {
                continue;
            }
            let Some(target) = stmt.target_key() else {
                continue;
            };

            for source in stmt.source_keys() {
                graph.deps.entry(target.clone()).or_default().insert(source.clone());
                graph
                    .reverse_deps
                    .entry(source.clone())
                    .or_default()
                    .insert(target.clone());
                graph
                    .statements
                    .entry((source, target.clone()))
                    .or_default()
                    .insert(stmt.index);
            }
        }

        graph
    }

    pub fn nodes(&self) -> &[TableRecord] {
        &self.nodes
    }

    pub fn in_degree(&self, key: &TableKey) -> usize {
        self.deps.get(key).map_or(0, BTreeSet::len)
    }

    pub fn out_degree(&self, key: &TableKey) -> usize {
        self.reverse_deps.get(key).map_or(0, BTreeSet::len)
    }

    /// Deduplicated (source, target) edges
    pub fn edges(&self) -> impl Iterator<Item = (&TableKey, &TableKey)> {
        self.statements.keys().map(|(s, t)| (s, t))
    }

    pub fn edge_count(&self) -> usize {
        self.statements.len()
    }

    /// Pick the script's targets and sources.
    ///
    /// Targets are the non-temp tables something is written into; failing that, the
    /// tables nothing reads from. Sources are the tables nothing is written into.
    pub fn identify_endpoints(
        &self,
        script_id: &str,
        temp: &TempTablePredicate,
    ) -> LineageResult<Endpoints> {
        let keys = || self.nodes.iter().map(|n| &n.key);

        let mut targets: Vec<TableKey> = keys()
            .filter(|k| self.in_degree(k) > 0 && !temp.is_temp(k))
            .cloned()
            .collect();

        if targets.is_empty() {
            targets = keys().filter(|k| self.out_degree(k) == 0).cloned().collect();
        }

        if targets.is_empty() {
            return Err(LineageError::NoTargetIdentified {
                script_id: script_id.to_string(),
            });
        }

        let sources = keys().filter(|k| self.in_degree(k) == 0).cloned().collect();

        Ok(Endpoints { targets, sources })
    }

    /// Node-link export, nodes keyed by persisted table id
    pub fn to_node_link(&self, script_id: &str) -> NodeLinkGraph<DependencyLinkData> {
        let ids: BTreeMap<&TableKey, String> = self
            .nodes
            .iter()
            .map(|n| (&n.key, n.id(script_id)))
            .collect();

        let mut graph = NodeLinkGraph::new();
        graph.set_attr("script_id", script_id);
        graph.nodes = self
            .nodes
            .iter()
            .map(|n| NodeData::from_record(n, script_id))
            .collect();

        graph.links = self
            .statements
            .iter()
            .filter_map(|((source, target), indexes)| {
                Some(NodeLink {
                    source: ids.get(source)?.clone(),
                    target: ids.get(target)?.clone(),
                    edge_type: "DEPENDENCY".to_string(),
                    script_id: Some(script_id.to_string()),
                    data: DependencyLinkData {
                        statement_indexes: indexes.iter().copied().collect(),
                    },
                })
            })
            .collect();

        graph
    }
}
