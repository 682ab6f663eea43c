//! Node-link JSON artifacts per script and for the whole store

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::lineage::{DetailGraph, SummaryGraph};
use crate::process::ScriptOutcome;
use crate::writer::{query_detail_rows, query_entity_nodes, query_summary_edges, LineageStore};

/// Files written for one script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptExport {
    pub detail: PathBuf,
    pub summary: PathBuf,
    pub graph: PathBuf,
}

/// Write `scripts/{id}_detail.json`, `scripts/{id}_summary.json` and `scripts/{id}_graph.json`
pub fn export_script(outcome: &ScriptOutcome, export_dir: &Path) -> Result<ScriptExport> {
    let dir = export_dir.join("scripts");
    let id = &outcome.script_id;

    let files = ScriptExport {
        detail: dir.join(format!("{}_detail.json", id)),
        summary: dir.join(format!("{}_summary.json", id)),
        graph: dir.join(format!("{}_graph.json", id)),
    };

    outcome.detail.to_node_link().write_json(&files.detail)?;
    outcome.summary.to_node_link().write_json(&files.summary)?;
    outcome.dependencies.to_node_link(id).write_json(&files.graph)?;

    tracing::debug!(script = %id, dir = %dir.display(), "exported script lineage");
    Ok(files)
}

/// Files written for the whole store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryExport {
    pub detail: PathBuf,
    pub summary: PathBuf,
    pub detail_edges: usize,
    pub summary_edges: usize,
}

/// Write `all_lineage_detail.json` and `all_lineage_summary.json` from every persisted edge
pub fn export_all(store: &LineageStore, export_dir: &Path) -> Result<RepositoryExport> {
    let conn = store.connection();

    let detail = DetailGraph::from_rows(None, query_detail_rows(conn, None)?);
    let summary = SummaryGraph::from_parts(
        None,
        query_entity_nodes(conn)?,
        query_summary_edges(conn, None)?,
    );

    let export = RepositoryExport {
        detail: export_dir.join("all_lineage_detail.json"),
        summary: export_dir.join("all_lineage_summary.json"),
        detail_edges: detail.edge_count(),
        summary_edges: summary.edges().len(),
    };

    if export.detail_edges == 0 {
        tracing::warn!("store holds no detail lineage");
    }

    detail.to_node_link().write_json(&export.detail)?;
    summary.to_node_link().write_json(&export.summary)?;

    tracing::info!(
        detail_edges = export.detail_edges,
        summary_edges = export.summary_edges,
        dir = %export_dir.display(),
        "exported repository lineage"
    );
    Ok(export)
}
