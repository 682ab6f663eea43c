//! Script processing: one all-or-nothing transaction per script, batches over a directory

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{FailurePolicy, Settings};
use crate::export::{export_all, export_script};
use crate::filter::resolve_scripts;
use crate::lineage::{
    derive_summary, DetailGraph, DetailStats, GlobalLineage, NodeData, SummaryGraph, SummaryStats,
};
use crate::parser::{load_script, ScriptFacts};
use crate::schema::{
    consolidate, reconcile, Action, DependencyGraph, LabelConflict, StatementKind, TableKey,
    UnknownColumn,
};
use crate::ui::{LogLevel, Phase, Ui};
use crate::writer::{
    clear_script, insert_detail_edge, insert_script_lineage, insert_statement, insert_summary_edge,
    load_table, query_detail_rows, upsert_script, write_table, LineageStore,
};

/// How a batch treats what is already in the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Reset the store and the global lineage file first
    Clear,
    /// Add to what is already there
    #[default]
    Insert,
}

/// Everything produced by one committed script
#[derive(Debug, Clone)]
pub struct ScriptOutcome {
    pub script_id: String,
    pub targets: Vec<NodeData>,
    pub sources: Vec<NodeData>,
    /// Resolver decision per persisted table id
    pub actions: Vec<(String, Action)>,
    pub conflicts: Vec<LabelConflict>,
    pub notices: Vec<UnknownColumn>,
    pub dependencies: DependencyGraph,
    pub detail: DetailGraph,
    pub summary: SummaryGraph,
    pub cycles: Vec<Vec<String>>,
    pub detail_stats: DetailStats,
    pub summary_stats: SummaryStats,
}

/// Consolidate, resolve and persist one script, then derive its lineage.
///
/// Nothing is written unless every step succeeds.
pub fn process_script(
    store: &mut LineageStore,
    facts: &ScriptFacts,
    settings: &Settings,
) -> Result<ScriptOutcome> {
    let script_id = facts.script_id.as_str();
    let column_check = settings.processing.column_check;

    let consolidated = consolidate(&facts.statements);
    let dependencies = DependencyGraph::build(&consolidated, &facts.statements);
    let endpoints =
        dependencies.identify_endpoints(script_id, &settings.lineage.temp_predicate())?;

    let tx = store.transaction()?;
    clear_script(&tx, script_id)?;
    upsert_script(&tx, facts)?;

    let mut actions = Vec::with_capacity(consolidated.len());
    let mut conflicts = Vec::new();
    let mut notices = Vec::new();

    for record in consolidated.iter() {
        let id = record.id(script_id);
        let existing = load_table(&tx, &id)?;
        let resolution = reconcile(existing.as_ref(), record, script_id, column_check)?;

        tracing::debug!(table = %id, action = ?resolution.action, "resolved table");
        if let Some(resolved) = &resolution.record {
            write_table(
                &tx,
                &id,
                resolved,
                resolved.owning_script(script_id),
                resolution.defined_by.as_deref(),
            )?;
        }

        actions.push((id, resolution.action));
        conflicts.extend(resolution.conflicts);
        notices.extend(resolution.notices);
    }

    for stmt in &facts.statements {
        let target_id = match stmt.kind {
            StatementKind::Unknown => None,
            _ => stmt
                .target_key()
                .and_then(|key| consolidated.table_id(&key, script_id)),
        };
        insert_statement(&tx, script_id, stmt, target_id.as_deref())?;

        let Some(target_id) = target_id else {
            continue;
        };
        let statement_id = stmt.id(script_id);
        for source in stmt.source_keys() {
            if let Some(source_id) = consolidated.table_id(&source, script_id) {
                insert_detail_edge(&tx, &source_id, &target_id, &statement_id, script_id)?;
            }
        }
    }

    let node = |key: &TableKey| {
        consolidated
            .get(key)
            .map(|record| NodeData::from_record(record, script_id))
    };
    let targets: Vec<NodeData> = endpoints.targets.iter().filter_map(node).collect();
    let sources: Vec<NodeData> = endpoints.sources.iter().filter_map(node).collect();

    for target in &targets {
        for source in sources.iter().filter(|s| s.id != target.id) {
            insert_script_lineage(&tx, &target.id, &source.id, script_id)?;
        }
    }

    let detail = DetailGraph::from_rows(Some(script_id), query_detail_rows(&tx, Some(script_id))?);
    let cycles = detail.detect_cycles();
    for cycle in &cycles {
        tracing::warn!(script = script_id, tables = %cycle.join(" -> "), "cycle in detail lineage");
    }

    let summary = derive_summary(&detail, script_id, settings.lineage.max_path_length);
    for edge in summary.edges() {
        insert_summary_edge(&tx, edge)?;
    }

    tx.commit()
        .with_context(|| format!("Failed to commit script {}", script_id))?;

    let detail_stats = detail.stats();
    let summary_stats = summary.stats();
    tracing::info!(
        script = script_id,
        tables = consolidated.len(),
        detail_edges = detail_stats.edges,
        temp_nodes = detail_stats.temp_nodes,
        summary_edges = summary_stats.edges,
        paths = summary_stats.total_paths,
        "processed script"
    );

    Ok(ScriptOutcome {
        script_id: script_id.to_string(),
        targets,
        sources,
        actions,
        conflicts,
        notices,
        dependencies,
        detail,
        summary,
        cycles,
        detail_stats,
        summary_stats,
    })
}

/// Load and process a single fact file
pub fn process_file(
    store: &mut LineageStore,
    path: &Path,
    settings: &Settings,
) -> Result<ScriptOutcome> {
    let facts = load_script(path)?;
    process_script(store, &facts, settings)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptFailure {
    pub script: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub processed: Vec<String>,
    /// Fact files without statements
    pub skipped: Vec<String>,
    pub failures: Vec<ScriptFailure>,
    /// Stopped before the last script, by `fail-fast` or the user
    pub aborted: bool,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Filters applied to the fact files of a directory
#[derive(Debug, Clone, Default)]
pub struct ScriptSelection {
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

/// Process every fact file under `input_dir` in path order
pub fn process_directory(
    input_dir: &Path,
    settings: &Settings,
    mode: Mode,
    selection: ScriptSelection,
    ui: &mut impl Ui,
) -> Result<BatchReport> {
    ui.set_phase(Phase::Scanning);
    ui.set_info(input_dir.display().to_string());
    let files = resolve_scripts(input_dir, selection.include, selection.exclude)?;

    let mut store = LineageStore::open(&settings.store.db_path)?;
    let lineage_path = &settings.output.lineage_json;

    if mode == Mode::Clear {
        store.reset()?;
        if lineage_path.exists() {
            std::fs::remove_file(lineage_path)
                .with_context(|| format!("Failed to remove {:?}", lineage_path))?;
        }
        ui.log(LogLevel::Info, "Store cleared");
    }

    let mut global = GlobalLineage::load(lineage_path)?;
    let mut report = BatchReport {
        total: files.len(),
        ..BatchReport::default()
    };

    ui.set_phase(Phase::Processing);
    for (i, path) in files.iter().enumerate() {
        if ui.cancelled() {
            ui.log(LogLevel::Warn, "Batch cancelled");
            report.aborted = true;
            break;
        }

        let label = relative_label(input_dir, path);
        ui.set_progress(i as u64, files.len() as u64, label.clone());

        let result = load_script(path).and_then(|facts| {
            if facts.is_empty() {
                Ok(None)
            } else {
                process_script(&mut store, &facts, settings).map(Some)
            }
        });

        match result {
            Ok(None) => {
                ui.log(LogLevel::Info, format!("{}: no statements, skipped", label));
                report.skipped.push(label);
            }
            Ok(Some(outcome)) => {
                global.merge(&outcome.script_id, &outcome.sources, &outcome.targets);
                global.save(lineage_path)?;

                if settings.output.export_json {
                    export_script(&outcome, &settings.output.export_dir)?;
                }

                for conflict in &outcome.conflicts {
                    ui.log(
                        LogLevel::Warn,
                        format!(
                            "{}: label conflict on {}.{} ({:?} kept, {:?} ignored)",
                            label, conflict.table, conflict.column, conflict.existing, conflict.incoming
                        ),
                    );
                }
                ui.log(
                    LogLevel::Success,
                    format!(
                        "{}: {} summary edges, {} cycles",
                        label,
                        outcome.summary_stats.edges,
                        outcome.cycles.len()
                    ),
                );
                report.processed.push(outcome.script_id);
            }
            Err(e) => {
                let error = format!("{:#}", e);
                ui.log(LogLevel::Error, format!("{}: {}", label, error));
                report.failures.push(ScriptFailure {
                    script: label,
                    error,
                });

                if settings.processing.failure_policy == FailurePolicy::FailFast {
                    ui.log(LogLevel::Warn, "Stopping batch at first failure");
                    report.aborted = true;
                    break;
                }
            }
        }
    }
    ui.clear_progress();

    if settings.output.export_json && !report.processed.is_empty() {
        ui.set_phase(Phase::Exporting);
        export_all(&store, &settings.output.export_dir)?;
    }

    store.finalize()?;
    ui.set_phase(Phase::Complete);
    Ok(report)
}

fn relative_label(input_dir: &Path, path: &Path) -> String {
    path.strip_prefix(input_dir)
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_record;

    #[derive(Default)]
    struct RecordingUi {
        levels: Vec<LogLevel>,
    }

    impl Ui for RecordingUi {
        fn set_phase(&mut self, _phase: Phase) {}
        fn set_info(&mut self, _info: impl Into<String>) {}
        fn set_progress(&mut self, _current: u64, _total: u64, _label: impl Into<String>) {}
        fn clear_progress(&mut self) {}
        fn log(&mut self, level: LogLevel, _message: impl Into<String>) {
            self.levels.push(level);
        }
    }

    fn facts(script_id: &str, lines: &[&str]) -> ScriptFacts {
        ScriptFacts::from_records(
            script_id,
            lines.iter().map(|l| parse_record(l).unwrap()).collect(),
        )
    }

    #[test]
    fn test_no_target_leaves_store_untouched() {
        let mut store = LineageStore::open_in_memory().unwrap();
        let script = facts("empty", &[r#"{"statement_kind":"drop"}"#]);

        assert!(process_script(&mut store, &script, &Settings::default()).is_err());
        assert_eq!(store.counts().unwrap().scripts, 0);
    }

    #[test]
    fn test_unknown_statements_are_kept_without_lineage() {
        let mut store = LineageStore::open_in_memory().unwrap();
        let script = facts(
            "job",
            &[
                r#"{"statement_kind":"insert","has_query":true,"target":{"schema":"s","name":"a"},
                    "source_tables":[{"schema":"s","name":"b"}]}"#,
                r#"{"statement_kind":"drop","target":{"schema":"s","name":"old"}}"#,
            ],
        );

        let outcome = process_script(&mut store, &script, &Settings::default()).unwrap();
        let counts = store.counts().unwrap();
        assert_eq!(counts.statements, 2);
        assert_eq!(counts.tables, 2);
        assert_eq!(counts.detail_edges, 1);
        assert_eq!(counts.script_lineage, 1);
        assert_eq!(outcome.actions.len(), 2);
    }

    #[test]
    fn test_strict_column_check_rolls_back() {
        let mut store = LineageStore::open_in_memory().unwrap();
        let ddl = facts(
            "ddl",
            &[r#"{"statement_kind":"create","target":{"schema":"s","name":"a"},
                  "target_columns":[{"name":"x","ordinal":1}]}"#],
        );
        process_script(&mut store, &ddl, &Settings::default()).unwrap();

        let load = facts(
            "load",
            &[r#"{"statement_kind":"insert","has_query":true,"has_column_list":true,
                  "target":{"schema":"s","name":"a"},"target_columns":[{"name":"y"}],
                  "source_tables":[{"schema":"s","name":"b"}]}"#],
        );

        let mut strict = Settings::default();
        strict.processing.column_check = crate::config::ColumnCheck::Strict;
        let err = process_script(&mut store, &load, &strict).unwrap_err();
        assert!(format!("{:#}", err).contains("Column y"));
        assert_eq!(store.counts().unwrap().scripts, 1);

        let outcome = process_script(&mut store, &load, &Settings::default()).unwrap();
        assert_eq!(outcome.notices.len(), 1);
        assert_eq!(store.counts().unwrap().columns, 1);
    }

    #[test]
    fn test_fail_fast_logs_one_error_per_failed_script() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("facts");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("a.jsonl"), r#"{"statement_kind":"drop"}"#).unwrap();
        std::fs::write(input.join("b.jsonl"), r#"{"statement_kind":"drop"}"#).unwrap();

        let mut settings = Settings::default();
        settings.store.db_path = dir.path().join("meta.db");
        settings.output.lineage_json = dir.path().join("lineage.json");
        settings.output.export_json = false;

        let mut ui = RecordingUi::default();
        let report =
            process_directory(&input, &settings, Mode::Insert, ScriptSelection::default(), &mut ui)
                .unwrap();

        assert!(report.aborted);
        assert_eq!(report.failures.len(), 1);
        let errors = ui.levels.iter().filter(|l| **l == LogLevel::Error).count();
        assert_eq!(errors, 1);
        assert!(ui.levels.contains(&LogLevel::Warn));
    }
}
