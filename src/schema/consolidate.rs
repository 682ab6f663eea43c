//! Folds the statements of one script into one record per referenced table.

use std::collections::HashMap;

use super::types::{ColumnRecord, Provenance, StatementKind, TableKey, TableKind, TableRecord};
use crate::parser::{is_temporary_create, ColumnFact, Statement};

/// One consolidated record per table referenced by a script, in order of first reference
#[derive(Debug, Clone, Default)]
pub struct ConsolidatedScript {
    records: Vec<TableRecord>,
    index: HashMap<TableKey, usize>,
}

impl ConsolidatedScript {
    pub fn get(&self, key: &TableKey) -> Option<&TableRecord> {
        self.index.get(key).map(|&i| &self.records[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persisted id of a referenced table
    pub fn table_id(&self, key: &TableKey, script_id: &str) -> Option<String> {
        self.get(key).map(|r| r.id(script_id))
    }

    fn entry_index(&self, key: &TableKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    fn push(&mut self, record: TableRecord) -> usize {
        let i = self.records.len();
        self.index.insert(record.key.clone(), i);
        self.records.push(record);
        i
    }
}

/// Consolidate the statements of one script
pub fn consolidate(statements: &[Statement]) -> ConsolidatedScript {
    let mut script = ConsolidatedScript::default();

    for stmt in statements {
        if stmt.kind == StatementKind::Unknown {
            continue;
        }

        if let Some(key) = stmt.target_key() {
            let i = match script.entry_index(&key) {
                Some(i) => {
                    absorb_statement(&mut script.records[i], stmt);
                    i
                }
                None => script.push(new_target(key, stmt)),
            };

            let definition = stmt.kind.is_definition();
            for col in &stmt.fact.target_columns {
                merge_column(&mut script.records[i], col, definition);
            }
        }

        for key in stmt.source_keys() {
            if script.entry_index(&key).is_none() {
                script.push(TableRecord::external(key));
            }
        }
    }

    script
}

/// Table kind implied by the statement that writes the table
pub fn derive_kind(stmt: &Statement, key: &TableKey) -> TableKind {
    match stmt.kind {
        StatementKind::CreateView => TableKind::View,
        StatementKind::CreateTable | StatementKind::CreateTableAs => {
            if is_temporary_create(&stmt.fact) {
                TableKind::TempTable
            } else {
                TableKind::PersistentTable
            }
        }
        _ if key.is_qualified() => TableKind::PersistentTable,
        _ => TableKind::TempTable,
    }
}

fn target_label(stmt: &Statement) -> String {
    stmt.fact
        .target
        .as_ref()
        .and_then(|t| t.label.as_deref())
        .map(str::trim)
        .unwrap_or("")
        .to_string()
}

fn new_target(key: TableKey, stmt: &Statement) -> TableRecord {
    let kind = derive_kind(stmt, &key);
    let mut record = TableRecord::new(key, kind, Provenance::Statement(stmt.kind));
    record.label = target_label(stmt);
    record
}

/// Fold a later statement writing an already-seen table into its record
fn absorb_statement(record: &mut TableRecord, stmt: &Statement) {
    let label = target_label(stmt);

    match record.provenance {
        // First seen as a source, now written: start over from this statement
        Provenance::External => {
            record.kind = derive_kind(stmt, &record.key);
            record.provenance = Provenance::Statement(stmt.kind);
            record.label = label;
        }
        Provenance::Statement(existing) if stmt.kind.is_definition() => {
            if !existing.is_definition() {
                record.kind = derive_kind(stmt, &record.key);
                record.provenance = Provenance::Statement(stmt.kind);
                if !label.is_empty() {
                    record.label = label;
                }
            } else {
                if stmt.kind == StatementKind::CreateTable && existing != StatementKind::CreateTable {
                    record.kind = derive_kind(stmt, &record.key);
                    record.provenance = Provenance::Statement(StatementKind::CreateTable);
                }
                if record.label.is_empty() {
                    record.label = label;
                }
            }
        }
        Provenance::Statement(_) => {
            if record.label.is_empty() {
                record.label = label;
            }
        }
    }
}

/// Build a column record from a fact; DML columns get provisional ordinals
pub fn column_from_fact(fact: &ColumnFact, fallback_ordinal: u32, definition: bool) -> ColumnRecord {
    ColumnRecord {
        name: fact.name.trim().to_string(),
        label: fact.label.as_deref().unwrap_or("").trim().to_string(),
        ordinal: Some(fact.ordinal.unwrap_or(fallback_ordinal)),
        provisional: !definition,
        data_type: fact.data_type.clone().unwrap_or_default(),
        nullable: fact.nullable.unwrap_or(!fact.primary_key),
        default_value: fact.default.clone().unwrap_or_default(),
        primary_key: fact.primary_key,
        foreign_key: fact.foreign_key,
    }
}

/// Merge one column contribution: fill empty fields, never overwrite a differing value
fn merge_column(record: &mut TableRecord, fact: &ColumnFact, definition: bool) {
    if fact.name.trim().is_empty() {
        return;
    }

    let incoming = column_from_fact(fact, record.next_ordinal(), definition);
    let table = record.key.full_name();

    let Some(existing) = record.column_mut(&incoming.name) else {
        record.columns.push(incoming);
        return;
    };

    if existing.label.is_empty() {
        existing.label = incoming.label;
    } else if !incoming.label.is_empty() && incoming.label != existing.label {
        tracing::debug!(
            table = %table,
            column = %existing.name,
            kept = %existing.label,
            ignored = %incoming.label,
            "differing column labels within one script, keeping the first"
        );
    }

    if definition && existing.provisional {
        existing.ordinal = incoming.ordinal;
        existing.provisional = false;
        existing.nullable = incoming.nullable;
    } else if existing.ordinal.is_none() {
        existing.ordinal = incoming.ordinal;
    }

    if existing.data_type.is_empty() {
        existing.data_type = incoming.data_type;
    }
    if existing.default_value.is_empty() {
        existing.default_value = incoming.default_value;
    }
    existing.primary_key |= incoming.primary_key;
    existing.foreign_key |= incoming.foreign_key;
}
