//! Decides how a newly consolidated table record meets the persisted one.

use super::types::{ColumnRecord, Provenance, StatementKind, StoredTable, TableRecord};
use crate::config::ColumnCheck;
use crate::error::{LineageError, LineageResult};

/// What to do with an incoming record given the persisted one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Replace the persisted record
    Overwrite,
    /// Replace the persisted record, carrying over labels the incoming definition lacks
    OverwriteInheritLabels,
    /// Keep the persisted record untouched
    Skip,
    /// Two definitions of the same kind
    Fail,
    /// Fill empty labels of known columns from DML
    Supplement,
    /// Union two DML-derived records by column name
    Merge,
}

/// The conflict table. Total over every pair of provenances.
pub fn resolve(existing: Provenance, incoming: Provenance) -> Action {
    use Provenance::{External, Statement};

    match (existing, incoming) {
        (External, _) => Action::Overwrite,
        (_, External) => Action::Skip,
        (Statement(old), Statement(new)) => match (old.is_definition(), new.is_definition()) {
            (true, true) if old == new => Action::Fail,
            (true, true) if new == StatementKind::CreateTable => Action::Overwrite,
            (true, true) => Action::Skip,
            (false, true) => Action::OverwriteInheritLabels,
            (true, false) => Action::Supplement,
            (false, false) => Action::Merge,
        },
    }
}

/// Two statements gave the same column different non-empty labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelConflict {
    pub table: String,
    pub column: String,
    /// Kept
    pub existing: String,
    /// Discarded
    pub incoming: String,
}

/// A DML statement named a column the table definition does not have
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownColumn {
    pub table: String,
    pub column: String,
}

/// Outcome of reconciling one table
#[derive(Debug, Clone)]
pub struct Resolution {
    pub action: Action,
    /// Record to persist; `None` leaves the store as it is
    pub record: Option<TableRecord>,
    pub defined_by: Option<String>,
    pub conflicts: Vec<LabelConflict>,
    pub notices: Vec<UnknownColumn>,
}

impl Resolution {
    fn replace(action: Action, record: TableRecord, script_id: &str) -> Self {
        Self {
            action,
            record: Some(record),
            defined_by: Some(script_id.to_string()),
            conflicts: Vec::new(),
            notices: Vec::new(),
        }
    }

    fn keep(action: Action, stored: &StoredTable, record: Option<TableRecord>) -> Self {
        Self {
            action,
            record,
            defined_by: stored.defined_by.clone(),
            conflicts: Vec::new(),
            notices: Vec::new(),
        }
    }
}

/// Reconcile an incoming record of `script_id` against what is persisted under the same id
pub fn reconcile(
    existing: Option<&StoredTable>,
    incoming: &TableRecord,
    script_id: &str,
    column_check: ColumnCheck,
) -> LineageResult<Resolution> {
    let Some(stored) = existing else {
        return Ok(Resolution::replace(Action::Overwrite, incoming.clone(), script_id));
    };

    // Re-processing a script replaces what it defined earlier, keeping labels it inherited
    if stored.record.provenance.is_definition()
        && incoming.provenance.is_definition()
        && stored.defined_by.as_deref() == Some(script_id)
    {
        return Ok(Resolution::replace(
            Action::Overwrite,
            inherit_labels(&stored.record, incoming),
            script_id,
        ));
    }

    let action = resolve(stored.record.provenance, incoming.provenance);
    match action {
        Action::Overwrite => Ok(Resolution::replace(action, incoming.clone(), script_id)),
        Action::Skip => Ok(Resolution::keep(action, stored, None)),
        Action::Fail => Err(LineageError::DuplicateDefinition {
            table: incoming.key.full_name(),
            kind: match incoming.provenance {
                Provenance::Statement(kind) => kind,
                Provenance::External => StatementKind::Unknown,
            },
            defined_by: stored.defined_by.clone().unwrap_or_default(),
        }),
        Action::OverwriteInheritLabels => Ok(Resolution::replace(
            action,
            inherit_labels(&stored.record, incoming),
            script_id,
        )),
        Action::Supplement => {
            let mut record = stored.record.clone();
            let notices = supplement(&mut record, incoming, column_check)?;
            let mut resolution = Resolution::keep(action, stored, Some(record));
            resolution.notices = notices;
            Ok(resolution)
        }
        Action::Merge => {
            let mut record = stored.record.clone();
            let conflicts = merge(&mut record, incoming);
            let mut resolution = Resolution::keep(action, stored, Some(record));
            resolution.conflicts = conflicts;
            Ok(resolution)
        }
    }
}

fn inherit_labels(previous: &TableRecord, incoming: &TableRecord) -> TableRecord {
    let mut record = incoming.clone();
    if record.label.is_empty() {
        record.label = previous.label.clone();
    }
    for col in record.columns.iter_mut().filter(|c| c.label.is_empty()) {
        if let Some(old) = previous.column(&col.name) {
            col.label = old.label.clone();
        }
    }
    record
}

fn supplement(
    record: &mut TableRecord,
    incoming: &TableRecord,
    column_check: ColumnCheck,
) -> LineageResult<Vec<UnknownColumn>> {
    let table = record.key.full_name();
    let mut notices = Vec::new();

    if record.label.is_empty() {
        record.label = incoming.label.clone();
    }

    for col in &incoming.columns {
        match record.column_mut(&col.name) {
            Some(known) => {
                if known.label.is_empty() {
                    known.label = col.label.clone();
                }
            }
            None => match column_check {
                ColumnCheck::Strict => {
                    return Err(LineageError::UnknownColumnReference {
                        table,
                        column: col.name.clone(),
                    })
                }
                ColumnCheck::Lenient => {
                    tracing::info!(table = %table, column = %col.name, "column not in table definition");
                    notices.push(UnknownColumn {
                        table: table.clone(),
                        column: col.name.clone(),
                    });
                }
            },
        }
    }

    Ok(notices)
}

fn merge(record: &mut TableRecord, incoming: &TableRecord) -> Vec<LabelConflict> {
    let table = record.key.full_name();
    let mut conflicts = Vec::new();

    if record.label.is_empty() {
        record.label = incoming.label.clone();
    }

    for col in &incoming.columns {
        let next = record.next_ordinal();
        let Some(known) = record.column_mut(&col.name) else {
            record.columns.push(ColumnRecord {
                ordinal: Some(next),
                provisional: true,
                ..col.clone()
            });
            continue;
        };

        if known.label.is_empty() {
            known.label = col.label.clone();
        } else if !col.label.is_empty() && col.label != known.label {
            tracing::warn!(
                table = %table,
                column = %col.name,
                kept = %known.label,
                ignored = %col.label,
                "label conflict"
            );
            conflicts.push(LabelConflict {
                table: table.clone(),
                column: col.name.clone(),
                existing: known.label.clone(),
                incoming: col.label.clone(),
            });
        }
        if known.data_type.is_empty() {
            known.data_type = col.data_type.clone();
        }
        if known.default_value.is_empty() {
            known.default_value = col.default_value.clone();
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{TableKey, TableKind};

    const ALL: [Provenance; 9] = [
        Provenance::External,
        Provenance::Statement(StatementKind::CreateTable),
        Provenance::Statement(StatementKind::CreateTableAs),
        Provenance::Statement(StatementKind::CreateView),
        Provenance::Statement(StatementKind::InsertSelect),
        Provenance::Statement(StatementKind::InsertValues),
        Provenance::Statement(StatementKind::Update),
        Provenance::Statement(StatementKind::Merge),
        Provenance::Statement(StatementKind::Unknown),
    ];

    fn record(provenance: StatementKind, columns: &[(&str, &str)]) -> TableRecord {
        let mut record = TableRecord::new(
            TableKey::new("s", "a"),
            TableKind::PersistentTable,
            Provenance::Statement(provenance),
        );
        for (i, (name, label)) in columns.iter().enumerate() {
            record.columns.push(
                ColumnRecord::new(*name)
                    .with_label(*label)
                    .with_ordinal(i as u32 + 1, !provenance.is_definition()),
            );
        }
        record
    }

    fn stored(record: TableRecord, defined_by: &str) -> StoredTable {
        StoredTable {
            record,
            defined_by: Some(defined_by.to_string()),
        }
    }

    #[test]
    fn test_external_rows_and_columns() {
        for p in ALL {
            assert_eq!(resolve(Provenance::External, p), Action::Overwrite);
            if p != Provenance::External {
                assert_eq!(resolve(p, Provenance::External), Action::Skip);
            }
        }
    }

    #[test]
    fn test_definition_pairs() {
        use StatementKind::*;
        let s = Provenance::Statement;

        assert_eq!(resolve(s(CreateTable), s(CreateTable)), Action::Fail);
        assert_eq!(resolve(s(CreateView), s(CreateView)), Action::Fail);
        assert_eq!(resolve(s(CreateTableAs), s(CreateTable)), Action::Overwrite);
        assert_eq!(resolve(s(CreateTable), s(CreateTableAs)), Action::Skip);
        assert_eq!(resolve(s(CreateView), s(CreateTableAs)), Action::Skip);
        assert_eq!(resolve(s(InsertSelect), s(CreateView)), Action::OverwriteInheritLabels);
        assert_eq!(resolve(s(CreateTable), s(Update)), Action::Supplement);
        assert_eq!(resolve(s(Merge), s(InsertValues)), Action::Merge);
    }

    #[test]
    fn test_same_kind_definition_from_other_script_fails() {
        let existing = stored(record(StatementKind::CreateTable, &[]), "first");
        let err = reconcile(
            Some(&existing),
            &record(StatementKind::CreateTable, &[]),
            "second",
            ColumnCheck::Lenient,
        )
        .unwrap_err();

        match err {
            LineageError::DuplicateDefinition { table, defined_by, .. } => {
                assert_eq!(table, "s.a");
                assert_eq!(defined_by, "first");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rerun_of_defining_script_overwrites() {
        let existing = stored(record(StatementKind::CreateTable, &[("x", "")]), "first");
        let incoming = record(StatementKind::CreateTable, &[("x", "X")]);
        let resolution = reconcile(Some(&existing), &incoming, "first", ColumnCheck::Lenient).unwrap();

        assert_eq!(resolution.action, Action::Overwrite);
        assert_eq!(resolution.record, Some(incoming));
    }

    #[test]
    fn test_rerun_keeps_labels_inherited_from_dml() {
        let mut first = record(StatementKind::CreateTable, &[("x", "Ex"), ("y", "")]);
        first.label = "Accounts".to_string();
        let existing = stored(first, "ddl");
        let incoming = record(StatementKind::CreateTable, &[("x", ""), ("y", "")]);

        let resolution = reconcile(Some(&existing), &incoming, "ddl", ColumnCheck::Lenient).unwrap();
        let merged = resolution.record.unwrap();
        assert_eq!(resolution.action, Action::Overwrite);
        assert_eq!(merged.label, "Accounts");
        assert_eq!(merged.column("x").unwrap().label, "Ex");
        assert_eq!(merged.column("y").unwrap().label, "");
    }

    #[test]
    fn test_definition_inherits_dml_labels() {
        let existing = stored(record(StatementKind::InsertSelect, &[("x", "Ex"), ("y", "Why")]), "load");
        let incoming = record(StatementKind::CreateTable, &[("x", ""), ("y", "Y")]);
        let resolution = reconcile(Some(&existing), &incoming, "ddl", ColumnCheck::Lenient).unwrap();

        let merged = resolution.record.unwrap();
        assert_eq!(resolution.action, Action::OverwriteInheritLabels);
        assert_eq!(resolution.defined_by.as_deref(), Some("ddl"));
        assert_eq!(merged.column("x").unwrap().label, "Ex");
        assert_eq!(merged.column("y").unwrap().label, "Y");
    }

    #[test]
    fn test_supplement_fills_known_columns_only() {
        let existing = stored(record(StatementKind::CreateTable, &[("x", ""), ("y", "Why")]), "ddl");
        let incoming = record(StatementKind::Update, &[("x", "Ex"), ("y", "Other"), ("z", "Zed")]);

        let resolution = reconcile(Some(&existing), &incoming, "load", ColumnCheck::Lenient).unwrap();
        let merged = resolution.record.unwrap();
        assert_eq!(resolution.defined_by.as_deref(), Some("ddl"));
        assert_eq!(merged.columns.len(), 2);
        assert_eq!(merged.column("x").unwrap().label, "Ex");
        assert_eq!(merged.column("y").unwrap().label, "Why");
        assert_eq!(
            resolution.notices,
            vec![UnknownColumn {
                table: "s.a".into(),
                column: "z".into()
            }]
        );

        let strict = reconcile(Some(&existing), &incoming, "load", ColumnCheck::Strict);
        assert!(matches!(
            strict,
            Err(LineageError::UnknownColumnReference { ref column, .. }) if column == "z"
        ));
    }

    #[test]
    fn test_merge_reports_label_conflicts_and_appends() {
        let existing = stored(record(StatementKind::InsertSelect, &[("x", "Ex")]), "one");
        let incoming = record(StatementKind::InsertSelect, &[("new", ""), ("x", "Other")]);

        let resolution = reconcile(Some(&existing), &incoming, "two", ColumnCheck::Lenient).unwrap();
        let merged = resolution.record.unwrap();
        assert_eq!(merged.column("x").unwrap().label, "Ex");
        assert_eq!(merged.column("new").unwrap().ordinal, Some(2));
        assert!(merged.column("new").unwrap().provisional);
        assert_eq!(resolution.conflicts.len(), 1);
        assert_eq!(resolution.conflicts[0].incoming, "Other");
    }

    #[test]
    fn test_external_incoming_is_skipped() {
        let existing = stored(record(StatementKind::CreateView, &[]), "v");
        let incoming = TableRecord::external(TableKey::new("s", "a"));
        let resolution = reconcile(Some(&existing), &incoming, "other", ColumnCheck::Strict).unwrap();
        assert_eq!(resolution.action, Action::Skip);
        assert!(resolution.record.is_none());
    }
}
