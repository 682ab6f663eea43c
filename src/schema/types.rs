use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the parts of every persisted identifier
pub const ID_SEPARATOR: &str = "__";

/// A table as written in SQL: optional schema plus table name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableKey {
    /// Empty when the statement did not qualify the table
    pub schema: String,
    pub name: String,
}

impl TableKey {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn is_qualified(&self) -> bool {
        !self.schema.is_empty()
    }

    /// `schema.name`, or just `name` for unqualified tables
    pub fn full_name(&self) -> String {
        if self.is_qualified() {
            format!("{}.{}", self.schema, self.name)
        } else {
            self.name.clone()
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Persisted table kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableKind {
    PersistentTable,
    View,
    TempTable,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::PersistentTable => "PERSISTENT_TABLE",
            TableKind::View => "VIEW",
            TableKind::TempTable => "TEMP_TABLE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PERSISTENT_TABLE" => Some(TableKind::PersistentTable),
            "VIEW" => Some(TableKind::View),
            "TEMP_TABLE" => Some(TableKind::TempTable),
            _ => None,
        }
    }

    /// Entity tables are the nodes kept in summary lineage
    pub fn is_entity(&self) -> bool {
        !matches!(self, TableKind::TempTable)
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statement kinds shared by every downstream component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementKind {
    CreateTable,
    CreateTableAs,
    CreateView,
    InsertSelect,
    InsertValues,
    Update,
    Merge,
    Unknown,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::CreateTable => "CREATE_TABLE",
            StatementKind::CreateTableAs => "CREATE_TABLE_AS",
            StatementKind::CreateView => "CREATE_VIEW",
            StatementKind::InsertSelect => "INSERT_SELECT",
            StatementKind::InsertValues => "INSERT_VALUES",
            StatementKind::Update => "UPDATE",
            StatementKind::Merge => "MERGE",
            StatementKind::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATE_TABLE" => Some(StatementKind::CreateTable),
            "CREATE_TABLE_AS" => Some(StatementKind::CreateTableAs),
            "CREATE_VIEW" => Some(StatementKind::CreateView),
            "INSERT_SELECT" => Some(StatementKind::InsertSelect),
            "INSERT_VALUES" => Some(StatementKind::InsertValues),
            "UPDATE" => Some(StatementKind::Update),
            "MERGE" => Some(StatementKind::Merge),
            "UNKNOWN" => Some(StatementKind::Unknown),
            _ => None,
        }
    }

    /// CREATE statements (DDL)
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            StatementKind::CreateTable | StatementKind::CreateTableAs | StatementKind::CreateView
        )
    }

    /// Data-modifying statements (DML)
    pub fn is_dml(&self) -> bool {
        matches!(
            self,
            StatementKind::InsertSelect
                | StatementKind::InsertValues
                | StatementKind::Update
                | StatementKind::Merge
        )
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which statement most authoritatively describes a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// Contributed by a statement of this kind
    Statement(StatementKind),
    /// Referenced as a source but never defined or written
    External,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Statement(kind) => kind.as_str(),
            Provenance::External => "EXTERNAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        if s == "EXTERNAL" {
            return Some(Provenance::External);
        }
        StatementKind::parse(s).map(Provenance::Statement)
    }

    pub fn is_definition(&self) -> bool {
        matches!(self, Provenance::Statement(kind) if kind.is_definition())
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Table identifier: `{SCHEMA}__{NAME}__{SCRIPT_ID}`, the script part empty for persistent tables
pub fn table_id(key: &TableKey, owning_script: Option<&str>) -> String {
    format!(
        "{}{sep}{}{sep}{}",
        key.schema,
        key.name,
        owning_script.unwrap_or(""),
        sep = ID_SEPARATOR
    )
}

/// Column identifier: the owning table id extended with `__{COLUMN}`
pub fn column_id(table_id: &str, column: &str) -> String {
    format!("{}{}{}", table_id, ID_SEPARATOR, column)
}

/// Statement identifier: `{SCRIPT_ID}__{INDEX}`
pub fn statement_id(script_id: &str, index: u32) -> String {
    format!("{}{}{}", script_id, ID_SEPARATOR, index)
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRecord {
    pub name: String,
    pub label: String,
    pub ordinal: Option<u32>,
    /// Ordinal was assigned from a DML statement and may be replaced by a definition
    pub provisional: bool,
    pub data_type: String,
    pub nullable: bool,
    pub default_value: String,
    pub primary_key: bool,
    pub foreign_key: bool,
}

impl ColumnRecord {
    /// Create a nullable column with no metadata besides its name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: String::new(),
            ordinal: None,
            provisional: true,
            data_type: String::new(),
            nullable: true,
            default_value: String::new(),
            primary_key: false,
            foreign_key: false,
        }
    }

    pub fn with_label(self, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..self
        }
    }

    pub fn with_ordinal(self, ordinal: u32, provisional: bool) -> Self {
        Self {
            ordinal: Some(ordinal),
            provisional,
            ..self
        }
    }
}

/// Consolidated metadata for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRecord {
    pub key: TableKey,
    pub kind: TableKind,
    pub provenance: Provenance,
    pub label: String,
    pub columns: Vec<ColumnRecord>,
}

impl TableRecord {
    pub fn new(key: TableKey, kind: TableKind, provenance: Provenance) -> Self {
        Self {
            key,
            kind,
            provenance,
            label: String::new(),
            columns: Vec::new(),
        }
    }

    /// Placeholder for a table that is only read from.
    /// Unqualified names are script-local, like any other unqualified write target.
    pub fn external(key: TableKey) -> Self {
        let kind = if key.is_qualified() {
            TableKind::PersistentTable
        } else {
            TableKind::TempTable
        };
        Self::new(key, kind, Provenance::External)
    }

    /// The script a temp table belongs to; persistent tables and views have none
    pub fn owning_script<'a>(&self, script_id: &'a str) -> Option<&'a str> {
        match self.kind {
            TableKind::TempTable => Some(script_id),
            _ => None,
        }
    }

    pub fn id(&self, script_id: &str) -> String {
        table_id(&self.key, self.owning_script(script_id))
    }

    pub fn column(&self, name: &str) -> Option<&ColumnRecord> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnRecord> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Next ordinal after every known column
    pub fn next_ordinal(&self) -> u32 {
        self.columns
            .iter()
            .filter_map(|c| c.ordinal)
            .max()
            .unwrap_or(0)
            .max(self.columns.len() as u32)
            + 1
    }
}

/// A table record as persisted, with the script that contributed its definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTable {
    pub record: TableRecord,
    pub defined_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistent_table_id() {
        let key = TableKey::new("S", "A");
        assert_eq!(table_id(&key, None), "S__A__");
        assert_eq!(column_id(&table_id(&key, None), "ID"), "S__A____ID");
    }

    #[test]
    fn test_temp_table_id() {
        assert_eq!(table_id(&TableKey::new("", "tmp"), Some("script1")), "__tmp__script1");
        assert_eq!(table_id(&TableKey::new("db", "vt"), Some("s2")), "db__vt__s2");
        assert_eq!(column_id("__tmp__script1", "c"), "__tmp__script1__c");
    }

    #[test]
    fn test_external_kind_follows_qualification() {
        assert_eq!(TableRecord::external(TableKey::new("s", "b")).kind, TableKind::PersistentTable);
        assert_eq!(TableRecord::external(TableKey::new("", "b")).kind, TableKind::TempTable);
    }

    #[test]
    fn test_provenance_round_trips_through_text() {
        for text in ["EXTERNAL", "CREATE_TABLE", "MERGE", "INSERT_SELECT"] {
            assert_eq!(Provenance::parse(text).map(|p| p.as_str()), Some(text));
        }
        assert!(Provenance::parse("DDL").is_none());
    }

    #[test]
    fn test_next_ordinal() {
        let mut record = TableRecord::new(
            TableKey::new("s", "a"),
            TableKind::PersistentTable,
            Provenance::Statement(StatementKind::CreateTable),
        );
        assert_eq!(record.next_ordinal(), 1);
        record.columns.push(ColumnRecord::new("x").with_ordinal(4, false));
        assert_eq!(record.next_ordinal(), 5);
    }
}
