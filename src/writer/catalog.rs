//! Store table definitions

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Text,
    /// Stored as INTEGER 0/1
    Boolean,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer | ColumnType::Boolean => "INTEGER",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreColumn {
    pub name: &'static str,
    pub col_type: ColumnType,
    pub nullable: bool,
}

impl StoreColumn {
    /// Create an optional (nullable) column
    pub const fn new(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: true,
        }
    }

    /// Create a required (non-nullable) column
    pub const fn required(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references_table: &'static str,
    pub references_column: &'static str,
}

impl ForeignKey {
    pub const fn new(column: &'static str, references_table: &'static str) -> Self {
        Self {
            column,
            references_table,
            references_column: "id",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Index {
    pub columns: &'static [&'static str],
    pub unique: bool,
}

impl Index {
    pub const fn on(columns: &'static [&'static str]) -> Self {
        Self {
            columns,
            unique: false,
        }
    }

    pub const fn unique(columns: &'static [&'static str]) -> Self {
        Self {
            columns,
            unique: true,
        }
    }
}

/// A store table. The `id` column is the primary key.
#[derive(Debug, Clone)]
pub struct StoreTable {
    pub name: &'static str,
    pub columns: &'static [StoreColumn],
    pub foreign_keys: &'static [ForeignKey],
    pub indexes: &'static [Index],
}

use ColumnType::{Boolean, Integer, Text};

pub static SQL_SCRIPTS: StoreTable = StoreTable {
    name: "sql_scripts",
    columns: &[
        StoreColumn::required("id", Text),
        StoreColumn::required("script_name", Text),
        StoreColumn::new("source_path", Text),
        StoreColumn::new("sql_content", Text),
    ],
    foreign_keys: &[],
    indexes: &[],
};

pub static TABLES: StoreTable = StoreTable {
    name: "tables",
    columns: &[
        StoreColumn::required("id", Text),
        StoreColumn::required("schema_name", Text),
        StoreColumn::required("table_name", Text),
        // Owning script of a temp table
        StoreColumn::new("script_id", Text),
        StoreColumn::required("kind", Text),
        StoreColumn::required("provenance", Text),
        StoreColumn::new("label", Text),
        StoreColumn::new("defined_by", Text),
    ],
    foreign_keys: &[],
    indexes: &[Index::on(&["schema_name", "table_name"])],
};

pub static COLUMNS: StoreTable = StoreTable {
    name: "columns",
    columns: &[
        StoreColumn::required("id", Text),
        StoreColumn::required("table_id", Text),
        StoreColumn::required("column_name", Text),
        StoreColumn::new("label", Text),
        StoreColumn::new("ordinal", Integer),
        StoreColumn::required("provisional", Boolean),
        StoreColumn::new("data_type", Text),
        StoreColumn::required("nullable", Boolean),
        StoreColumn::new("default_value", Text),
        StoreColumn::required("is_primary_key", Boolean),
        StoreColumn::required("is_foreign_key", Boolean),
    ],
    foreign_keys: &[ForeignKey::new("table_id", "tables")],
    indexes: &[],
};

pub static SCRIPT_STATEMENTS: StoreTable = StoreTable {
    name: "script_statements",
    columns: &[
        StoreColumn::required("id", Text),
        StoreColumn::required("script_id", Text),
        StoreColumn::required("statement_index", Integer),
        StoreColumn::required("statement_kind", Text),
        StoreColumn::new("target_table_id", Text),
        StoreColumn::new("sql_text", Text),
    ],
    foreign_keys: &[
        ForeignKey::new("script_id", "sql_scripts"),
        ForeignKey::new("target_table_id", "tables"),
    ],
    indexes: &[],
};

pub static DATA_LINEAGE: StoreTable = StoreTable {
    name: "data_lineage",
    columns: &[
        StoreColumn::required("id", Integer),
        StoreColumn::required("target_table_id", Text),
        StoreColumn::required("source_table_id", Text),
        StoreColumn::required("script_id", Text),
    ],
    foreign_keys: &[
        ForeignKey::new("target_table_id", "tables"),
        ForeignKey::new("source_table_id", "tables"),
        ForeignKey::new("script_id", "sql_scripts"),
    ],
    indexes: &[Index::unique(&["target_table_id", "source_table_id", "script_id"])],
};

pub static DATA_LINEAGE_DETAIL: StoreTable = StoreTable {
    name: "data_lineage_detail",
    columns: &[
        StoreColumn::required("id", Integer),
        StoreColumn::required("source_table_id", Text),
        StoreColumn::required("target_table_id", Text),
        StoreColumn::required("statement_id", Text),
        StoreColumn::required("script_id", Text),
    ],
    foreign_keys: &[
        ForeignKey::new("source_table_id", "tables"),
        ForeignKey::new("target_table_id", "tables"),
        ForeignKey::new("statement_id", "script_statements"),
        ForeignKey::new("script_id", "sql_scripts"),
    ],
    indexes: &[Index::unique(&["source_table_id", "target_table_id", "statement_id"])],
};

pub static DATA_LINEAGE_SUMMARY: StoreTable = StoreTable {
    name: "data_lineage_summary",
    columns: &[
        StoreColumn::required("id", Integer),
        StoreColumn::required("source_table_id", Text),
        StoreColumn::required("target_table_id", Text),
        StoreColumn::required("script_id", Text),
        StoreColumn::required("path_count", Integer),
        StoreColumn::required("min_hop_count", Integer),
        StoreColumn::required("max_hop_count", Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("source_table_id", "tables"),
        ForeignKey::new("target_table_id", "tables"),
        ForeignKey::new("script_id", "sql_scripts"),
    ],
    indexes: &[Index::unique(&["source_table_id", "target_table_id", "script_id"])],
};

/// Every store table, parents before children
pub static ALL_TABLES: &[&StoreTable] = &[
    &SQL_SCRIPTS,
    &TABLES,
    &COLUMNS,
    &SCRIPT_STATEMENTS,
    &DATA_LINEAGE,
    &DATA_LINEAGE_DETAIL,
    &DATA_LINEAGE_SUMMARY,
];

pub fn get_table(name: &str) -> Option<&'static StoreTable> {
    ALL_TABLES.iter().copied().find(|t| t.name == name)
}
