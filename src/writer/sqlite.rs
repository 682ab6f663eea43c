use anyhow::{Context, Result};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql, Transaction};
use serde::Serialize;
use std::path::Path;

use super::catalog::ALL_TABLES;
use super::schema_gen::{generate_create_table, generate_drop_table, generate_indexes};
use crate::lineage::{DetailEdge, DetailRow, LineageNode, SummaryEdge};
use crate::parser::{ScriptFacts, Statement};
use crate::schema::{
    column_id, ColumnRecord, Provenance, StatementKind, StoredTable, TableKey, TableKind,
    TableRecord,
};

/// SQLite lineage store
pub struct LineageStore {
    conn: Connection,
}

/// Row counts per store table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub tables: u64,
    pub columns: u64,
    pub scripts: u64,
    pub statements: u64,
    pub script_lineage: u64,
    pub detail_edges: u64,
    pub summary_edges: u64,
}

impl LineageStore {
    /// Open (or create) a store file and make sure every table exists
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {:?}", db_path))?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Create missing tables and indexes
    pub fn ensure_schema(&self) -> Result<()> {
        for table in ALL_TABLES {
            let sql = generate_create_table(table);
            self.conn
                .execute(&sql, [])
                .with_context(|| format!("Failed to create table: {}", table.name))?;

            for index_sql in generate_indexes(table) {
                self.conn
                    .execute(&index_sql, [])
                    .with_context(|| format!("Failed to create index for: {}", table.name))?;
            }
        }
        Ok(())
    }

    /// Drop every table and recreate the empty schema
    pub fn reset(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for table in ALL_TABLES.iter().rev() {
            tx.execute(&generate_drop_table(table), [])
                .with_context(|| format!("Failed to drop table: {}", table.name))?;
        }
        tx.commit()?;

        tracing::info!("store reset");
        self.ensure_schema()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin the transaction covering one script
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        let count = |table: &str| -> Result<u64> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                .with_context(|| format!("Failed to count rows of {}", table))?;
            Ok(n as u64)
        };

        Ok(StoreCounts {
            tables: count("tables")?,
            columns: count("columns")?,
            scripts: count("sql_scripts")?,
            statements: count("script_statements")?,
            script_lineage: count("data_lineage")?,
            detail_edges: count("data_lineage_detail")?,
            summary_edges: count("data_lineage_summary")?,
        })
    }

    pub fn script_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM sql_scripts ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Finalize the database
    pub fn finalize(self) -> Result<()> {
        self.conn.execute_batch("PRAGMA optimize;")?;
        Ok(())
    }
}

impl ToSql for TableKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TableKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        TableKind::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("invalid table kind: {}", text).into()))
    }
}

impl ToSql for StatementKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for StatementKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        StatementKind::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("invalid statement kind: {}", text).into()))
    }
}

impl ToSql for Provenance {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Provenance {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Provenance::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("invalid provenance: {}", text).into()))
    }
}

/// Load a persisted table with its columns
pub fn load_table(conn: &Connection, id: &str) -> Result<Option<StoredTable>> {
    let stored = conn
        .query_row(
            "SELECT schema_name, table_name, kind, provenance, label, defined_by
             FROM tables WHERE id = ?1",
            params![id],
            |row| {
                let mut record = TableRecord::new(
                    TableKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                    row.get(2)?,
                    row.get(3)?,
                );
                record.label = row.get::<_, Option<String>>(4)?.unwrap_or_default();
                Ok(StoredTable {
                    record,
                    defined_by: row.get(5)?,
                })
            },
        )
        .optional()
        .with_context(|| format!("Failed to load table: {}", id))?;

    let Some(mut stored) = stored else {
        return Ok(None);
    };
    stored.record.columns = load_columns(conn, id)?;

    Ok(Some(stored))
}

fn load_columns(conn: &Connection, table_id: &str) -> Result<Vec<ColumnRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT column_name, label, ordinal, provisional, data_type, nullable,
                default_value, is_primary_key, is_foreign_key
         FROM columns WHERE table_id = ?1
         ORDER BY ordinal IS NULL, ordinal, rowid",
    )?;

    let columns = stmt
        .query_map(params![table_id], |row| {
            Ok(ColumnRecord {
                name: row.get(0)?,
                label: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                ordinal: row.get(2)?,
                provisional: row.get(3)?,
                data_type: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                nullable: row.get(5)?,
                default_value: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                primary_key: row.get(7)?,
                foreign_key: row.get(8)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("Failed to load columns of {}", table_id))?;

    Ok(columns)
}

/// Insert or replace a table record and all of its columns
pub fn write_table(
    conn: &Connection,
    id: &str,
    record: &TableRecord,
    owning_script: Option<&str>,
    defined_by: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO tables (id, schema_name, table_name, script_id, kind, provenance, label, defined_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
             kind = excluded.kind,
             provenance = excluded.provenance,
             label = excluded.label,
             defined_by = excluded.defined_by",
        params![
            id,
            record.key.schema,
            record.key.name,
            owning_script,
            record.kind,
            record.provenance,
            record.label,
            defined_by,
        ],
    )
    .with_context(|| format!("Failed to write table: {}", id))?;

    conn.execute("DELETE FROM columns WHERE table_id = ?1", params![id])?;

    let mut stmt = conn.prepare_cached(
        "INSERT INTO columns (id, table_id, column_name, label, ordinal, provisional, data_type,
                              nullable, default_value, is_primary_key, is_foreign_key)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    for col in &record.columns {
        stmt.execute(params![
            column_id(id, &col.name),
            id,
            col.name,
            col.label,
            col.ordinal,
            col.provisional,
            col.data_type,
            col.nullable,
            col.default_value,
            col.primary_key,
            col.foreign_key,
        ])
        .with_context(|| format!("Failed to write column {} of {}", col.name, id))?;
    }

    Ok(())
}

/// Remove every statement and lineage row a script produced earlier
pub fn clear_script(conn: &Connection, script_id: &str) -> Result<()> {
    for table in [
        "data_lineage_summary",
        "data_lineage_detail",
        "data_lineage",
        "script_statements",
    ] {
        conn.execute(
            &format!("DELETE FROM {} WHERE script_id = ?1", table),
            params![script_id],
        )
        .with_context(|| format!("Failed to clear {} for script {}", table, script_id))?;
    }
    Ok(())
}

pub fn upsert_script(conn: &Connection, facts: &ScriptFacts) -> Result<()> {
    let source_path = facts.source_path.to_string_lossy();
    conn.execute(
        "INSERT INTO sql_scripts (id, script_name, source_path, sql_content)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
             source_path = excluded.source_path,
             sql_content = excluded.sql_content",
        params![facts.script_id, facts.script_id, source_path, facts.sql],
    )
    .with_context(|| format!("Failed to write script: {}", facts.script_id))?;
    Ok(())
}

pub fn insert_statement(
    conn: &Connection,
    script_id: &str,
    statement: &Statement,
    target_table_id: Option<&str>,
) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO script_statements (id, script_id, statement_index, statement_kind, target_table_id, sql_text)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    stmt.execute(params![
        statement.id(script_id),
        script_id,
        statement.index,
        statement.kind,
        target_table_id,
        statement.fact.sql,
    ])
    .with_context(|| format!("Failed to write statement {}", statement.id(script_id)))?;
    Ok(())
}

pub fn insert_detail_edge(
    conn: &Connection,
    source_id: &str,
    target_id: &str,
    statement_id: &str,
    script_id: &str,
) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO data_lineage_detail (source_table_id, target_table_id, statement_id, script_id)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    stmt.execute(params![source_id, target_id, statement_id, script_id])
        .with_context(|| format!("Failed to write detail edge {} -> {}", source_id, target_id))?;
    Ok(())
}

pub fn insert_script_lineage(
    conn: &Connection,
    target_id: &str,
    source_id: &str,
    script_id: &str,
) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO data_lineage (target_table_id, source_table_id, script_id)
         VALUES (?1, ?2, ?3)",
    )?;
    stmt.execute(params![target_id, source_id, script_id])?;
    Ok(())
}

pub fn insert_summary_edge(conn: &Connection, edge: &SummaryEdge) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO data_lineage_summary
             (source_table_id, target_table_id, script_id, path_count, min_hop_count, max_hop_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    stmt.execute(params![
        edge.source,
        edge.target,
        edge.script_id,
        edge.path_count as i64,
        edge.min_hop_count,
        edge.max_hop_count,
    ])
    .with_context(|| format!("Failed to write summary edge {} -> {}", edge.source, edge.target))?;
    Ok(())
}

fn lineage_node(row: &Row<'_>, offset: usize) -> rusqlite::Result<LineageNode> {
    Ok(LineageNode {
        id: row.get(offset)?,
        schema: row.get(offset + 1)?,
        table: row.get(offset + 2)?,
        kind: row.get(offset + 3)?,
    })
}

/// Persisted detail edges of one script, or of all scripts
pub fn query_detail_rows(conn: &Connection, script_id: Option<&str>) -> Result<Vec<DetailRow>> {
    let mut stmt = conn.prepare_cached(
        "SELECT s.id, s.schema_name, s.table_name, s.kind,
                t.id, t.schema_name, t.table_name, t.kind,
                d.script_id, d.statement_id, st.statement_index, st.statement_kind
         FROM data_lineage_detail d
         JOIN tables s ON s.id = d.source_table_id
         JOIN tables t ON t.id = d.target_table_id
         JOIN script_statements st ON st.id = d.statement_id
         WHERE ?1 IS NULL OR d.script_id = ?1
         ORDER BY d.script_id, st.statement_index, d.id",
    )?;

    let rows = stmt
        .query_map(params![script_id], |row| {
            Ok(DetailRow {
                source: lineage_node(row, 0)?,
                target: lineage_node(row, 4)?,
                edge: DetailEdge {
                    script_id: row.get(8)?,
                    statement_id: row.get(9)?,
                    statement_index: row.get(10)?,
                    statement_kind: row.get(11)?,
                },
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to query detail lineage")?;

    Ok(rows)
}

/// Persisted summary edges of one script, or of all scripts
pub fn query_summary_edges(conn: &Connection, script_id: Option<&str>) -> Result<Vec<SummaryEdge>> {
    let mut stmt = conn.prepare_cached(
        "SELECT source_table_id, target_table_id, script_id, path_count, min_hop_count, max_hop_count
         FROM data_lineage_summary
         WHERE ?1 IS NULL OR script_id = ?1
         ORDER BY source_table_id, target_table_id, script_id",
    )?;

    let edges = stmt
        .query_map(params![script_id], |row| {
            Ok(SummaryEdge {
                source: row.get(0)?,
                target: row.get(1)?,
                script_id: row.get(2)?,
                path_count: row.get::<_, i64>(3)? as u64,
                min_hop_count: row.get(4)?,
                max_hop_count: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to query summary lineage")?;

    Ok(edges)
}

/// Every entity table (persistent tables and views)
pub fn query_entity_nodes(conn: &Connection) -> Result<Vec<LineageNode>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, schema_name, table_name, kind FROM tables
         WHERE kind != 'TEMP_TABLE' ORDER BY id",
    )?;
    let nodes = stmt
        .query_map([], |row| lineage_node(row, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to query entity tables")?;

    Ok(nodes)
}
