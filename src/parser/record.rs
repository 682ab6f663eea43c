use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::classify::classify;
use crate::schema::{statement_id, StatementKind, TableKey};

/// File extension of fact files produced by the extractor
pub const FACT_EXTENSION: &str = "jsonl";

/// A table reference as reported by the extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFact {
    #[serde(default)]
    pub schema: Option<String>,
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl TableFact {
    pub fn key(&self) -> TableKey {
        TableKey::new(
            self.schema.as_deref().unwrap_or("").trim(),
            self.name.trim(),
        )
    }
}

/// A target column as reported by the extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFact {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub ordinal: Option<u32>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub foreign_key: bool,
}

/// One SQL statement reduced to the facts lineage needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRecord {
    #[serde(default)]
    pub statement_index: Option<u32>,
    /// Statement node reported by the extractor (`create`, `insert`, `update`, `merge`, ...)
    pub statement_kind: String,
    /// Object keyword of a CREATE (`TABLE`, `VIEW`, `VOLATILE TABLE`, ...)
    #[serde(default)]
    pub create_kind: Option<String>,
    #[serde(default)]
    pub temporary: bool,
    #[serde(default)]
    pub has_query: bool,
    #[serde(default)]
    pub has_column_list: bool,
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub target: Option<TableFact>,
    #[serde(default)]
    pub target_columns: Vec<ColumnFact>,
    #[serde(default)]
    pub source_tables: Vec<TableFact>,
}

/// A classified statement of a script
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// 1-based position within the script
    pub index: u32,
    pub kind: StatementKind,
    pub fact: FactRecord,
}

impl Statement {
    pub fn new(index: u32, fact: FactRecord) -> Self {
        Self {
            index,
            kind: classify(&fact),
            fact,
        }
    }

    pub fn id(&self, script_id: &str) -> String {
        statement_id(script_id, self.index)
    }

    pub fn target_key(&self) -> Option<TableKey> {
        self.fact
            .target
            .as_ref()
            .map(TableFact::key)
            .filter(|k| !k.name.is_empty())
    }

    /// Distinct source tables in order of first appearance
    pub fn source_keys(&self) -> Vec<TableKey> {
        let mut seen = BTreeSet::new();
        self.fact
            .source_tables
            .iter()
            .map(TableFact::key)
            .filter(|k| !k.name.is_empty() && seen.insert(k.clone()))
            .collect()
    }
}

/// Every fact of one script
#[derive(Debug, Clone)]
pub struct ScriptFacts {
    pub script_id: String,
    pub source_path: PathBuf,
    /// Raw SQL of the script when a sibling `.sql` file exists
    pub sql: Option<String>,
    pub statements: Vec<Statement>,
}

impl ScriptFacts {
    /// Build a script directly from fact records (statement indexes default to position)
    pub fn from_records(script_id: impl Into<String>, records: Vec<FactRecord>) -> Self {
        let statements = records
            .into_iter()
            .enumerate()
            .map(|(pos, fact)| {
                let index = fact.statement_index.unwrap_or(pos as u32 + 1);
                Statement::new(index, fact)
            })
            .collect();

        Self {
            script_id: script_id.into(),
            source_path: PathBuf::new(),
            sql: None,
            statements,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Parse one JSON line into a fact record
pub fn parse_record(line: &str) -> Result<FactRecord> {
    let record: FactRecord = serde_json::from_str(line).context("Failed to parse JSON")?;
    Ok(record)
}

/// Script id of a fact file: its file name without `.jsonl` (and a trailing `.sql`)
pub fn script_id_for(path: &Path) -> Result<String> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("Invalid fact file name: {:?}", path))?;
    let id = stem.strip_suffix(".sql").unwrap_or(stem);
    if id.is_empty() {
        bail!("Empty script id for fact file: {:?}", path);
    }
    Ok(id.to_string())
}

/// Load every fact record of a script from its JSONL file
pub fn load_script(path: &Path) -> Result<ScriptFacts> {
    let script_id = script_id_for(path)?;
    let file = File::open(path).with_context(|| format!("Failed to open: {:?}", path))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }

        let record = parse_record(&line).with_context(|| {
            format!("Failed to parse fact record at {:?}:{}", path, line_no + 1)
        })?;
        records.push(record);
    }

    let mut script = ScriptFacts::from_records(script_id, records);
    script.source_path = path.to_path_buf();

    let sql_path = path.with_file_name(format!("{}.sql", script.script_id));
    if sql_path.is_file() {
        let sql = fs::read_to_string(&sql_path)
            .with_context(|| format!("Failed to read: {:?}", sql_path))?;
        script.sql = Some(sql);
    }

    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_minimal_record() {
        let record = parse_record(
            r#"{"statement_kind":"insert","target":{"schema":"s","name":"a"},"source_tables":[{"name":"tmp"}]}"#,
        )
        .unwrap();

        assert_eq!(record.statement_kind, "insert");
        assert_eq!(record.target.unwrap().key(), TableKey::new("s", "a"));
        assert_eq!(record.source_tables[0].key(), TableKey::new("", "tmp"));
        assert!(record.target_columns.is_empty());
    }

    #[test]
    fn test_script_id_for() {
        assert_eq!(script_id_for(Path::new("dir/load_a.jsonl")).unwrap(), "load_a");
        assert_eq!(script_id_for(Path::new("load_b.sql.jsonl")).unwrap(), "load_b");
    }

    #[test]
    fn test_source_keys_are_distinct() {
        let stmt = Statement::new(
            1,
            parse_record(
                r#"{"statement_kind":"insert","has_query":true,"target":{"name":"t"},
                    "source_tables":[{"schema":"s","name":"b"},{"schema":"s","name":"b"},{"name":""}]}"#,
            )
            .unwrap(),
        );
        assert_eq!(stmt.source_keys(), vec![TableKey::new("s", "b")]);
    }

    #[test]
    fn test_load_script_skips_blank_lines_and_numbers_statements() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"statement_kind":"create","target":{{"schema":"s","name":"a"}}}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"statement_kind":"update","target":{{"schema":"s","name":"a"}}}}"#).unwrap();
        std::fs::write(dir.path().join("job.sql"), "CREATE TABLE s.a (x INT);").unwrap();

        let script = load_script(&path).unwrap();
        assert_eq!(script.script_id, "job");
        assert_eq!(script.statements.len(), 2);
        assert_eq!(script.statements[1].index, 2);
        assert_eq!(script.statements[1].kind, StatementKind::Update);
        assert!(script.sql.unwrap().starts_with("CREATE TABLE"));
    }

    #[test]
    fn test_load_script_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();

        let err = load_script(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.jsonl\":1"));
    }
}
