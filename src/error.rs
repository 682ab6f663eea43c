use crate::schema::StatementKind;

/// Fatal conditions raised while consolidating and persisting one script
#[derive(Debug, thiserror::Error)]
pub enum LineageError {
    #[error("Table {table} already has a {kind} definition from script {defined_by}")]
    DuplicateDefinition {
        table: String,
        kind: StatementKind,
        defined_by: String,
    },

    #[error("Column {column} is not part of the definition of {table}")]
    UnknownColumnReference { table: String, column: String },

    #[error("No target table could be identified in script {script_id}")]
    NoTargetIdentified { script_id: String },
}

pub type LineageResult<T> = Result<T, LineageError>;
