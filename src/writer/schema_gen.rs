use super::catalog::StoreTable;

/// Generate CREATE TABLE SQL for a store table
pub fn generate_create_table(table: &StoreTable) -> String {
    let mut sql = format!("CREATE TABLE IF NOT EXISTS {} (\n", table.name);
    let mut columns = Vec::new();

    for col in table.columns {
        let null_constraint = if !col.nullable { " NOT NULL" } else { "" };
        let pk = if col.name == "id" { " PRIMARY KEY" } else { "" };

        columns.push(format!(
            "    {} {}{}{}",
            col.name,
            col.col_type.sql_type(),
            pk,
            null_constraint
        ));
    }

    for fk in table.foreign_keys {
        columns.push(format!(
            "    FOREIGN KEY ({}) REFERENCES {}({})",
            fk.column, fk.references_table, fk.references_column
        ));
    }

    sql.push_str(&columns.join(",\n"));
    sql.push_str("\n)");

    sql
}

/// Generate CREATE INDEX statements for foreign key columns and declared indexes
pub fn generate_indexes(table: &StoreTable) -> Vec<String> {
    let fk_indexes = table.foreign_keys.iter().map(|fk| {
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{}_{} ON {}({})",
            table.name, fk.column, table.name, fk.column
        )
    });

    let declared = table.indexes.iter().map(|index| {
        let (keyword, prefix) = if index.unique {
            ("UNIQUE INDEX", "uq")
        } else {
            ("INDEX", "idx")
        };
        format!(
            "CREATE {} IF NOT EXISTS {}_{}_{} ON {}({})",
            keyword,
            prefix,
            table.name,
            index.columns.join("_"),
            table.name,
            index.columns.join(", ")
        )
    });

    fk_indexes.chain(declared).collect()
}

pub fn generate_drop_table(table: &StoreTable) -> String {
    format!("DROP TABLE IF EXISTS {}", table.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::catalog::{COLUMNS, DATA_LINEAGE_SUMMARY, TABLES};

    #[test]
    fn test_generate_create_table() {
        let sql = generate_create_table(&COLUMNS);
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS columns"));
        assert!(sql.contains("id TEXT PRIMARY KEY NOT NULL"));
        assert!(sql.contains("ordinal INTEGER,"));
        assert!(sql.contains("FOREIGN KEY (table_id) REFERENCES tables(id)"));
    }

    #[test]
    fn test_generate_indexes() {
        let indexes = generate_indexes(&DATA_LINEAGE_SUMMARY);
        assert!(indexes.iter().any(|i| i.contains("idx_data_lineage_summary_script_id")));
        assert!(indexes.iter().any(|i| i.starts_with("CREATE UNIQUE INDEX IF NOT EXISTS uq_data_lineage_summary_source_table_id_target_table_id_script_id")));

        let indexes = generate_indexes(&TABLES);
        assert_eq!(
            indexes,
            vec!["CREATE INDEX IF NOT EXISTS idx_tables_schema_name_table_name ON tables(schema_name, table_name)"]
        );
    }
}
