use super::record::FactRecord;
use crate::schema::StatementKind;

/// Assign a fact its statement kind. Anything unrecognised is `Unknown`.
pub fn classify(fact: &FactRecord) -> StatementKind {
    match fact.statement_kind.trim().to_ascii_lowercase().as_str() {
        "create" => {
            let object = create_object(fact);
            if object.contains("VIEW") {
                StatementKind::CreateView
            } else if object.contains("TABLE") {
                if fact.has_query {
                    StatementKind::CreateTableAs
                } else {
                    StatementKind::CreateTable
                }
            } else {
                // CREATE INDEX, CREATE SCHEMA, ...
                StatementKind::Unknown
            }
        }
        "insert" => {
            if fact.has_column_list && fact.has_query {
                StatementKind::InsertSelect
            } else {
                StatementKind::InsertValues
            }
        }
        "update" => StatementKind::Update,
        "merge" => StatementKind::Merge,
        _ => StatementKind::Unknown,
    }
}

/// Whether a CREATE statement makes a session-scoped table
pub fn is_temporary_create(fact: &FactRecord) -> bool {
    let object = create_object(fact);
    fact.temporary || object.contains("VOLATILE") || object.contains("TEMP")
}

fn create_object(fact: &FactRecord) -> String {
    fact.create_kind
        .as_deref()
        .unwrap_or("TABLE")
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_record;

    fn fact(json: &str) -> FactRecord {
        parse_record(json).unwrap()
    }

    #[test]
    fn test_create_kinds() {
        assert_eq!(classify(&fact(r#"{"statement_kind":"create"}"#)), StatementKind::CreateTable);
        assert_eq!(
            classify(&fact(r#"{"statement_kind":"Create","has_query":true}"#)),
            StatementKind::CreateTableAs
        );
        assert_eq!(
            classify(&fact(r#"{"statement_kind":"create","create_kind":"VIEW","has_query":true}"#)),
            StatementKind::CreateView
        );
        assert_eq!(
            classify(&fact(r#"{"statement_kind":"create","create_kind":"INDEX"}"#)),
            StatementKind::Unknown
        );
    }

    #[test]
    fn test_insert_needs_column_list_and_query_to_be_insert_select() {
        assert_eq!(
            classify(&fact(r#"{"statement_kind":"insert","has_query":true,"has_column_list":true}"#)),
            StatementKind::InsertSelect
        );
        assert_eq!(
            classify(&fact(r#"{"statement_kind":"insert","has_query":true}"#)),
            StatementKind::InsertValues
        );
        assert_eq!(
            classify(&fact(r#"{"statement_kind":"insert","has_column_list":true}"#)),
            StatementKind::InsertValues
        );
    }

    #[test]
    fn test_other_statements() {
        assert_eq!(classify(&fact(r#"{"statement_kind":"UPDATE"}"#)), StatementKind::Update);
        assert_eq!(classify(&fact(r#"{"statement_kind":"merge"}"#)), StatementKind::Merge);
        assert_eq!(classify(&fact(r#"{"statement_kind":"drop"}"#)), StatementKind::Unknown);
        assert_eq!(classify(&fact(r#"{"statement_kind":""}"#)), StatementKind::Unknown);
    }

    #[test]
    fn test_temporary_create() {
        assert!(is_temporary_create(&fact(
            r#"{"statement_kind":"create","create_kind":"VOLATILE TABLE"}"#
        )));
        assert!(is_temporary_create(&fact(r#"{"statement_kind":"create","temporary":true}"#)));
        assert!(!is_temporary_create(&fact(r#"{"statement_kind":"create"}"#)));
    }
}
