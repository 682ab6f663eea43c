use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::parser::{script_id_for, FACT_EXTENSION};

/// Every fact file under `input_dir`, sorted by path
pub fn discover_fact_files(input_dir: &Path) -> Result<Vec<PathBuf>> {
    if !input_dir.is_dir() {
        bail!("Input directory does not exist: {:?}", input_dir);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(input_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to scan {:?}", input_dir))?;
        let is_fact = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(FACT_EXTENSION));
        if is_fact {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Resolves which fact files to process based on include/exclude filters (script ids)
pub fn resolve_scripts(
    input_dir: &Path,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
) -> Result<Vec<PathBuf>> {
    let files = discover_fact_files(input_dir)?;

    let mut by_id: Vec<(String, PathBuf)> = Vec::with_capacity(files.len());
    let mut known: BTreeMap<String, PathBuf> = BTreeMap::new();
    for path in files {
        let id = script_id_for(&path)?;
        if let Some(previous) = known.insert(id.clone(), path.clone()) {
            bail!("Duplicate script id {}: {:?} and {:?}", id, previous, path);
        }
        by_id.push((id, path));
    }

    let check_known = |names: &[String]| -> Result<()> {
        for name in names {
            if !known.contains_key(name) {
                bail!("Unknown script: {}", name);
            }
        }
        Ok(())
    };

    let selected: Vec<PathBuf> = match (include, exclude) {
        (Some(_), Some(_)) => {
            bail!("Cannot use both --include and --exclude at the same time");
        }
        (Some(include_list), None) => {
            check_known(&include_list)?;
            tracing::info!(scripts = ?include_list, "including scripts");
            by_id
                .into_iter()
                .filter(|(id, _)| include_list.contains(id))
                .map(|(_, path)| path)
                .collect()
        }
        (None, Some(exclude_list)) => {
            check_known(&exclude_list)?;
            tracing::info!(scripts = ?exclude_list, "excluding scripts");
            by_id
                .into_iter()
                .filter(|(id, _)| !exclude_list.contains(id))
                .map(|(_, path)| path)
                .collect()
        }
        (None, None) => by_id.into_iter().map(|(_, path)| path).collect(),
    };

    tracing::info!(count = selected.len(), "fact files selected");
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        for name in ["b.jsonl", "a.jsonl", "nested/c.jsonl", "notes.txt", "a.sql"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        dir
    }

    fn ids(paths: &[PathBuf]) -> Vec<String> {
        paths.iter().map(|p| script_id_for(p).unwrap()).collect()
    }

    #[test]
    fn test_discovers_fact_files_recursively() {
        let dir = fixture();
        let files = resolve_scripts(dir.path(), None, None).unwrap();
        assert_eq!(ids(&files), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_include_and_exclude() {
        let dir = fixture();
        let included = resolve_scripts(dir.path(), Some(vec!["c".into()]), None).unwrap();
        assert_eq!(ids(&included), vec!["c"]);

        let excluded = resolve_scripts(dir.path(), None, Some(vec!["a".into()])).unwrap();
        assert_eq!(ids(&excluded), vec!["b", "c"]);
    }

    #[test]
    fn test_rejects_duplicate_script_ids() {
        let dir = fixture();
        std::fs::write(dir.path().join("c.jsonl"), "").unwrap();

        let err = resolve_scripts(dir.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("Duplicate script id c"));
    }

    #[test]
    fn test_rejects_unknown_and_combined_filters() {
        let dir = fixture();
        assert!(resolve_scripts(dir.path(), Some(vec!["zzz".into()]), None).is_err());
        assert!(resolve_scripts(dir.path(), Some(vec!["a".into()]), Some(vec!["b".into()])).is_err());
        assert!(resolve_scripts(&dir.path().join("missing"), None, None).is_err());
    }
}
