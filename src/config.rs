//! TOML configuration.
//!
//! Example `lineage.toml`:
//! ```toml
//! [store]
//! db_path = "dw_metadata.db"
//!
//! [lineage]
//! max_path_length = 20
//! temp_prefixes = ["VT_", "TMP_", "TEMP_", "VOLATILE_", "#"]
//!
//! [processing]
//! failure_policy = "fail-fast"   # or "continue"
//! column_check = "lenient"       # or "strict"
//!
//! [output]
//! export_dir = "datalineage"
//! lineage_json = "datalineage.json"
//! export_json = true
//! ```

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::lineage::DEFAULT_MAX_PATH_LENGTH;
use crate::schema::{TempTablePredicate, DEFAULT_TEMP_PREFIXES};

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "lineage.toml";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// What a batch does after a script fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failing script
    #[default]
    FailFast,
    /// Record the failure and go on with the next script
    Continue,
}

/// How DML columns missing from a table definition are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnCheck {
    /// Report and ignore
    #[default]
    Lenient,
    /// Fail the script
    Strict,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub lineage: LineageSettings,
    pub processing: ProcessingSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    pub db_path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("dw_metadata.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LineageSettings {
    /// Longest detail path, in hops, followed when deriving summary lineage
    pub max_path_length: u32,

    /// Unqualified name prefixes that mark a table as temporary when picking targets
    pub temp_prefixes: Vec<String>,
}

impl Default for LineageSettings {
    fn default() -> Self {
        Self {
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
            temp_prefixes: DEFAULT_TEMP_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl LineageSettings {
    pub fn temp_predicate(&self) -> TempTablePredicate {
        TempTablePredicate::new(&self.temp_prefixes)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessingSettings {
    pub failure_policy: FailurePolicy,
    pub column_check: ColumnCheck,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory receiving node-link JSON exports
    pub export_dir: PathBuf,

    /// Cross-script lineage file
    pub lineage_json: PathBuf,

    /// Export per-script and whole-repository JSON after processing
    pub export_json: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("datalineage"),
            lineage_json: PathBuf::from("datalineage.json"),
            export_json: true,
        }
    }
}

impl Settings {
    /// Load settings from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load an explicit config file, or `lineage.toml` when present, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            tracing::debug!(path = %local.display(), "loading config");
            return Self::from_file(local);
        }

        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.lineage.max_path_length == 0 {
            return Err(SettingsError::InvalidConfig(
                "lineage.max_path_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.store.db_path, PathBuf::from("dw_metadata.db"));
        assert_eq!(settings.lineage.max_path_length, 20);
        assert_eq!(settings.processing.failure_policy, FailurePolicy::FailFast);
        assert_eq!(settings.processing.column_check, ColumnCheck::Lenient);
        assert!(settings.output.export_json);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [processing]
            failure_policy = "continue"
            column_check = "strict"

            [lineage]
            temp_prefixes = ["STG_"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.processing.failure_policy, FailurePolicy::Continue);
        assert_eq!(settings.processing.column_check, ColumnCheck::Strict);
        assert_eq!(settings.lineage.max_path_length, 20);
        assert!(settings
            .lineage
            .temp_predicate()
            .is_temp(&crate::schema::TableKey::new("", "stg_orders")));
        assert_eq!(settings.output.lineage_json, PathBuf::from("datalineage.json"));
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let err = Settings::load(Some(Path::new("/nonexistent/lineage.toml"))).unwrap_err();
        assert!(matches!(err, SettingsError::FileNotFound(_)));
    }

    #[test]
    fn test_rejects_zero_path_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lineage.toml");
        std::fs::write(&path, "[lineage]\nmax_path_length = 0\n").unwrap();
        assert!(matches!(
            Settings::from_file(&path),
            Err(SettingsError::InvalidConfig(_))
        ));
    }
}
