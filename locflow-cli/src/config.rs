//! `locflow.toml` support.
//!
//! ```toml
//! [import]
//! snapshot = "project.json"
//! project = 1
//! force = "keep-existing"
//! tags = ["release-42"]
//!
//! [export]
//! format = "po"
//! message_format = "php"
//! ```
//!
//! Every value is optional; command-line flags take precedence.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use locflow::{ExportFormat, ForceMode, PrintfDialect};
use serde::Deserialize;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "locflow.toml";

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub import: ImportConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    /// Project snapshot file read before and written after an import.
    pub snapshot: Option<PathBuf>,
    pub project: Option<u64>,
    pub user: Option<u64>,
    /// Language created as the base language of an empty project.
    pub base_language: Option<String>,
    /// Delimiter for nested JSON keys; an empty string keeps keys flat.
    pub structure_delimiter: Option<String>,
    pub convert_placeholders: Option<bool>,
    pub force: Option<ForceArg>,
    pub chunk_size: Option<usize>,
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub format: Option<String>,
    pub message_format: Option<String>,
    pub languages: Option<Vec<String>>,
    pub structure_delimiter: Option<String>,
}

/// How conflicts are treated by `locflow import`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ForceArg {
    /// Fail while conflicts are unresolved.
    No,
    /// Keep committed translations on conflict.
    KeepExisting,
    /// Replace committed translations on conflict.
    Override,
}

impl From<ForceArg> for ForceMode {
    fn from(value: ForceArg) -> Self {
        match value {
            ForceArg::No => ForceMode::NoForce,
            ForceArg::KeepExisting => ForceMode::ForceKeepExisting,
            ForceArg::Override => ForceMode::ForceOverride,
        }
    }
}

impl Config {
    /// Reads the configuration.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`]
    /// in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path)
            .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
        let config = Self::parse(&text).map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }
}

/// Parses a structure delimiter: an empty string means flat keys.
pub fn parse_delimiter(value: &str) -> Result<Option<char>, String> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Ok(None),
        (Some(c), None) => Ok(Some(c)),
        _ => Err(format!("Structure delimiter must be a single character, got '{}'", value)),
    }
}

pub fn parse_export_format(value: &str) -> Result<ExportFormat, String> {
    ExportFormat::from_str(value).map_err(|e| e.to_string())
}

pub fn parse_dialect(value: &str) -> Result<PrintfDialect, String> {
    PrintfDialect::from_str(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
            [import]
            snapshot = "store.json"
            project = 3
            force = "keep-existing"
            structure_delimiter = ""
            tags = ["a", "b"]

            [export]
            format = "android"
            languages = ["de"]
            "#,
        )
        .unwrap();
        assert_eq!(config.import.project, Some(3));
        assert_eq!(config.import.force, Some(ForceArg::KeepExisting));
        assert_eq!(config.import.tags, vec!["a", "b"]);
        assert_eq!(config.export.format.as_deref(), Some("android"));
        assert_eq!(parse_delimiter(config.import.structure_delimiter.as_deref().unwrap()), Ok(None));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(Config::parse("[import]\nprojekt = 1\n").is_err());
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter("/"), Ok(Some('/')));
        assert!(parse_delimiter("::").is_err());
    }

    #[test]
    fn test_force_mapping() {
        assert_eq!(ForceMode::from(ForceArg::Override), ForceMode::ForceOverride);
        assert_eq!(ForceMode::from(ForceArg::No), ForceMode::NoForce);
    }
}
