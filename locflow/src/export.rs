//! Export of committed translations into native files.
//!
//! Translations are grouped per namespace and language, sorted by key and
//! handed to the exporter of the requested [`ExportFormat`]. Each namespace
//! becomes a directory prefix of the produced paths (`ns/en.json`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    archive,
    error::Error,
    formats::{ExportFormat, ExportedFile},
    placeholder::PrintfDialect,
    types::{CanonicalMessage, Entry, Resource},
};

/// One committed translation as read from the project store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExportTranslation {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub language: String,
    /// Canonical ICU text.
    pub text: String,
}

/// What to export and how.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportParams {
    pub format: ExportFormat,
    /// Placeholder dialect for PO files.
    pub message_format: Option<PrintfDialect>,
    /// Language tags to export; `None` exports every language.
    pub languages: Option<Vec<String>>,
    /// Namespaces to export; `None` exports every namespace. The default
    /// namespace is selected with an empty string.
    pub namespaces: Option<Vec<String>>,
    /// Delimiter used to nest structured JSON keys.
    pub structure_delimiter: Option<char>,
}

impl Default for ExportParams {
    fn default() -> Self {
        Self {
            format: ExportFormat::Json,
            message_format: None,
            languages: None,
            namespaces: None,
            structure_delimiter: Some('.'),
        }
    }
}

impl ExportParams {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn with_languages(mut self, languages: Option<Vec<String>>) -> Self {
        self.languages = languages;
        self
    }

    pub fn with_message_format(mut self, dialect: Option<PrintfDialect>) -> Self {
        self.message_format = dialect;
        self
    }

    pub fn with_structure_delimiter(mut self, delimiter: Option<char>) -> Self {
        self.structure_delimiter = delimiter;
        self
    }

    fn includes_language(&self, language: &str) -> bool {
        self.languages
            .as_ref()
            .is_none_or(|languages| languages.iter().any(|l| l.eq_ignore_ascii_case(language)))
    }

    fn includes_namespace(&self, namespace: Option<&str>) -> bool {
        self.namespaces
            .as_ref()
            .is_none_or(|namespaces| namespaces.iter().any(|n| n == namespace.unwrap_or("")))
    }
}

/// The produced files, keyed by relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportedFiles {
    files: BTreeMap<String, Vec<u8>>,
}

impl ExportedFiles {
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(p, b)| (p.as_str(), b.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Packs every file into one zip archive.
    pub fn into_zip(self) -> Result<Vec<u8>, Error> {
        archive::pack(&self.files)
    }

    /// Writes the files below `directory`, creating subdirectories.
    pub fn write_to_dir<P: AsRef<std::path::Path>>(&self, directory: P) -> Result<(), Error> {
        for (path, bytes) in &self.files {
            let target = directory.as_ref().join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, bytes)?;
        }
        Ok(())
    }

    fn insert(&mut self, namespace: Option<&str>, file: ExportedFile) {
        let path = match namespace {
            Some(namespace) if !namespace.is_empty() => format!("{}/{}", namespace, file.path),
            _ => file.path,
        };
        self.files.insert(path, file.bytes);
    }
}

impl IntoIterator for ExportedFiles {
    type Item = (String, Vec<u8>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

/// Exports `translations` in the format selected by `params`.
///
/// `base_provider` is called at most once, and only for formats that pair
/// source and target text (the XLIFF flavours).
pub fn export<F>(
    translations: &[ExportTranslation],
    params: &ExportParams,
    base_language: &str,
    base_provider: F,
) -> Result<ExportedFiles, Error>
where
    F: FnOnce() -> Result<Vec<ExportTranslation>, Error>,
{
    let exporter = params.format.exporter(
        base_language,
        params.message_format,
        params.structure_delimiter,
    );

    let groups = group(
        translations
            .iter()
            .filter(|t| params.includes_language(&t.language))
            .filter(|t| params.includes_namespace(t.namespace.as_deref())),
    );

    let base_groups = if exporter.needs_base_language() && !groups.is_empty() {
        let base = base_provider()?;
        group(
            base.iter()
                .filter(|t| t.language.eq_ignore_ascii_case(base_language)),
        )
    } else {
        BTreeMap::new()
    };

    let mut files = ExportedFiles::default();
    for ((namespace, language), resource) in &groups {
        let base = base_groups
            .iter()
            .find(|((ns, _), _)| ns == namespace)
            .map(|(_, resource)| resource);
        for file in exporter.export_resource(resource, base)? {
            files.insert(namespace.as_deref(), file);
        }
        tracing::debug!(
            format = %params.format,
            namespace = namespace.as_deref().unwrap_or(""),
            language = language.as_str(),
            keys = resource.entries.len(),
            "exported resource"
        );
    }
    Ok(files)
}

fn group<'a>(
    translations: impl Iterator<Item = &'a ExportTranslation>,
) -> BTreeMap<(Option<String>, String), Resource> {
    let mut groups: BTreeMap<(Option<String>, String), Resource> = BTreeMap::new();
    for translation in translations {
        let namespace = translation.namespace.clone().filter(|n| !n.is_empty());
        let resource = groups
            .entry((namespace, translation.language.clone()))
            .or_insert_with(|| Resource::new(translation.language.clone()));
        let message = CanonicalMessage::from_icu(&translation.text)
            .unwrap_or_else(|_| CanonicalMessage::Singular(translation.text.clone()));
        resource.add_entry(
            Entry::new(translation.key.clone(), message)
                .with_description(translation.description.clone()),
        );
    }
    for resource in groups.values_mut() {
        resource.entries.sort_by(|a, b| a.key.cmp(&b.key));
    }
    groups
}
