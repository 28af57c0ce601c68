//! Staged import data and its read-only views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    batch::DEFAULT_CHUNK_SIZE,
    formats::{FileIssue, ImportFormat},
    store::{FileRef, LanguageId, ProjectId, TranslationId, UserId},
};

pub type ImportId = u64;
pub type ImportFileId = u64;
pub type ImportLanguageId = u64;
pub type ImportTranslationId = u64;
pub type ImportFileIssueId = u64;

/// The staging session of one user in one project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Import {
    pub id: ImportId,
    pub project_id: ProjectId,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    pub files: Vec<ImportFile>,
    /// Rows committed by the last (possibly cancelled) apply.
    #[serde(default)]
    pub applied_count: usize,
}

impl Import {
    pub fn new(id: ImportId, project_id: ProjectId, author_id: UserId) -> Self {
        Self {
            id,
            project_id,
            author_id,
            created_at: Utc::now(),
            files: Vec::new(),
            applied_count: 0,
        }
    }

    /// The state of a session that has not been applied or cancelled.
    pub fn state(&self) -> ImportState {
        let translations = self.translations().count();
        if translations == 0 {
            return ImportState::Empty;
        }
        let conflicts = self.translations().filter(|t| t.conflict.is_some()).count();
        let unresolved = self.translations().filter(|t| t.is_unresolved()).count();
        match (conflicts, unresolved) {
            (0, _) => ImportState::Staged,
            (_, 0) => ImportState::Resolved,
            _ => ImportState::NeedsResolution,
        }
    }

    pub fn languages(&self) -> impl Iterator<Item = &ImportLanguage> {
        self.files.iter().flat_map(|f| f.languages.iter())
    }

    pub fn translations(&self) -> impl Iterator<Item = &ImportTranslation> {
        self.languages().flat_map(|l| l.translations.iter())
    }

    pub fn file(&self, file_id: ImportFileId) -> Option<&ImportFile> {
        self.files.iter().find(|f| f.id == file_id)
    }

    pub fn language(&self, language_id: ImportLanguageId) -> Option<&ImportLanguage> {
        self.languages().find(|l| l.id == language_id)
    }

    pub(crate) fn language_mut(&mut self, language_id: ImportLanguageId) -> Option<(&mut ImportLanguage, Option<String>)> {
        self.files.iter_mut().find_map(|file| {
            let namespace = file.namespace.clone();
            file.languages
                .iter_mut()
                .find(|l| l.id == language_id)
                .map(|language| (language, namespace))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImportFile {
    pub id: ImportFileId,
    pub name: String,
    pub format: ImportFormat,
    pub namespace: Option<String>,
    /// Reference to the stored raw upload, when raw files are kept.
    pub raw: Option<FileRef>,
    pub languages: Vec<ImportLanguage>,
    pub issues: Vec<ImportFileIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImportLanguage {
    pub id: ImportLanguageId,
    pub tag: String,
    /// The project language this one is paired with. Unpaired languages are
    /// created when the import is applied.
    pub existing_language: Option<LanguageId>,
    pub translations: Vec<ImportTranslation>,
}

impl ImportLanguage {
    pub fn conflict_count(&self) -> usize {
        self.translations.iter().filter(|t| t.conflict.is_some()).count()
    }

    pub fn unresolved_count(&self) -> usize {
        self.translations.iter().filter(|t| t.is_unresolved()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImportTranslation {
    pub id: ImportTranslationId,
    pub key: String,
    pub description: Option<String>,
    /// Canonical ICU text.
    pub text: String,
    pub is_plural: bool,
    pub conflict: Option<Conflict>,
    pub resolution: Resolution,
}

impl ImportTranslation {
    pub fn is_unresolved(&self) -> bool {
        self.conflict.is_some() && self.resolution == Resolution::Unresolved
    }

    /// Whether apply writes this row.
    pub fn is_written(&self) -> bool {
        !(self.conflict.is_some() && self.resolution == Resolution::KeepExisting)
    }
}

/// The committed translation an imported one would replace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Conflict {
    pub translation_id: TranslationId,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
    #[default]
    Unresolved,
    Override,
    KeepExisting,
}

impl Resolution {
    pub fn from_override(override_existing: bool) -> Self {
        if override_existing {
            Resolution::Override
        } else {
            Resolution::KeepExisting
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImportFileIssue {
    pub id: ImportFileIssueId,
    #[serde(flatten)]
    pub issue: FileIssue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportState {
    Empty,
    Staged,
    NeedsResolution,
    Resolved,
    Applied,
    Cancelled,
}

/// Summary of one imported language, as listed in the import result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImportLanguageView {
    pub id: ImportLanguageId,
    pub tag: String,
    pub file_id: ImportFileId,
    pub file_name: String,
    pub namespace: Option<String>,
    pub existing_language_id: Option<LanguageId>,
    pub existing_language_tag: Option<String>,
    pub total_count: usize,
    pub conflict_count: usize,
    pub resolved_count: usize,
    pub issue_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImportTranslationView {
    pub id: ImportTranslationId,
    pub key: String,
    pub description: Option<String>,
    pub text: String,
    pub is_plural: bool,
    pub conflict_id: Option<TranslationId>,
    pub conflict_text: Option<String>,
    pub resolution: Resolution,
    pub resolved: bool,
}

impl From<&ImportTranslation> for ImportTranslationView {
    fn from(translation: &ImportTranslation) -> Self {
        Self {
            id: translation.id,
            key: translation.key.clone(),
            description: translation.description.clone(),
            text: translation.text.clone(),
            is_plural: translation.is_plural,
            conflict_id: translation.conflict.as_ref().map(|c| c.translation_id),
            conflict_text: translation.conflict.as_ref().map(|c| c.text.clone()),
            resolution: translation.resolution,
            resolved: translation.conflict.is_some() && !translation.is_unresolved(),
        }
    }
}

/// A namespace selectable for an imported file. `id` is `None` for names
/// that only exist in the import.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImportNamespace {
    pub id: Option<u64>,
    pub name: String,
}

/// Filters for [`crate::ImportService::get_translations`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationFilters {
    pub only_conflicts: bool,
    pub only_unresolved: bool,
    /// Case-insensitive match on key or text.
    pub search: Option<String>,
}

impl TranslationFilters {
    pub(crate) fn matches(&self, translation: &ImportTranslation) -> bool {
        if self.only_conflicts && translation.conflict.is_none() {
            return false;
        }
        if self.only_unresolved && !translation.is_unresolved() {
            return false;
        }
        match &self.search {
            Some(search) if !search.is_empty() => {
                let search = search.to_lowercase();
                translation.key.to_lowercase().contains(&search)
                    || translation.text.to_lowercase().contains(&search)
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 0, size: 20 }
    }
}

impl PageRequest {
    pub fn new(page: usize, size: usize) -> Self {
        Self { page, size }
    }

    /// Everything on one page.
    pub fn unpaged() -> Self {
        Self {
            page: 0,
            size: usize::MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total: usize,
}

impl<T> Page<T> {
    pub(crate) fn of(items: impl IntoIterator<Item = T>, request: PageRequest) -> Self {
        let all: Vec<T> = items.into_iter().collect();
        let total = all.len();
        let size = request.size.max(1);
        let items = all
            .into_iter()
            .skip(request.page.saturating_mul(size))
            .take(size)
            .collect();
        Self {
            items,
            page: request.page,
            size: request.size,
            total,
        }
    }
}

/// An uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// A file that could not be staged at all.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileError {
    pub file_name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ImportAddFilesParams {
    pub structure_delimiter: Option<char>,
    /// Keep the raw uploads in [`crate::store::FileStorage`] until the
    /// session ends.
    pub store_raw_files: bool,
    pub convert_placeholders: bool,
}

impl Default for ImportAddFilesParams {
    fn default() -> Self {
        Self {
            structure_delimiter: Some('.'),
            store_raw_files: true,
            convert_placeholders: true,
        }
    }
}

/// What to do with unresolved conflicts when applying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForceMode {
    /// Refuse to apply while conflicts are unresolved.
    #[default]
    NoForce,
    ForceKeepExisting,
    ForceOverride,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplyOptions {
    pub force_mode: ForceMode,
    pub chunk_size: usize,
    /// Tags attached to every imported key.
    pub tags: Vec<String>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            force_mode: ForceMode::NoForce,
            chunk_size: DEFAULT_CHUNK_SIZE,
            tags: Vec::new(),
        }
    }
}

impl ApplyOptions {
    pub fn new(force_mode: ForceMode) -> Self {
        Self {
            force_mode,
            ..Self::default()
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApplyOutcome {
    /// [`ImportState::Applied`] or [`ImportState::Cancelled`].
    pub state: ImportState,
    pub applied: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusKind {
    Preparing,
    Importing,
    Done,
    Cancelled,
    Failed,
}

/// One progress record of a streamed apply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImportStatus {
    pub status: StatusKind,
    pub applied: usize,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportStatus {
    pub fn new(status: StatusKind, applied: usize, total: usize) -> Self {
        Self {
            status,
            applied,
            total,
            error: None,
        }
    }

    /// A failure after `applied` of `total` rows were committed.
    pub fn failed(error: &crate::error::Error, applied: usize, total: usize) -> Self {
        Self {
            status: StatusKind::Failed,
            applied,
            total,
            error: Some(error.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            StatusKind::Done | StatusKind::Cancelled | StatusKind::Failed
        )
    }

    /// One NDJSON line, including the trailing newline.
    pub fn to_ndjson(&self) -> Result<String, crate::error::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
