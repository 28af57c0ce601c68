//! Collaborators of the import pipeline: committed project data and raw
//! file storage, with in-memory implementations.
//!
//! [`MemoryProjectStore`] can be saved to and loaded from a JSON snapshot,
//! which is how the CLI keeps a project between runs.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{error::Error, export::ExportTranslation};

pub type ProjectId = u64;
pub type UserId = u64;
pub type LanguageId = u64;
pub type NamespaceId = u64;
pub type KeyId = u64;
pub type TranslationId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Language {
    pub id: LanguageId,
    pub tag: String,
    pub name: String,
    #[serde(default)]
    pub base: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Namespace {
    pub id: NamespaceId,
    pub name: String,
}

/// A committed translation found for a key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExistingTranslation {
    pub id: TranslationId,
    pub text: String,
}

/// One translation upsert, together with the key it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TranslationWrite {
    pub key: String,
    pub namespace: Option<NamespaceId>,
    pub description: Option<String>,
    pub language: LanguageId,
    pub text: String,
    pub is_plural: bool,
}

/// Whether two tags name the same language (`pt_br` and `pt-BR` do).
pub fn same_language_tag(a: &str, b: &str) -> bool {
    a.replace('_', "-").eq_ignore_ascii_case(&b.replace('_', "-"))
}

/// Committed project data.
pub trait ProjectStore: Send + Sync {
    fn languages(&self, project: ProjectId) -> Result<Vec<Language>, Error>;

    fn create_language(&self, project: ProjectId, tag: &str) -> Result<Language, Error>;

    fn namespaces(&self, project: ProjectId) -> Result<Vec<Namespace>, Error>;

    fn find_or_create_namespace(&self, project: ProjectId, name: &str) -> Result<Namespace, Error>;

    /// Looks up the translation of `key` in `namespace` (`None` is the
    /// default namespace) for `language`.
    fn find_translation(
        &self,
        project: ProjectId,
        key: &str,
        namespace: Option<&str>,
        language: LanguageId,
    ) -> Result<Option<ExistingTranslation>, Error>;

    /// Upserts keys and translations. Either every write is applied or none.
    ///
    /// Returns the id of the key of each write, in order.
    fn write_batch(&self, project: ProjectId, writes: &[TranslationWrite]) -> Result<Vec<KeyId>, Error>;

    fn tag_keys(&self, project: ProjectId, keys: &[KeyId], tags: &[String]) -> Result<(), Error>;

    /// Every committed translation, for export.
    fn translations(&self, project: ProjectId) -> Result<Vec<ExportTranslation>, Error>;
}

/// Opaque reference to a stored raw upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct FileRef(pub String);

/// Storage for raw uploaded payloads.
pub trait FileStorage: Send + Sync {
    fn store(&self, path: &str, bytes: &[u8]) -> Result<FileRef, Error>;
    fn retrieve(&self, file: &FileRef) -> Result<Vec<u8>, Error>;
    fn delete(&self, file: &FileRef) -> Result<(), Error>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoredKey {
    pub id: KeyId,
    pub name: String,
    pub namespace: Option<NamespaceId>,
    pub description: Option<String>,
    pub is_plural: bool,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoredTranslation {
    pub id: TranslationId,
    pub key: KeyId,
    pub language: LanguageId,
    pub text: String,
}

/// All committed data of one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProjectData {
    pub languages: Vec<Language>,
    pub namespaces: Vec<Namespace>,
    pub keys: Vec<StoredKey>,
    pub translations: Vec<StoredTranslation>,
}

impl ProjectData {
    fn namespace_id(&self, name: Option<&str>) -> Option<Option<NamespaceId>> {
        match name {
            None => Some(None),
            Some(name) => self
                .namespaces
                .iter()
                .find(|n| n.name == name)
                .map(|n| Some(n.id)),
        }
    }

    fn namespace_name(&self, id: Option<NamespaceId>) -> Option<String> {
        id.and_then(|id| self.namespaces.iter().find(|n| n.id == id))
            .map(|n| n.name.clone())
    }
}

/// The serialisable state of a [`MemoryProjectStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProjectSnapshot {
    pub next_id: u64,
    pub projects: BTreeMap<ProjectId, ProjectData>,
}

/// A [`ProjectStore`] kept in memory behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    state: Mutex<ProjectSnapshot>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: ProjectSnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> ProjectSnapshot {
        self.state.lock().clone()
    }

    /// Loads a snapshot file; a missing file gives an empty store.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let file = std::fs::File::open(path)?;
        let snapshot: ProjectSnapshot = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &self.snapshot())?;
        Ok(())
    }

    /// Adds a language directly, marking it as the base language if asked.
    pub fn add_language(&self, project: ProjectId, tag: &str, base: bool) -> Language {
        let mut state = self.state.lock();
        let id = next_id(&mut state);
        let language = Language {
            id,
            tag: tag.to_string(),
            name: tag.to_string(),
            base,
        };
        state
            .projects
            .entry(project)
            .or_default()
            .languages
            .push(language.clone());
        language
    }

    /// The base language of a project, falling back to the first one.
    pub fn base_language(&self, project: ProjectId) -> Option<Language> {
        let state = self.state.lock();
        let data = state.projects.get(&project)?;
        data.languages
            .iter()
            .find(|l| l.base)
            .or_else(|| data.languages.first())
            .cloned()
    }

    /// Commits one translation outside of any import.
    pub fn set_translation(
        &self,
        project: ProjectId,
        key: &str,
        namespace: Option<&str>,
        language: LanguageId,
        text: &str,
    ) -> Result<TranslationId, Error> {
        let namespace = match namespace {
            Some(name) => Some(self.find_or_create_namespace(project, name)?.id),
            None => None,
        };
        let key_id = self.write_batch(
            project,
            &[TranslationWrite {
                key: key.to_string(),
                namespace,
                description: None,
                language,
                text: text.to_string(),
                is_plural: false,
            }],
        )?;
        let state = self.state.lock();
        state
            .projects
            .get(&project)
            .and_then(|data| {
                data.translations
                    .iter()
                    .find(|t| Some(&t.key) == key_id.first() && t.language == language)
            })
            .map(|t| t.id)
            .ok_or_else(|| Error::Storage("translation vanished after write".to_string()))
    }

    pub fn translation_count(&self, project: ProjectId) -> usize {
        self.state
            .lock()
            .projects
            .get(&project)
            .map_or(0, |data| data.translations.len())
    }

    pub fn key(&self, project: ProjectId, name: &str, namespace: Option<&str>) -> Option<StoredKey> {
        let state = self.state.lock();
        let data = state.projects.get(&project)?;
        let namespace = data.namespace_id(namespace)?;
        data.keys
            .iter()
            .find(|k| k.name == name && k.namespace == namespace)
            .cloned()
    }
}

fn next_id(state: &mut ProjectSnapshot) -> u64 {
    state.next_id += 1;
    state.next_id
}

impl ProjectStore for MemoryProjectStore {
    fn languages(&self, project: ProjectId) -> Result<Vec<Language>, Error> {
        Ok(self
            .state
            .lock()
            .projects
            .get(&project)
            .map(|data| data.languages.clone())
            .unwrap_or_default())
    }

    fn create_language(&self, project: ProjectId, tag: &str) -> Result<Language, Error> {
        if tag.trim().is_empty() {
            return Err(Error::validation_error("language tag must not be empty"));
        }
        let mut state = self.state.lock();
        if let Some(existing) = state
            .projects
            .get(&project)
            .and_then(|data| data.languages.iter().find(|l| same_language_tag(&l.tag, tag)))
        {
            return Err(Error::validation_error(format!(
                "language `{}` already exists in project {}",
                existing.tag, project
            )));
        }
        let id = next_id(&mut state);
        let language = Language {
            id,
            tag: tag.to_string(),
            name: tag.to_string(),
            base: false,
        };
        state
            .projects
            .entry(project)
            .or_default()
            .languages
            .push(language.clone());
        Ok(language)
    }

    fn namespaces(&self, project: ProjectId) -> Result<Vec<Namespace>, Error> {
        Ok(self
            .state
            .lock()
            .projects
            .get(&project)
            .map(|data| data.namespaces.clone())
            .unwrap_or_default())
    }

    fn find_or_create_namespace(&self, project: ProjectId, name: &str) -> Result<Namespace, Error> {
        let mut state = self.state.lock();
        if let Some(existing) = state
            .projects
            .get(&project)
            .and_then(|data| data.namespaces.iter().find(|n| n.name == name))
        {
            return Ok(existing.clone());
        }
        let id = next_id(&mut state);
        let namespace = Namespace {
            id,
            name: name.to_string(),
        };
        state
            .projects
            .entry(project)
            .or_default()
            .namespaces
            .push(namespace.clone());
        Ok(namespace)
    }

    fn find_translation(
        &self,
        project: ProjectId,
        key: &str,
        namespace: Option<&str>,
        language: LanguageId,
    ) -> Result<Option<ExistingTranslation>, Error> {
        let state = self.state.lock();
        let Some(data) = state.projects.get(&project) else {
            return Ok(None);
        };
        let Some(namespace) = data.namespace_id(namespace) else {
            return Ok(None);
        };
        let Some(key) = data
            .keys
            .iter()
            .find(|k| k.name == key && k.namespace == namespace)
        else {
            return Ok(None);
        };
        Ok(data
            .translations
            .iter()
            .find(|t| t.key == key.id && t.language == language)
            .map(|t| ExistingTranslation {
                id: t.id,
                text: t.text.clone(),
            }))
    }

    fn write_batch(&self, project: ProjectId, writes: &[TranslationWrite]) -> Result<Vec<KeyId>, Error> {
        let mut state = self.state.lock();
        let mut data = state.projects.get(&project).cloned().unwrap_or_default();
        let mut next = state.next_id;

        for write in writes {
            if !data.languages.iter().any(|l| l.id == write.language) {
                return Err(Error::Storage(format!(
                    "language {} does not belong to project {}",
                    write.language, project
                )));
            }
            if let Some(namespace) = write.namespace
                && !data.namespaces.iter().any(|n| n.id == namespace)
            {
                return Err(Error::Storage(format!(
                    "namespace {} does not belong to project {}",
                    namespace, project
                )));
            }
        }

        let mut key_ids = Vec::with_capacity(writes.len());
        for write in writes {
            let key_id = match data
                .keys
                .iter_mut()
                .find(|k| k.name == write.key && k.namespace == write.namespace)
            {
                Some(key) => {
                    if write.description.is_some() {
                        key.description = write.description.clone();
                    }
                    key.is_plural |= write.is_plural;
                    key.id
                }
                None => {
                    next += 1;
                    data.keys.push(StoredKey {
                        id: next,
                        name: write.key.clone(),
                        namespace: write.namespace,
                        description: write.description.clone(),
                        is_plural: write.is_plural,
                        tags: BTreeSet::new(),
                    });
                    next
                }
            };
            match data
                .translations
                .iter_mut()
                .find(|t| t.key == key_id && t.language == write.language)
            {
                Some(translation) => translation.text = write.text.clone(),
                None => {
                    next += 1;
                    data.translations.push(StoredTranslation {
                        id: next,
                        key: key_id,
                        language: write.language,
                        text: write.text.clone(),
                    });
                }
            }
            key_ids.push(key_id);
        }

        state.next_id = next;
        state.projects.insert(project, data);
        Ok(key_ids)
    }

    fn tag_keys(&self, project: ProjectId, keys: &[KeyId], tags: &[String]) -> Result<(), Error> {
        let mut state = self.state.lock();
        let Some(data) = state.projects.get_mut(&project) else {
            return Err(Error::not_found("project"));
        };
        for key in data.keys.iter_mut().filter(|k| keys.contains(&k.id)) {
            key.tags.extend(tags.iter().cloned());
        }
        Ok(())
    }

    fn translations(&self, project: ProjectId) -> Result<Vec<ExportTranslation>, Error> {
        let state = self.state.lock();
        let Some(data) = state.projects.get(&project) else {
            return Ok(Vec::new());
        };
        Ok(data
            .translations
            .iter()
            .filter_map(|t| {
                let key = data.keys.iter().find(|k| k.id == t.key)?;
                let language = data.languages.iter().find(|l| l.id == t.language)?;
                Some(ExportTranslation {
                    key: key.name.clone(),
                    namespace: data.namespace_name(key.namespace),
                    description: key.description.clone(),
                    language: language.tag.clone(),
                    text: t.text.clone(),
                })
            })
            .collect())
    }
}

/// A [`FileStorage`] kept in memory.
#[derive(Debug, Default)]
pub struct MemoryFileStorage {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}

impl FileStorage for MemoryFileStorage {
    fn store(&self, path: &str, bytes: &[u8]) -> Result<FileRef, Error> {
        self.files.lock().insert(path.to_string(), bytes.to_vec());
        Ok(FileRef(path.to_string()))
    }

    fn retrieve(&self, file: &FileRef) -> Result<Vec<u8>, Error> {
        self.files
            .lock()
            .get(&file.0)
            .cloned()
            .ok_or_else(|| Error::not_found("stored file"))
    }

    fn delete(&self, file: &FileRef) -> Result<(), Error> {
        self.files.lock().remove(&file.0);
        Ok(())
    }
}
