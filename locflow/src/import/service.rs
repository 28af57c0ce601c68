//! The import session service.
//!
//! [`ImportService`] owns the staging sessions (one per project and user)
//! and drives them from upload to apply. State lives behind short
//! `parking_lot` locks; store calls and awaits always happen outside them.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    archive,
    error::Error,
    export::{self, ExportParams, ExportedFiles},
    formats::{self, ParsedFile},
    import::{
        apply, conflicts,
        model::{
            ApplyOptions, ApplyOutcome, FileError, ForceMode, Import, ImportAddFilesParams,
            ImportFile, ImportFileId, ImportFileIssue, ImportId, ImportLanguage,
            ImportLanguageId, ImportLanguageView, ImportNamespace, ImportState, ImportStatus,
            ImportTranslation, ImportTranslationId, ImportTranslationView, IncomingFile, Page,
            PageRequest, Resolution, StatusKind, TranslationFilters,
        },
        stream::StatusStream,
    },
    options::ParseOptions,
    store::{FileRef, FileStorage, Language, LanguageId, ProjectId, ProjectStore, UserId, same_language_tag},
    types::Resource,
};

/// Stages uploaded files, resolves conflicts and applies imports.
///
/// Cloning is cheap; clones share the same sessions.
#[derive(Clone)]
pub struct ImportService {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn ProjectStore>,
    files: Arc<dyn FileStorage>,
    imports: Mutex<BTreeMap<ImportId, Import>>,
    views: Mutex<HashMap<ImportId, Arc<Vec<ImportLanguageView>>>>,
    running: Mutex<HashSet<ImportId>>,
    statuses: Mutex<HashMap<(ProjectId, UserId), ImportStatus>>,
    next_id: AtomicU64,
}

/// Marks an import as being applied until dropped.
struct RunningGuard {
    inner: Arc<Inner>,
    import_id: ImportId,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.inner.running.lock().remove(&self.import_id);
    }
}

impl ImportService {
    pub fn new(store: Arc<dyn ProjectStore>, files: Arc<dyn FileStorage>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                files,
                imports: Mutex::new(BTreeMap::new()),
                views: Mutex::new(HashMap::new()),
                running: Mutex::new(HashSet::new()),
                statuses: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Parses and stages uploaded files into the session of `user`,
    /// creating the session on first upload.
    ///
    /// Zip archives are expanded first. Files that cannot be staged at all
    /// are returned as [`FileError`]s; the rest are staged. A file with the
    /// same name as an already staged one replaces it. A session that is
    /// being applied takes no new files.
    pub fn add_files(
        &self,
        files: Vec<IncomingFile>,
        project: ProjectId,
        user: UserId,
        params: &ImportAddFilesParams,
    ) -> Result<Vec<FileError>, Error> {
        {
            let imports = self.inner.imports.lock();
            if let Some(import_id) = find_session(&imports, project, user) {
                self.ensure_idle(import_id)?;
            }
        }
        let options = ParseOptions::new()
            .with_structure_delimiter(params.structure_delimiter)
            .with_convert_placeholders(params.convert_placeholders);
        let mut errors = Vec::new();

        let mut expanded = Vec::with_capacity(files.len());
        for file in files {
            if !archive::is_archive(&file.name) {
                expanded.push(file);
                continue;
            }
            for entry in archive::unpack(&file.bytes)? {
                match entry.content {
                    Ok(bytes) => expanded.push(IncomingFile::new(entry.name, bytes)),
                    Err(message) => {
                        tracing::warn!(archive = file.name.as_str(), entry = entry.name.as_str(), %message, "unreadable archive entry");
                        errors.push(FileError {
                            file_name: entry.name,
                            message,
                        });
                    }
                }
            }
        }

        let languages = self.inner.store.languages(project)?;
        let mut staged = Vec::with_capacity(expanded.len());
        for file in expanded {
            let parsed = match formats::parse(&file.name, &file.bytes, &options) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(file = file.name.as_str(), error = %e, "file could not be staged");
                    errors.push(FileError {
                        file_name: file.name,
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            match self.stage_file(project, user, &file, parsed, &languages, params) {
                Ok(staged_file) => staged.push(staged_file),
                Err(e) => {
                    self.delete_raw(staged.into_iter().filter_map(|f| f.raw));
                    return Err(e);
                }
            }
        }

        let staged_count = staged.len();
        let merged = {
            let mut imports = self.inner.imports.lock();
            let import_id = match find_session(&imports, project, user) {
                Some(id) if self.ensure_idle(id).is_err() => None,
                Some(id) => Some(id),
                None => {
                    let id = self.next_id();
                    imports.insert(id, Import::new(id, project, user));
                    tracing::info!(project, user, import = id, "created import session");
                    Some(id)
                }
            };
            match import_id.and_then(|id| imports.get_mut(&id)) {
                Some(import) => {
                    let mut replaced = Vec::new();
                    for file in staged {
                        if let Some(position) = import.files.iter().position(|f| f.name == file.name) {
                            let old = import.files.remove(position);
                            replaced.extend(old.raw);
                        }
                        import.files.push(file);
                    }
                    self.invalidate(import.id);
                    Ok(replaced)
                }
                None => Err(staged),
            }
        };
        let replaced = match merged {
            Ok(replaced) => replaced,
            Err(rejected) => {
                tracing::warn!(project, user, "apply started while files were staged");
                self.delete_raw(rejected.into_iter().filter_map(|f| f.raw));
                return Err(Error::ImportAlreadyRunning);
            }
        };
        self.delete_raw(replaced);

        tracing::info!(
            project,
            user,
            staged = staged_count,
            failed = errors.len(),
            "files added to import"
        );
        Ok(errors)
    }

    fn stage_file(
        &self,
        project: ProjectId,
        user: UserId,
        file: &IncomingFile,
        parsed: ParsedFile,
        languages: &[Language],
        params: &ImportAddFilesParams,
    ) -> Result<ImportFile, Error> {
        let file_id = self.next_id();
        let raw = if params.store_raw_files {
            let path = format!("import/{}/{}/{}/{}", project, user, file_id, file.name);
            Some(self.inner.files.store(&path, &file.bytes)?)
        } else {
            None
        };

        let staged_languages = match self.stage_languages(project, parsed.resources, languages) {
            Ok(staged_languages) => staged_languages,
            Err(e) => {
                self.delete_raw(raw);
                return Err(e);
            }
        };

        Ok(ImportFile {
            id: file_id,
            name: file.name.clone(),
            format: parsed.format,
            namespace: None,
            raw,
            languages: staged_languages,
            issues: parsed
                .issues
                .into_iter()
                .map(|issue| ImportFileIssue {
                    id: self.next_id(),
                    issue,
                })
                .collect(),
        })
    }

    fn stage_languages(
        &self,
        project: ProjectId,
        resources: Vec<Resource>,
        languages: &[Language],
    ) -> Result<Vec<ImportLanguage>, Error> {
        let mut staged_languages = Vec::with_capacity(resources.len());
        for resource in resources {
            let mut language = ImportLanguage {
                id: self.next_id(),
                existing_language: conflicts::infer_pairing(&resource.language, languages),
                tag: resource.language,
                translations: resource
                    .entries
                    .into_iter()
                    .map(|entry| ImportTranslation {
                        id: self.next_id(),
                        is_plural: entry.message.is_plural(),
                        text: entry.message.to_icu(),
                        key: entry.key,
                        description: entry.description,
                        conflict: None,
                        resolution: Resolution::Unresolved,
                    })
                    .collect(),
            };
            conflicts::compute_language_conflicts(self.inner.store.as_ref(), project, None, &mut language, false)?;
            staged_languages.push(language);
        }
        Ok(staged_languages)
    }

    /// A copy of the session of `user`.
    pub fn get_import(&self, project: ProjectId, user: UserId) -> Result<Import, Error> {
        let imports = self.inner.imports.lock();
        find_session(&imports, project, user)
            .and_then(|id| imports.get(&id).cloned())
            .ok_or_else(|| Error::not_found("import"))
    }

    pub fn import_state(&self, project: ProjectId, user: UserId) -> Result<ImportState, Error> {
        Ok(self.get_import(project, user)?.state())
    }

    /// The staged languages of the session of `user`.
    pub fn get_result(
        &self,
        project: ProjectId,
        user: UserId,
        page: PageRequest,
    ) -> Result<Page<ImportLanguageView>, Error> {
        let import_id = {
            let imports = self.inner.imports.lock();
            find_session(&imports, project, user).ok_or_else(|| Error::not_found("import"))?
        };
        let views = self.language_views(import_id)?;
        Ok(Page::of(views.iter().cloned(), page))
    }

    pub fn find_language_view(
        &self,
        project: ProjectId,
        language_id: ImportLanguageId,
    ) -> Result<ImportLanguageView, Error> {
        let import_id = self.locate(project, "import language", |i| i.language(language_id).is_some())?;
        self.language_views(import_id)?
            .iter()
            .find(|view| view.id == language_id)
            .cloned()
            .ok_or_else(|| Error::not_found("import language"))
    }

    pub fn get_translations(
        &self,
        project: ProjectId,
        language_id: ImportLanguageId,
        filters: &TranslationFilters,
        page: PageRequest,
    ) -> Result<Page<ImportTranslationView>, Error> {
        let import_id = self.locate(project, "import language", |i| i.language(language_id).is_some())?;
        let imports = self.inner.imports.lock();
        let language = imports
            .get(&import_id)
            .and_then(|import| import.language(language_id))
            .ok_or_else(|| Error::not_found("import language"))?;
        Ok(Page::of(
            language
                .translations
                .iter()
                .filter(|t| filters.matches(t))
                .map(ImportTranslationView::from),
            page,
        ))
    }

    pub fn get_file_issues(
        &self,
        project: ProjectId,
        file_id: ImportFileId,
        page: PageRequest,
    ) -> Result<Page<ImportFileIssue>, Error> {
        let import_id = self.locate(project, "import file", |i| i.file(file_id).is_some())?;
        let imports = self.inner.imports.lock();
        let file = imports
            .get(&import_id)
            .and_then(|import| import.file(file_id))
            .ok_or_else(|| Error::not_found("import file"))?;
        Ok(Page::of(file.issues.iter().cloned(), page))
    }

    /// Moves a staged file into a namespace (`None` is the default one) and
    /// recomputes the conflicts of its languages.
    pub fn select_namespace(
        &self,
        project: ProjectId,
        file_id: ImportFileId,
        namespace: Option<&str>,
    ) -> Result<(), Error> {
        let namespace = namespace.map(str::trim).filter(|n| !n.is_empty());
        let import_id = self.locate(project, "import file", |i| i.file(file_id).is_some())?;
        loop {
            let original = {
                let imports = self.inner.imports.lock();
                self.ensure_idle(import_id)?;
                imports
                    .get(&import_id)
                    .and_then(|import| import.file(file_id).cloned())
                    .ok_or_else(|| Error::not_found("import file"))?
            };

            let mut file = original.clone();
            file.namespace = namespace.map(str::to_string);
            for language in &mut file.languages {
                conflicts::compute_language_conflicts(self.inner.store.as_ref(), project, namespace, language, false)?;
            }

            let mut imports = self.inner.imports.lock();
            self.ensure_idle(import_id)?;
            let slot = imports
                .get_mut(&import_id)
                .and_then(|import| import.files.iter_mut().find(|f| f.id == file_id))
                .ok_or_else(|| Error::not_found("import file"))?;
            if *slot != original {
                tracing::debug!(project, file = file_id, "file changed while selecting namespace, retrying");
                continue;
            }
            *slot = file;
            self.invalidate(import_id);
            tracing::debug!(project, file = file_id, namespace = namespace.unwrap_or(""), "selected namespace");
            return Ok(());
        }
    }

    /// Pairs a staged language with a project language, or clears the
    /// pairing so the language is created on apply. Conflicts of the
    /// language are recomputed and its resolutions reset.
    ///
    /// Clearing is refused while the project already has a language with
    /// the staged tag, since apply could not create it.
    pub fn select_existing_language(
        &self,
        project: ProjectId,
        language_id: ImportLanguageId,
        existing: Option<LanguageId>,
    ) -> Result<(), Error> {
        let project_languages = self.inner.store.languages(project)?;
        if let Some(existing) = existing
            && !project_languages.iter().any(|l| l.id == existing)
        {
            return Err(Error::validation_error(format!(
                "language {} does not belong to project {}",
                existing, project
            )));
        }
        let import_id = self.locate(project, "import language", |i| i.language(language_id).is_some())?;
        loop {
            let (original, namespace) = {
                let imports = self.inner.imports.lock();
                self.ensure_idle(import_id)?;
                let file = imports
                    .get(&import_id)
                    .and_then(|import| {
                        import
                            .files
                            .iter()
                            .find(|f| f.languages.iter().any(|l| l.id == language_id))
                    })
                    .ok_or_else(|| Error::not_found("import language"))?;
                if let Some(existing) = existing
                    && file
                        .languages
                        .iter()
                        .any(|l| l.id != language_id && l.existing_language == Some(existing))
                {
                    return Err(Error::validation_error(
                        "another language of the same file is already paired with this language",
                    ));
                }
                let language = file
                    .languages
                    .iter()
                    .find(|l| l.id == language_id)
                    .cloned()
                    .ok_or_else(|| Error::not_found("import language"))?;
                (language, file.namespace.clone())
            };
            if existing.is_none()
                && let Some(taken) = project_languages.iter().find(|l| same_language_tag(&l.tag, &original.tag))
            {
                return Err(Error::validation_error(format!(
                    "project {} already has language `{}`; pair with it instead",
                    project, taken.tag
                )));
            }

            let mut language = original.clone();
            language.existing_language = existing;
            conflicts::compute_language_conflicts(
                self.inner.store.as_ref(),
                project,
                namespace.as_deref(),
                &mut language,
                false,
            )?;

            let mut imports = self.inner.imports.lock();
            self.ensure_idle(import_id)?;
            let (slot, current_namespace) = imports
                .get_mut(&import_id)
                .and_then(|import| import.language_mut(language_id))
                .ok_or_else(|| Error::not_found("import language"))?;
            if *slot != original || current_namespace != namespace {
                tracing::debug!(project, language = language_id, "language changed while pairing, retrying");
                continue;
            }
            *slot = language;
            self.invalidate(import_id);
            return Ok(());
        }
    }

    pub fn resolve_translation_conflict(
        &self,
        project: ProjectId,
        translation_id: ImportTranslationId,
        language_id: ImportLanguageId,
        override_existing: bool,
    ) -> Result<(), Error> {
        let import_id = self.locate(project, "import language", |i| i.language(language_id).is_some())?;
        let mut imports = self.inner.imports.lock();
        self.ensure_idle(import_id)?;
        let (language, _) = imports
            .get_mut(&import_id)
            .and_then(|import| import.language_mut(language_id))
            .ok_or_else(|| Error::not_found("import language"))?;
        let translation = language
            .translations
            .iter_mut()
            .find(|t| t.id == translation_id)
            .ok_or_else(|| Error::not_found("import translation"))?;
        conflicts::resolve(translation, override_existing)?;
        self.invalidate(import_id);
        Ok(())
    }

    /// Resolves every unresolved conflict of a language the same way.
    pub fn resolve_all_of_language(
        &self,
        project: ProjectId,
        language_id: ImportLanguageId,
        override_existing: bool,
    ) -> Result<(), Error> {
        let import_id = self.locate(project, "import language", |i| i.language(language_id).is_some())?;
        let mut imports = self.inner.imports.lock();
        self.ensure_idle(import_id)?;
        let (language, _) = imports
            .get_mut(&import_id)
            .and_then(|import| import.language_mut(language_id))
            .ok_or_else(|| Error::not_found("import language"))?;
        let changed = conflicts::resolve_all(language, override_existing);
        self.invalidate(import_id);
        tracing::debug!(project, language = language_id, changed, override_existing, "resolved all conflicts");
        Ok(())
    }

    /// Applies the session of `user` with default options.
    pub async fn import(
        &self,
        project: ProjectId,
        user: UserId,
        force_mode: ForceMode,
    ) -> Result<ApplyOutcome, Error> {
        self.import_with(
            project,
            user,
            ApplyOptions::new(force_mode),
            CancellationToken::new(),
            |_| {},
        )
        .await
    }

    /// Applies the session of `user`.
    ///
    /// Conflicts are recomputed first, keeping resolutions that still refer
    /// to the same committed translation. `progress` receives the number of
    /// committed rows after each sub-chunk. Cancelling `cancel` stops at the
    /// next sub-chunk boundary and keeps the session.
    pub async fn import_with<G>(
        &self,
        project: ProjectId,
        user: UserId,
        options: ApplyOptions,
        cancel: CancellationToken,
        progress: G,
    ) -> Result<ApplyOutcome, Error>
    where
        G: FnMut(usize) + Send,
    {
        self.run_apply(project, user, options, cancel, progress, None).await
    }

    /// Applies the session of `user` on a spawned task and streams its
    /// progress. Must be called from within a tokio runtime.
    pub fn import_streaming(
        &self,
        project: ProjectId,
        user: UserId,
        options: ApplyOptions,
        cancel: CancellationToken,
    ) -> StatusStream {
        let (sender, receiver) = watch::channel(ImportStatus::new(StatusKind::Preparing, 0, 0));
        let service = self.clone();
        tokio::spawn(async move {
            let _ = service
                .run_apply(project, user, options, cancel, |_| {}, Some(sender))
                .await;
        });
        StatusStream::new(receiver)
    }

    /// The last status of an apply of the session of `user`.
    pub fn apply_status(&self, project: ProjectId, user: UserId) -> Option<ImportStatus> {
        self.inner.statuses.lock().get(&(project, user)).cloned()
    }

    async fn run_apply<G>(
        &self,
        project: ProjectId,
        user: UserId,
        options: ApplyOptions,
        cancel: CancellationToken,
        mut progress: G,
        observer: Option<watch::Sender<ImportStatus>>,
    ) -> Result<ApplyOutcome, Error>
    where
        G: FnMut(usize) + Send,
    {
        let publish = |status: ImportStatus| {
            self.inner.statuses.lock().insert((project, user), status.clone());
            if let Some(sender) = &observer {
                sender.send_replace(status);
            }
        };

        let (guard, mut snapshot) = match self.begin_apply(project, user) {
            Ok(started) => started,
            Err(e) => {
                if let Some(sender) = &observer {
                    sender.send_replace(ImportStatus::failed(&e, 0, 0));
                }
                return Err(e);
            }
        };
        let import_id = guard.import_id;

        let prepared = self.prepare_apply(&mut snapshot, options.force_mode);
        let plan = match prepared {
            Ok(plan) => plan,
            Err(e) => {
                publish(ImportStatus::failed(&e, 0, 0));
                return Err(e);
            }
        };
        let total = plan.total();
        tracing::info!(project, user, import = import_id, total, "applying import");
        publish(ImportStatus::new(StatusKind::Importing, 0, total));

        let mut committed = 0;
        let result = apply::commit(self.inner.store.as_ref(), &plan, &options, &cancel, |applied| {
            committed = applied;
            if let Some(import) = self.inner.imports.lock().get_mut(&import_id) {
                import.applied_count = applied;
            }
            publish(ImportStatus::new(StatusKind::Importing, applied, total));
            progress(applied);
        })
        .await;

        match result {
            Ok(outcome) if outcome.state == ImportState::Cancelled => {
                tracing::info!(project, import = import_id, applied = outcome.applied, total, "import cancelled");
                publish(ImportStatus::new(StatusKind::Cancelled, outcome.applied, total));
                Ok(outcome)
            }
            Ok(outcome) => {
                let removed = self.inner.imports.lock().remove(&import_id);
                self.invalidate(import_id);
                if let Some(import) = removed {
                    self.delete_raw(import.files.into_iter().filter_map(|f| f.raw));
                }
                tracing::info!(project, import = import_id, applied = outcome.applied, "import applied");
                publish(ImportStatus::new(StatusKind::Done, outcome.applied, total));
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(project, import = import_id, applied = committed, total, error = %e, "import failed");
                publish(ImportStatus::failed(&e, committed, total));
                Err(e)
            }
        }
    }

    fn begin_apply(&self, project: ProjectId, user: UserId) -> Result<(RunningGuard, Import), Error> {
        let imports = self.inner.imports.lock();
        let import_id = find_session(&imports, project, user).ok_or_else(|| Error::not_found("import"))?;
        if !self.inner.running.lock().insert(import_id) {
            tracing::warn!(project, user, import = import_id, "apply already running");
            return Err(Error::ImportAlreadyRunning);
        }
        let guard = RunningGuard {
            inner: Arc::clone(&self.inner),
            import_id,
        };
        let snapshot = imports
            .get(&import_id)
            .cloned()
            .ok_or_else(|| Error::not_found("import"))?;
        Ok((guard, snapshot))
    }

    /// Recomputes conflicts against the committed data, stores them back
    /// into the session and plans the writes.
    fn prepare_apply(&self, snapshot: &mut Import, force_mode: ForceMode) -> Result<apply::ApplyPlan, Error> {
        let store = self.inner.store.as_ref();
        for file in &mut snapshot.files {
            let namespace = file.namespace.clone();
            for language in &mut file.languages {
                conflicts::compute_language_conflicts(store, snapshot.project_id, namespace.as_deref(), language, true)?;
            }
        }
        if let Some(import) = self.inner.imports.lock().get_mut(&snapshot.id) {
            import.files = snapshot.files.clone();
        }
        self.invalidate(snapshot.id);

        apply::apply_force_mode(snapshot, force_mode)?;
        apply::plan(store, snapshot)
    }

    /// Drops the session of `user` and its stored raw files.
    pub fn delete_import(&self, project: ProjectId, user: UserId) -> Result<(), Error> {
        let removed = {
            let mut imports = self.inner.imports.lock();
            let import_id = find_session(&imports, project, user).ok_or_else(|| Error::not_found("import"))?;
            self.ensure_idle(import_id)?;
            imports.remove(&import_id)
        };
        if let Some(import) = removed {
            self.invalidate(import.id);
            self.inner.statuses.lock().insert(
                (project, user),
                ImportStatus::new(StatusKind::Cancelled, import.applied_count, 0),
            );
            tracing::info!(project, user, import = import.id, "import deleted");
            self.delete_raw(import.files.into_iter().filter_map(|f| f.raw));
        }
        Ok(())
    }

    /// Removes one staged language. A file left without languages is
    /// removed, and so is a session left without files.
    pub fn delete_language(&self, project: ProjectId, language_id: ImportLanguageId) -> Result<(), Error> {
        let import_id = self.locate(project, "import language", |i| i.language(language_id).is_some())?;
        let mut removed_raw: Vec<FileRef> = Vec::new();
        {
            let mut imports = self.inner.imports.lock();
            self.ensure_idle(import_id)?;
            let Some(import) = imports.get_mut(&import_id) else {
                return Err(Error::not_found("import language"));
            };
            for file in &mut import.files {
                file.languages.retain(|l| l.id != language_id);
            }
            let (kept, emptied): (Vec<ImportFile>, Vec<ImportFile>) = std::mem::take(&mut import.files)
                .into_iter()
                .partition(|f| !f.languages.is_empty());
            import.files = kept;
            removed_raw.extend(emptied.into_iter().filter_map(|f| f.raw));
            if import.files.is_empty() {
                imports.remove(&import_id);
            }
        }
        self.invalidate(import_id);
        self.delete_raw(removed_raw);
        Ok(())
    }

    /// Namespaces of the project plus those only named by the session.
    pub fn get_all_namespaces(&self, project: ProjectId, user: UserId) -> Result<Vec<ImportNamespace>, Error> {
        let mut namespaces: BTreeMap<String, Option<u64>> = self
            .inner
            .store
            .namespaces(project)?
            .into_iter()
            .map(|n| (n.name, Some(n.id)))
            .collect();
        let imports = self.inner.imports.lock();
        if let Some(import) = find_session(&imports, project, user).and_then(|id| imports.get(&id)) {
            for name in import.files.iter().filter_map(|f| f.namespace.clone()) {
                namespaces.entry(name).or_insert(None);
            }
        }
        Ok(namespaces
            .into_iter()
            .map(|(name, id)| ImportNamespace { id, name })
            .collect())
    }

    /// Exports the committed translations of a project.
    pub fn export(&self, project: ProjectId, params: &ExportParams) -> Result<ExportedFiles, Error> {
        let store = self.inner.store.as_ref();
        let languages = store.languages(project)?;
        let base_language = languages
            .iter()
            .find(|l| l.base)
            .or_else(|| languages.first())
            .map_or_else(|| "en".to_string(), |l| l.tag.clone());
        let translations = store.translations(project)?;
        export::export(&translations, params, &base_language, || Ok(translations.clone()))
    }

    /// Finds the session holding an entity, rejecting entities of other
    /// projects.
    fn locate(
        &self,
        project: ProjectId,
        entity: &'static str,
        holds: impl Fn(&Import) -> bool,
    ) -> Result<ImportId, Error> {
        let imports = self.inner.imports.lock();
        let import = imports
            .values()
            .find(|import| holds(import))
            .ok_or_else(|| Error::not_found(entity))?;
        if import.project_id != project {
            return Err(Error::validation_error(format!(
                "{} does not belong to project {}",
                entity, project
            )));
        }
        Ok(import.id)
    }

    fn language_views(&self, import_id: ImportId) -> Result<Arc<Vec<ImportLanguageView>>, Error> {
        if let Some(views) = self.inner.views.lock().get(&import_id) {
            tracing::trace!(import = import_id, "language views served from cache");
            return Ok(Arc::clone(views));
        }
        let import = self
            .inner
            .imports
            .lock()
            .get(&import_id)
            .cloned()
            .ok_or_else(|| Error::not_found("import"))?;
        let languages = self.inner.store.languages(import.project_id)?;
        let views = Arc::new(build_views(&import, &languages));
        self.inner.views.lock().insert(import_id, Arc::clone(&views));
        Ok(views)
    }

    /// Fails while an apply of the session runs. Callers holding the
    /// `imports` lock take `running` second, like [`Self::begin_apply`].
    fn ensure_idle(&self, import_id: ImportId) -> Result<(), Error> {
        if self.inner.running.lock().contains(&import_id) {
            return Err(Error::ImportAlreadyRunning);
        }
        Ok(())
    }

    fn invalidate(&self, import_id: ImportId) {
        self.inner.views.lock().remove(&import_id);
    }

    fn delete_raw(&self, files: impl IntoIterator<Item = FileRef>) {
        for file in files {
            if let Err(e) = self.inner.files.delete(&file) {
                tracing::warn!(file = file.0.as_str(), error = %e, "could not delete stored file");
            }
        }
    }
}

fn find_session(imports: &BTreeMap<ImportId, Import>, project: ProjectId, user: UserId) -> Option<ImportId> {
    imports
        .values()
        .find(|i| i.project_id == project && i.author_id == user)
        .map(|i| i.id)
}

fn build_views(import: &Import, languages: &[Language]) -> Vec<ImportLanguageView> {
    import
        .files
        .iter()
        .flat_map(|file| {
            file.languages.iter().map(move |language| {
                let existing = language
                    .existing_language
                    .and_then(|id| languages.iter().find(|l| l.id == id));
                let conflict_count = language.conflict_count();
                ImportLanguageView {
                    id: language.id,
                    tag: language.tag.clone(),
                    file_id: file.id,
                    file_name: file.name.clone(),
                    namespace: file.namespace.clone(),
                    existing_language_id: language.existing_language,
                    existing_language_tag: existing.map(|l| l.tag.clone()),
                    total_count: language.translations.len(),
                    conflict_count,
                    resolved_count: conflict_count - language.unresolved_count(),
                    issue_count: file.issues.len(),
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryFileStorage, MemoryProjectStore};

    fn service() -> (ImportService, Arc<MemoryProjectStore>, Arc<MemoryFileStorage>) {
        let store = Arc::new(MemoryProjectStore::new());
        let files = Arc::new(MemoryFileStorage::new());
        (ImportService::new(store.clone(), files.clone()), store, files)
    }

    #[test]
    fn test_same_name_replaces_file() {
        let (service, _, files) = service();
        let params = ImportAddFilesParams {
            store_raw_files: true,
            ..ImportAddFilesParams::default()
        };
        service
            .add_files(vec![IncomingFile::new("en.json", r#"{"a": "A"}"#)], 1, 1, &params)
            .unwrap();
        service
            .add_files(vec![IncomingFile::new("en.json", r#"{"a": "A", "b": "B"}"#)], 1, 1, &params)
            .unwrap();
        let import = service.get_import(1, 1).unwrap();
        assert_eq!(import.files.len(), 1);
        assert_eq!(import.languages().next().unwrap().translations.len(), 2);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_views_are_invalidated() {
        let (service, store, _) = service();
        let en = store.add_language(1, "en", true);
        store.set_translation(1, "a", None, en.id, "Old").unwrap();
        service
            .add_files(
                vec![IncomingFile::new("en.json", r#"{"a": "New"}"#)],
                1,
                1,
                &ImportAddFilesParams::default(),
            )
            .unwrap();
        let view = service.get_result(1, 1, PageRequest::default()).unwrap().items[0].clone();
        assert_eq!(view.existing_language_tag.as_deref(), Some("en"));
        assert_eq!((view.conflict_count, view.resolved_count), (1, 0));

        service.resolve_all_of_language(1, view.id, true).unwrap();
        let view = service.find_language_view(1, view.id).unwrap();
        assert_eq!(view.resolved_count, 1);
        assert_eq!(service.import_state(1, 1).unwrap(), ImportState::Resolved);
    }

    #[test]
    fn test_foreign_project_is_rejected() {
        let (service, _, _) = service();
        service
            .add_files(
                vec![IncomingFile::new("en.json", r#"{"a": "A"}"#)],
                1,
                1,
                &ImportAddFilesParams::default(),
            )
            .unwrap();
        let language = service.get_import(1, 1).unwrap().files[0].languages[0].id;
        let result = service.resolve_all_of_language(2, language, true);
        assert!(result.unwrap_err().is_validation());
        assert!(matches!(
            service.delete_language(1, 999_999),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_language_removes_empty_session() {
        let (service, _, _) = service();
        service
            .add_files(
                vec![IncomingFile::new("en.json", r#"{"a": "A"}"#)],
                1,
                1,
                &ImportAddFilesParams::default(),
            )
            .unwrap();
        let language = service.get_import(1, 1).unwrap().files[0].languages[0].id;
        service.delete_language(1, language).unwrap();
        assert!(matches!(service.get_import(1, 1), Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_second_apply_is_rejected_while_running() {
        let (service, _, _) = service();
        service
            .add_files(
                vec![IncomingFile::new("en.json", r#"{"a": "A"}"#)],
                1,
                1,
                &ImportAddFilesParams::default(),
            )
            .unwrap();
        let (guard, _) = service.begin_apply(1, 1).unwrap();
        let result = service.import(1, 1, ForceMode::NoForce).await;
        assert!(matches!(result, Err(Error::ImportAlreadyRunning)));
        assert!(matches!(service.delete_import(1, 1), Err(Error::ImportAlreadyRunning)));
        drop(guard);
        let outcome = service.import(1, 1, ForceMode::NoForce).await.unwrap();
        assert_eq!(outcome.state, ImportState::Applied);
        assert_eq!(service.apply_status(1, 1).unwrap().status, StatusKind::Done);
    }
}
