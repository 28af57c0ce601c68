use std::path::PathBuf;
use std::sync::Arc;

use locflow::{
    ApplyOptions, Error, ForceMode, ImportAddFilesParams, ImportService, ImportState, IncomingFile,
    PageRequest, import::StatusKind,
    store::{MemoryFileStorage, MemoryProjectStore, ProjectStore, same_language_tag},
};
use tokio_util::sync::CancellationToken;

use crate::validation::{validate_import_file, validate_language_code};

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Project snapshot; created when missing.
    pub snapshot: PathBuf,
    pub project: u64,
    pub user: u64,
    pub base_language: Option<String>,
    pub namespace: Option<String>,
    pub params: ImportAddFilesParams,
    pub force: ForceMode,
    pub chunk_size: Option<usize>,
    pub tags: Vec<String>,
    /// Print NDJSON status lines instead of a summary.
    pub stream: bool,
}

/// Stages `inputs` into a fresh session, applies it and saves the project
/// snapshot. Returns the number of written translations.
pub async fn run_import(inputs: &[String], options: &ImportOptions) -> Result<usize, String> {
    if inputs.is_empty() {
        return Err("At least one input file is required".to_string());
    }
    for input in inputs {
        validate_import_file(input)?;
    }

    let store = Arc::new(
        MemoryProjectStore::load(&options.snapshot)
            .map_err(|e| format!("Cannot load snapshot {}: {}", options.snapshot.display(), e))?,
    );
    if let Some(tag) = &options.base_language {
        validate_language_code(tag)?;
        ensure_base_language(&store, options.project, tag).map_err(|e| e.to_string())?;
    }
    let service = ImportService::new(store.clone(), Arc::new(MemoryFileStorage::new()));
    let (project, user) = (options.project, options.user);

    let mut files = Vec::with_capacity(inputs.len());
    for input in inputs {
        let bytes = std::fs::read(input).map_err(|e| format!("Cannot read {}: {}", input, e))?;
        files.push(IncomingFile::new(input.replace('\\', "/"), bytes));
    }
    let errors = service
        .add_files(files, project, user, &options.params)
        .map_err(|e| e.to_string())?;
    for error in &errors {
        eprintln!("Skipped {}: {}", error.file_name, error.message);
    }

    let import = match service.get_import(project, user) {
        Ok(import) => import,
        Err(Error::NotFound { .. }) => return Err("Nothing to import".to_string()),
        Err(e) => return Err(e.to_string()),
    };
    if let Some(namespace) = &options.namespace {
        for file in &import.files {
            service
                .select_namespace(project, file.id, Some(namespace))
                .map_err(|e| e.to_string())?;
        }
    }

    let mut apply_options = ApplyOptions::new(options.force).with_tags(options.tags.clone());
    if let Some(chunk_size) = options.chunk_size {
        apply_options = apply_options.with_chunk_size(chunk_size);
    }

    let applied = if options.stream {
        stream_apply(&service, project, user, apply_options).await?
    } else {
        print_summary(&service, project, user)?;
        let outcome = service
            .import_with(project, user, apply_options, CancellationToken::new(), |done| {
                tracing::debug!(done, "import progress");
            })
            .await
            .map_err(|e| match e {
                Error::UnresolvedConflicts { .. } => format!(
                    "{}. Use --force keep-existing or --force override to apply anyway",
                    e
                ),
                other => other.to_string(),
            })?;
        if outcome.state == ImportState::Cancelled {
            return Err(format!("Import cancelled after {} of {} translations", outcome.applied, outcome.total));
        }
        println!("Imported {} translation(s)", outcome.applied);
        outcome.applied
    };

    store
        .save(&options.snapshot)
        .map_err(|e| format!("Cannot save snapshot {}: {}", options.snapshot.display(), e))?;
    Ok(applied)
}

async fn stream_apply(
    service: &ImportService,
    project: u64,
    user: u64,
    options: ApplyOptions,
) -> Result<usize, String> {
    let mut stream = service.import_streaming(project, user, options, CancellationToken::new());
    let mut last = stream.latest();
    while let Some(status) = stream.next().await {
        print!("{}", status.to_ndjson().map_err(|e| e.to_string())?);
        last = status;
    }
    match last.status {
        StatusKind::Done => Ok(last.applied),
        StatusKind::Cancelled => Err(format!("Import cancelled after {} of {} translations", last.applied, last.total)),
        _ => Err(last.error.unwrap_or_else(|| "Import failed".to_string())),
    }
}

fn print_summary(service: &ImportService, project: u64, user: u64) -> Result<(), String> {
    let result = service
        .get_result(project, user, PageRequest::unpaged())
        .map_err(|e| e.to_string())?;
    for view in &result.items {
        let target = view.existing_language_tag.as_deref().unwrap_or("new language");
        let namespace = view
            .namespace
            .as_deref()
            .map(|n| format!(" ({})", n))
            .unwrap_or_default();
        println!(
            "{}{} [{} -> {}]: {} translation(s), {} conflict(s), {} issue(s)",
            view.file_name, namespace, view.tag, target, view.total_count, view.conflict_count, view.issue_count
        );
    }
    Ok(())
}

fn ensure_base_language(store: &MemoryProjectStore, project: u64, tag: &str) -> Result<(), Error> {
    let exists = store
        .languages(project)?
        .iter()
        .any(|language| same_language_tag(&language.tag, tag));
    if !exists {
        store.add_language(project, tag, true);
        tracing::info!(project, language = tag, "created base language");
    }
    Ok(())
}
