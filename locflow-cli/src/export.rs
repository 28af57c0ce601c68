use std::path::Path;
use std::sync::Arc;

use locflow::{
    ExportParams, ExportedFiles, ImportService,
    store::{MemoryFileStorage, MemoryProjectStore},
};

/// Exports the committed translations of a snapshot project into a
/// directory, or a zip archive when `output` ends with `.zip`.
pub fn run_export(snapshot: &Path, project: u64, output: &str, params: &ExportParams) -> Result<usize, String> {
    if !snapshot.is_file() {
        return Err(format!("Snapshot does not exist: {}", snapshot.display()));
    }
    let store = MemoryProjectStore::load(snapshot)
        .map_err(|e| format!("Cannot load snapshot {}: {}", snapshot.display(), e))?;
    let service = ImportService::new(Arc::new(store), Arc::new(MemoryFileStorage::new()));
    let files = service
        .export(project, params)
        .map_err(|e| format!("Export failed: {}", e))?;
    if files.is_empty() {
        return Err(format!("Project {} has no translations to export", project));
    }
    let count = files.len();
    write_files(files, output)?;
    tracing::info!(project, files = count, output, format = %params.format, "exported");
    Ok(count)
}

/// Writes exported files below `output`, or packs them into a zip archive
/// when `output` ends with `.zip`.
pub fn write_files(files: ExportedFiles, output: &str) -> Result<(), String> {
    if output.to_ascii_lowercase().ends_with(".zip") {
        let bytes = files.into_zip().map_err(|e| format!("Cannot pack archive: {}", e))?;
        if let Some(parent) = Path::new(output).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| format!("Cannot create output directory: {}", e))?;
        }
        std::fs::write(output, bytes).map_err(|e| format!("Cannot write {}: {}", output, e))
    } else {
        files
            .write_to_dir(output)
            .map_err(|e| format!("Cannot write to {}: {}", output, e))
    }
}
