//! Import staging, conflict resolution and apply.
//!
//! Uploaded files are parsed into a per-user session ([`model::Import`]),
//! compared with committed translations, resolved by the user and finally
//! committed in cancellable sub-chunks.

pub mod apply;
pub mod conflicts;
pub mod model;
pub mod service;
pub mod stream;

pub use model::{
    ApplyOptions, ApplyOutcome, Conflict, FileError, ForceMode, Import, ImportAddFilesParams,
    ImportFile, ImportFileIssue, ImportLanguage, ImportLanguageView, ImportNamespace, ImportState,
    ImportStatus, ImportTranslation, ImportTranslationView, IncomingFile, Page, PageRequest,
    Resolution, StatusKind, TranslationFilters,
};
pub use service::ImportService;
pub use stream::StatusStream;
