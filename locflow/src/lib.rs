#![forbid(unsafe_code)]
//! Localization import/export pipeline for Rust.
//!
//! Parses JSON, gettext PO, Java properties, Android `strings.xml`, Apple
//! `.strings`/`.stringsdict`, Flutter ARB and XLIFF 1.2 files into canonical
//! ICU messages, stages them per user with conflict detection, and commits
//! them into a project store in cancellable sub-chunks. Committed
//! translations export back into any of those formats.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use locflow::{
//!     ForceMode, ImportAddFilesParams, ImportService, IncomingFile,
//!     store::{MemoryFileStorage, MemoryProjectStore},
//! };
//!
//! # async fn run() -> Result<(), locflow::Error> {
//! let service = ImportService::new(
//!     Arc::new(MemoryProjectStore::new()),
//!     Arc::new(MemoryFileStorage::new()),
//! );
//! let errors = service.add_files(
//!     vec![IncomingFile::new("en.json", r#"{"hello": "Hello {name}"}"#)],
//!     1,
//!     1,
//!     &ImportAddFilesParams::default(),
//! )?;
//! assert!(errors.is_empty());
//! service.import(1, 1, ForceMode::NoForce).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Supported Formats
//!
//! - **JSON**: structured (nested) JSON with ICU messages
//! - **PO**: gettext catalogs with C, PHP and Python placeholders
//! - **Properties**: Java `.properties` with ICU messages
//! - **Android `strings.xml`**: strings, plurals and string arrays
//! - **Apple**: `.strings` and `.stringsdict`
//! - **Flutter ARB**
//! - **XLIFF 1.2**: generic and Xcode flavours

pub mod archive;
pub mod batch;
pub mod codec;
pub mod error;
pub mod escaping;
pub mod export;
pub mod formats;
pub mod icu;
pub mod import;
pub mod options;
pub mod placeholder;
pub mod plural_rules;
pub mod store;
pub mod traits;
pub mod types;

// Re-export most used types for easy consumption
pub use crate::{
    codec::{Codec, convert},
    error::Error,
    export::{ExportParams, ExportTranslation, ExportedFiles, export},
    formats::{ExportFormat, FileIssue, FileIssueKind, ImportFormat},
    import::{
        ApplyOptions, ApplyOutcome, FileError, ForceMode, ImportAddFilesParams, ImportService,
        ImportState, ImportStatus, IncomingFile, PageRequest, Resolution, StatusStream,
    },
    options::ParseOptions,
    placeholder::PrintfDialect,
    types::{CanonicalMessage, Entry, PluralCategory, PluralMessage, Resource},
};
