//! All error types for the locflow crate.
//!
//! Format-level problems inside a single row are never errors: they are
//! recorded as [`crate::formats::FileIssue`]s. The variants below cover whole
//! files, caller mistakes and storage failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown format `{0}`")]
    UnknownFormat(String),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid data: {0}")]
    DataMismatch(String),

    #[error("cannot parse file `{file_name}`: {reason}")]
    CannotParseFile { file_name: String, reason: String },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("language `{language}` has {count} unresolved conflict(s)")]
    UnresolvedConflicts { language: String, count: usize },

    #[error("an import is already being applied for this session")]
    ImportAlreadyRunning,

    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Creates a per-file parse failure.
    pub fn cannot_parse(file_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::CannotParseFile {
            file_name: file_name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new validation error
    pub fn validation_error(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Error::NotFound { entity }
    }

    /// Whether the error was caused by the caller (bad request) rather than
    /// the system.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn read_snapshot(bytes: &[u8]) -> Result<serde_json::Value, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }

    #[test]
    fn test_conversions_keep_their_source() {
        let error = read_snapshot(b"{ not json").unwrap_err();
        assert!(matches!(error, Error::Parse(_)));
        assert!(error.to_string().starts_with("parse error: "));

        let error: Error = io::Error::new(io::ErrorKind::PermissionDenied, "snapshot.json").into();
        assert_eq!(error.to_string(), "I/O error: snapshot.json");

        let error: Error = zip::result::ZipError::FileNotFound.into();
        assert!(error.to_string().starts_with("archive error: "));
    }

    #[test]
    fn test_cannot_parse_error() {
        let error = Error::cannot_parse("en.yaml", "No matching processor");
        assert_eq!(
            error.to_string(),
            "cannot parse file `en.yaml`: No matching processor"
        );
    }

    #[test]
    fn test_unresolved_conflicts_error() {
        let error = Error::UnresolvedConflicts {
            language: "de".to_string(),
            count: 3,
        };
        assert_eq!(
            error.to_string(),
            "language `de` has 3 unresolved conflict(s)"
        );
    }

    #[test]
    fn test_validation_and_not_found_are_distinct() {
        let validation = Error::validation_error("language not from project");
        let not_found = Error::not_found("import language");
        assert!(validation.is_validation());
        assert!(!not_found.is_validation());
        assert_eq!(not_found.to_string(), "import language not found");
    }
}
