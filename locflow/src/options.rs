//! Options controlling how uploaded files are parsed.

use serde::{Deserialize, Serialize};

/// Parse behavior options for [`crate::formats::parse`] and [`crate::Codec`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Optional language applied to single-language files.
    pub language_hint: Option<String>,
    /// Rejects files whose language is not a valid language identifier
    /// instead of falling back to the file stem.
    pub strict: bool,
    /// Delimiter used to flatten nested structured JSON keys. `None` keeps
    /// keys flat and reports nested objects as issues.
    pub structure_delimiter: Option<char>,
    /// Convert printf placeholders into ICU arguments. When disabled, raw
    /// values are escaped so they survive as literal text.
    pub convert_placeholders: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            language_hint: None,
            strict: false,
            structure_delimiter: Some('.'),
            convert_placeholders: true,
        }
    }
}

impl ParseOptions {
    /// Creates default parse options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a language hint.
    pub fn with_language_hint(mut self, language_hint: Option<String>) -> Self {
        self.language_hint = language_hint;
        self
    }

    /// Enables/disables strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_structure_delimiter(mut self, delimiter: Option<char>) -> Self {
        self.structure_delimiter = delimiter;
        self
    }

    pub fn with_convert_placeholders(mut self, convert: bool) -> Self {
        self.convert_placeholders = convert;
        self
    }
}
