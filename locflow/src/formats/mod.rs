//! All supported localization file formats for locflow.
//!
//! Each submodule owns the native model of one format (a `Format` type with
//! [`Parser`](crate::traits::Parser) support), a [`FileProcessor`] lifting it
//! into canonical entries, and a [`FileExporter`] writing it back. This module
//! holds the [`ImportFormat`] / [`ExportFormat`] registries and the shared
//! parsing context.

pub mod android_strings;
pub mod arb;
pub mod json;
pub mod po;
pub mod properties;
pub mod strings;
pub mod stringsdict;
pub mod xliff;

use std::{
    collections::HashSet,
    fmt::{Display, Formatter},
    path::Path,
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use unic_langid::LanguageIdentifier;

use crate::{
    error::Error,
    escaping::{escape, escape_before_syntax},
    options::ParseOptions,
    placeholder::{self, PrintfDialect},
    plural_rules::{self, NativeForm},
    traits::{FileExporter, FileProcessor},
    types::{CanonicalMessage, Entry, PluralMessage, Resource},
};

/// Formats that can be imported, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportFormat {
    Json,
    Po,
    Properties,
    AndroidXml,
    AppleStrings,
    AppleStringsdict,
    FlutterArb,
    Xliff,
}

impl ImportFormat {
    /// Picks the format for a file name by its extension.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|s| s.to_str())?
            .to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(ImportFormat::Json),
            "po" => Some(ImportFormat::Po),
            "properties" => Some(ImportFormat::Properties),
            "xml" => Some(ImportFormat::AndroidXml),
            "strings" => Some(ImportFormat::AppleStrings),
            "stringsdict" => Some(ImportFormat::AppleStringsdict),
            "arb" => Some(ImportFormat::FlutterArb),
            "xliff" | "xlf" => Some(ImportFormat::Xliff),
            _ => None,
        }
    }

    pub fn processor(&self) -> Box<dyn FileProcessor> {
        match self {
            ImportFormat::Json => Box::new(json::JsonFileProcessor),
            ImportFormat::Po => Box::new(po::PoFileProcessor),
            ImportFormat::Properties => Box::new(properties::PropertiesFileProcessor),
            ImportFormat::AndroidXml => Box::new(android_strings::AndroidStringsProcessor),
            ImportFormat::AppleStrings => Box::new(strings::StringsFileProcessor),
            ImportFormat::AppleStringsdict => Box::new(stringsdict::StringsdictFileProcessor),
            ImportFormat::FlutterArb => Box::new(arb::ArbFileProcessor),
            ImportFormat::Xliff => Box::new(xliff::XliffFileProcessor),
        }
    }
}

impl Display for ImportFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ImportFormat::Json => "json",
            ImportFormat::Po => "po",
            ImportFormat::Properties => "properties",
            ImportFormat::AndroidXml => "android",
            ImportFormat::AppleStrings => "strings",
            ImportFormat::AppleStringsdict => "stringsdict",
            ImportFormat::FlutterArb => "arb",
            ImportFormat::Xliff => "xliff",
        };
        write!(f, "{}", name)
    }
}

/// Formats that stored translations can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportFormat {
    Json,
    Xliff,
    AppleXliff,
    Po,
    AndroidXml,
    /// Apple `.strings` plus `.stringsdict` for plurals.
    IosStringsStringsdict,
    FlutterArb,
    Properties,
}

impl ExportFormat {
    /// The main file extension of the format.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Xliff => "xlf",
            ExportFormat::AppleXliff => "xliff",
            ExportFormat::Po => "po",
            ExportFormat::AndroidXml => "xml",
            ExportFormat::IosStringsStringsdict => "strings",
            ExportFormat::FlutterArb => "arb",
            ExportFormat::Properties => "properties",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            ExportFormat::Json | ExportFormat::FlutterArb => "application/json",
            ExportFormat::Xliff | ExportFormat::AppleXliff => "application/x-xliff+xml",
            ExportFormat::Po => "text/x-gettext-translation",
            ExportFormat::AndroidXml => "application/xml",
            ExportFormat::IosStringsStringsdict | ExportFormat::Properties => "text/plain",
        }
    }

    /// Builds the exporter. `dialect` selects the PO message format and is
    /// ignored by other formats.
    pub fn exporter(
        &self,
        base_language: &str,
        dialect: Option<PrintfDialect>,
        structure_delimiter: Option<char>,
    ) -> Box<dyn FileExporter> {
        match self {
            ExportFormat::Json => Box::new(json::JsonFileExporter { structure_delimiter }),
            ExportFormat::Xliff => Box::new(xliff::XliffFileExporter {
                base_language: base_language.to_string(),
                apple: false,
            }),
            ExportFormat::AppleXliff => Box::new(xliff::XliffFileExporter {
                base_language: base_language.to_string(),
                apple: true,
            }),
            ExportFormat::Po => Box::new(po::PoFileExporter {
                dialect: dialect.unwrap_or(PrintfDialect::C),
            }),
            ExportFormat::AndroidXml => Box::new(android_strings::AndroidStringsExporter),
            ExportFormat::IosStringsStringsdict => {
                Box::new(strings::StringsStringsdictExporter)
            }
            ExportFormat::FlutterArb => Box::new(arb::ArbFileExporter),
            ExportFormat::Properties => Box::new(properties::PropertiesFileExporter),
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExportFormat::Json => "json",
            ExportFormat::Xliff => "xliff",
            ExportFormat::AppleXliff => "apple-xliff",
            ExportFormat::Po => "po",
            ExportFormat::AndroidXml => "android",
            ExportFormat::IosStringsStringsdict => "apple-strings",
            ExportFormat::FlutterArb => "arb",
            ExportFormat::Properties => "properties",
        };
        write!(f, "{}", name)
    }
}

/// Accepts the display names plus a few aliases, case-insensitively.
///
/// Returns [`crate::error::Error::UnknownFormat`] for unknown strings.
///
/// # Example
/// ```rust
/// use locflow::formats::ExportFormat;
/// use std::str::FromStr;
/// assert_eq!(ExportFormat::from_str("android").unwrap(), ExportFormat::AndroidXml);
/// assert_eq!(ExportFormat::from_str("XLF").unwrap(), ExportFormat::Xliff);
/// assert!(ExportFormat::from_str("foobar").is_err());
/// ```
impl FromStr for ExportFormat {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "json" => Ok(ExportFormat::Json),
            "xliff" | "xlf" => Ok(ExportFormat::Xliff),
            "apple-xliff" | "apple_xliff" => Ok(ExportFormat::AppleXliff),
            "po" | "gettext" => Ok(ExportFormat::Po),
            "android" | "xml" | "android_xml" => Ok(ExportFormat::AndroidXml),
            "apple-strings" | "strings" | "ios" | "ios_strings_stringsdict" => {
                Ok(ExportFormat::IosStringsStringsdict)
            }
            "arb" | "flutter" | "flutter_arb" => Ok(ExportFormat::FlutterArb),
            "properties" => Ok(ExportFormat::Properties),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }
}

/// A file produced by an exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    /// Relative path using `/` separators.
    pub path: String,
    pub bytes: Vec<u8>,
}

impl ExportedFile {
    pub fn new(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }
}

/// Kinds of non-fatal problems found while parsing a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileIssueKind {
    KeyIsEmpty,
    ValueIsEmpty,
    ValueIsNotString,
    DuplicateKey,
    InvalidPluralForm,
    IdAttributeNotProvided,
    UnsupportedConstruct,
}

/// A non-fatal problem with one row of a file. Issues never block apply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileIssue {
    pub kind: FileIssueKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<String>,
}

impl FileIssue {
    pub fn new(kind: FileIssueKind) -> Self {
        Self {
            kind,
            key: None,
            language: None,
            line: None,
            value: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// The outcome of parsing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    pub format: ImportFormat,
    /// One resource per language, in order of first appearance.
    pub resources: Vec<Resource>,
    pub issues: Vec<FileIssue>,
}

/// Mutable state shared by a processor while it walks one file.
pub struct FileProcessorContext<'a> {
    file_name: &'a str,
    options: &'a ParseOptions,
    resources: Vec<Resource>,
    seen: HashSet<(String, String)>,
    issues: Vec<FileIssue>,
}

impl<'a> FileProcessorContext<'a> {
    pub fn new(file_name: &'a str, options: &'a ParseOptions) -> Self {
        Self {
            file_name,
            options,
            resources: Vec::new(),
            seen: HashSet::new(),
            issues: Vec::new(),
        }
    }

    pub fn file_name(&self) -> &str {
        self.file_name
    }

    pub fn options(&self) -> &ParseOptions {
        self.options
    }

    /// Resolves the language of a single-language file: hint, then the
    /// language declared in the file, then the path, then the file stem.
    pub fn language(&self, declared: Option<&str>) -> Result<String, Error> {
        if let Some(hint) = self.options.language_hint.as_deref().filter(|h| !h.is_empty()) {
            return Ok(hint.to_string());
        }
        if let Some(declared) = declared.map(str::trim).filter(|d| !d.is_empty()) {
            return Ok(declared.to_string());
        }
        if let Some(language) = infer_language_from_path(self.file_name) {
            return Ok(language);
        }
        let stem = language_from_stem(self.file_name);
        if self.options.strict && !is_language_tag(&stem) {
            return Err(Error::cannot_parse(
                self.file_name,
                "Cannot determine the language of the file",
            ));
        }
        Ok(stem)
    }

    /// Records a translation. Empty keys and values become issues; for
    /// duplicate keys the first occurrence is kept.
    pub fn add_translation(&mut self, language: &str, entry: Entry) {
        if entry.key.trim().is_empty() {
            self.add_issue(FileIssue::new(FileIssueKind::KeyIsEmpty).with_language(language));
            return;
        }
        if matches!(&entry.message, CanonicalMessage::Singular(text) if text.is_empty()) {
            self.add_issue(
                FileIssue::new(FileIssueKind::ValueIsEmpty)
                    .with_key(&entry.key)
                    .with_language(language),
            );
            return;
        }
        if !self.seen.insert((language.to_string(), entry.key.clone())) {
            self.add_issue(
                FileIssue::new(FileIssueKind::DuplicateKey)
                    .with_key(&entry.key)
                    .with_language(language),
            );
            return;
        }
        self.resource_mut(language).add_entry(entry);
    }

    /// Makes sure the language appears in the result even without entries.
    pub fn touch_language(&mut self, language: &str) {
        self.resource_mut(language);
    }

    fn resource_mut(&mut self, language: &str) -> &mut Resource {
        let index = match self.resources.iter().position(|r| r.language == language) {
            Some(index) => index,
            None => {
                self.resources.push(Resource::new(language));
                self.resources.len() - 1
            }
        };
        &mut self.resources[index]
    }

    pub fn add_issue(&mut self, issue: FileIssue) {
        tracing::debug!(file = self.file_name, kind = ?issue.kind, key = ?issue.key, "file issue");
        self.issues.push(issue);
    }

    /// Canonical message for a value that is ICU already (JSON, ARB,
    /// properties). Malformed ICU is kept as escaped literal text.
    pub fn icu_message(&self, raw: &str) -> CanonicalMessage {
        if !self.options.convert_placeholders {
            return CanonicalMessage::Singular(escape(raw, false));
        }
        match CanonicalMessage::from_icu(raw) {
            Ok(message) => message,
            Err(_) => CanonicalMessage::Singular(escape(raw, false)),
        }
    }

    /// Canonical text for a printf value.
    pub fn printf_text(&self, raw: &str, dialect: PrintfDialect, in_plural: bool) -> String {
        if self.options.convert_placeholders {
            placeholder::to_icu(raw, dialect, in_plural)
        } else if in_plural {
            escape_before_syntax(raw, true)
        } else {
            escape(raw, false)
        }
    }

    /// Canonical plural from native printf forms. The plural argument is `0`.
    pub fn printf_plural(
        &self,
        language: &str,
        forms: impl IntoIterator<Item = (NativeForm, String)>,
        dialect: PrintfDialect,
    ) -> Option<CanonicalMessage> {
        let converted = forms
            .into_iter()
            .map(|(form, raw)| (form, self.printf_text(&raw, dialect, true)));
        let mapped = plural_rules::map_native_forms(language, converted);
        PluralMessage::new("0", mapped).map(CanonicalMessage::Plural)
    }

    pub fn into_parsed(self, format: ImportFormat) -> ParsedFile {
        ParsedFile {
            format,
            resources: self.resources,
            issues: self.issues,
        }
    }
}

/// Parses one file, choosing the format from its extension.
pub fn parse(file_name: &str, bytes: &[u8], options: &ParseOptions) -> Result<ParsedFile, Error> {
    let format = ImportFormat::from_file_name(file_name)
        .ok_or_else(|| Error::cannot_parse(file_name, "No matching processor"))?;
    let mut context = FileProcessorContext::new(file_name, options);
    format.processor().process(bytes, &mut context)?;
    let parsed = context.into_parsed(format);
    tracing::debug!(
        file = file_name,
        %format,
        languages = parsed.resources.len(),
        issues = parsed.issues.len(),
        "parsed file"
    );
    Ok(parsed)
}

/// Decodes text with BOM detection (UTF-8, UTF-16LE/BE); input without a
/// BOM is read as UTF-8, replacing invalid sequences.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    match encoding_rs::Encoding::for_bom(bytes) {
        Some((encoding, bom_length)) => encoding
            .decode_without_bom_handling(&bytes[bom_length..])
            .0
            .into_owned(),
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// A parseable identifier whose language subtag has two or three letters,
/// so qualifiers like `night` or stems like `strings` are not mistaken for
/// languages.
fn is_language_tag(tag: &str) -> bool {
    tag.replace('_', "-")
        .parse::<LanguageIdentifier>()
        .is_ok_and(|id| (2..=3).contains(&id.language.as_str().len()))
}

/// Attempts to infer the language from directory conventions:
/// `{lang}.lproj` for Apple, `values-{lang}` for Android (`values-pt-rBR`
/// becomes `pt-BR`, `values-b+sr+Latn` becomes `sr-Latn`).
///
/// # Example
/// ```rust
/// use locflow::formats::infer_language_from_path;
/// assert_eq!(infer_language_from_path("ar.lproj/Localizable.strings").as_deref(), Some("ar"));
/// assert_eq!(infer_language_from_path("res/values-pt-rBR/strings.xml").as_deref(), Some("pt-BR"));
/// assert_eq!(infer_language_from_path("values/strings.xml"), None);
/// ```
pub fn infer_language_from_path(path: &str) -> Option<String> {
    Path::new(path).components().rev().skip(1).find_map(|c| {
        let component = c.as_os_str().to_str()?;
        if let Some(language) = component.strip_suffix(".lproj") {
            return Some(language.to_string());
        }
        let qualifier = component.strip_prefix("values-")?;
        let language = if let Some(bcp) = qualifier.strip_prefix("b+") {
            bcp.replace('+', "-")
        } else {
            let mut parts = qualifier.split('-');
            let language = parts.next()?;
            match parts.next().and_then(|r| r.strip_prefix('r')) {
                Some(region) => format!("{}-{}", language, region),
                None => language.to_string(),
            }
        };
        is_language_tag(&language).then_some(language)
    })
}

/// Language from a file stem: `messages_en_US` gives `en_US`, `app_en`
/// gives `en`, `de` gives `de`. Stems without a language suffix are
/// returned whole.
pub fn language_from_stem(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    if let Some((_, suffix)) = stem.split_once('_')
        && is_language_tag(suffix)
    {
        return suffix.to_string();
    }
    stem.to_string()
}
