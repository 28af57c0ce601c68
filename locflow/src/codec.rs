/// This module provides the `Codec` struct for reading localization files of
/// any supported format into canonical resources, and exporting them again.
///
/// The `Codec` works without a project store: it is the file-to-file path
/// used by the `view` and `convert` commands of the CLI. Imports into a
/// project go through [`crate::import::ImportService`] instead.
///
use std::path::Path;

use crate::{
    error::Error,
    export::{self, ExportParams, ExportTranslation, ExportedFiles},
    formats::{self, FileIssue},
    options::ParseOptions,
    types::Resource,
};

/// Represents a collection of canonical resources read from files, together
/// with the issues found while reading them.
#[derive(Debug, Default)]
pub struct Codec {
    /// One resource per language, in order of first appearance.
    pub resources: Vec<Resource>,
    /// Issues of every file read so far.
    pub issues: Vec<FileIssue>,
}

impl Codec {
    /// Creates a new, empty `Codec`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an iterator over all resources.
    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.resources.iter()
    }

    /// Finds a resource by its language tag, if present.
    pub fn get_by_language(&self, lang: &str) -> Option<&Resource> {
        self.resources.iter().find(|res| res.language == lang)
    }

    /// Adds a resource, merging it into an existing resource of the same
    /// language. Entries read later replace earlier entries with the same key.
    pub fn add_resource(&mut self, resource: Resource) {
        match self
            .resources
            .iter_mut()
            .find(|res| res.language == resource.language)
        {
            Some(existing) => {
                for entry in resource.entries {
                    match existing.entries.iter_mut().find(|e| e.key == entry.key) {
                        Some(slot) => *slot = entry,
                        None => existing.entries.push(entry),
                    }
                }
            }
            None => self.resources.push(resource),
        }
    }

    /// Reads one file, choosing the format from its extension and the
    /// language from its content or path.
    ///
    /// # Parameters
    /// - `path`: Path to the localization file.
    /// - `options`: Parse options (language hint, structure delimiter, ...).
    ///
    /// # Returns
    ///
    /// `Ok(())` if the file was read, or an `Error` if its format is unknown
    /// or its structure cannot be parsed.
    pub fn read_file_by_extension<P: AsRef<Path>>(
        &mut self,
        path: P,
        options: &ParseOptions,
    ) -> Result<(), Error> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path.to_string_lossy().replace('\\', "/");
        self.read_bytes(&name, &bytes, options)
    }

    /// Same as [`Codec::read_file_by_extension`] for in-memory content.
    /// `name` is used for format and language detection.
    pub fn read_bytes(&mut self, name: &str, bytes: &[u8], options: &ParseOptions) -> Result<(), Error> {
        let parsed = formats::parse(name, bytes, options)?;
        for resource in parsed.resources {
            self.add_resource(resource);
        }
        self.issues.extend(parsed.issues);
        Ok(())
    }

    /// Flattens the resources into export rows of the default namespace.
    pub fn translations(&self) -> Vec<ExportTranslation> {
        self.resources
            .iter()
            .flat_map(|resource| {
                resource.entries.iter().map(|entry| ExportTranslation {
                    key: entry.key.clone(),
                    namespace: None,
                    description: entry.description.clone(),
                    language: resource.language.clone(),
                    text: entry.message.to_icu(),
                })
            })
            .collect()
    }

    /// Exports every resource.
    ///
    /// # Parameters
    /// - `params`: Target format and filters.
    /// - `base_language`: Source language for formats that pair source and
    ///   target text.
    pub fn export(&self, params: &ExportParams, base_language: &str) -> Result<ExportedFiles, Error> {
        let translations = self.translations();
        export::export(&translations, params, base_language, || Ok(translations.clone()))
    }

    /// Caches the current resources to a JSON file.
    ///
    /// # Returns
    ///
    /// `Ok(())` if caching succeeds, or an `Error` if file I/O or serialization fails.
    pub fn cache_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        let mut writer = std::fs::File::create(path).map_err(Error::Io)?;
        serde_json::to_writer(&mut writer, &self.resources).map_err(Error::Parse)?;
        Ok(())
    }

    /// Loads resources from a JSON cache file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let mut reader = std::fs::File::open(path).map_err(Error::Io)?;
        let resources: Vec<Resource> = serde_json::from_reader(&mut reader).map_err(Error::Parse)?;
        Ok(Codec {
            resources,
            issues: Vec::new(),
        })
    }
}

/// Converts localization files into another format.
///
/// Every input is read with `options`, the merged resources are exported
/// with `params` and the produced files are written below `output_dir`.
///
/// # Errors
///
/// Returns an `Error` if reading, parsing, exporting, or writing fails.
///
/// # Example
///
/// ```rust,no_run
/// use locflow::{convert, ExportParams, ParseOptions, formats::ExportFormat};
/// convert(
///     &["en.lproj/Localizable.strings", "de.lproj/Localizable.strings"],
///     "out",
///     &ExportParams::new(ExportFormat::AndroidXml),
///     &ParseOptions::default(),
/// )?;
/// # Ok::<(), locflow::Error>(())
/// ```
pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(
    inputs: &[P],
    output_dir: Q,
    params: &ExportParams,
    options: &ParseOptions,
) -> Result<ExportedFiles, Error> {
    let mut codec = Codec::new();
    for input in inputs {
        codec.read_file_by_extension(input, options)?;
    }
    let base_language = codec
        .resources
        .first()
        .map_or_else(|| "en".to_string(), |r| r.language.clone());
    let files = codec.export(params, &base_language)?;
    files.write_to_dir(output_dir)?;
    Ok(files)
}
