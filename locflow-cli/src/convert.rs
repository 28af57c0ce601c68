use locflow::{Codec, ExportFormat, ExportParams, ParseOptions, PrintfDialect};

use crate::export::write_files;
use crate::validation::{validate_file_path, validate_language_code};

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub format: ExportFormat,
    pub message_format: Option<PrintfDialect>,
    pub languages: Option<Vec<String>>,
    pub structure_delimiter: Option<char>,
    /// Language of single-language inputs that do not declare one.
    pub language_hint: Option<String>,
    /// Source language for XLIFF output; defaults to the first input's.
    pub base_language: Option<String>,
    pub strict: bool,
}

/// Reads every input and writes the export to `output` (see
/// [`write_files`]).
pub fn run_convert(inputs: &[String], output: &str, options: &ConvertOptions) -> Result<usize, String> {
    if inputs.is_empty() {
        return Err("At least one input file is required".to_string());
    }
    for input in inputs {
        validate_file_path(input)?;
    }
    if let Some(language) = &options.language_hint {
        validate_language_code(language)?;
    }

    let parse_options = ParseOptions::new()
        .with_language_hint(options.language_hint.clone())
        .with_strict(options.strict)
        .with_structure_delimiter(options.structure_delimiter);
    let mut codec = Codec::new();
    for input in inputs {
        codec
            .read_file_by_extension(input, &parse_options)
            .map_err(|e| format!("Failed to read {}: {}", input, e))?;
    }
    for issue in &codec.issues {
        tracing::warn!(kind = ?issue.kind, key = ?issue.key, language = ?issue.language, "file issue");
    }

    let base_language = options
        .base_language
        .clone()
        .or_else(|| codec.resources.first().map(|r| r.language.clone()))
        .unwrap_or_else(|| "en".to_string());
    let params = ExportParams::new(options.format)
        .with_message_format(options.message_format)
        .with_languages(options.languages.clone())
        .with_structure_delimiter(options.structure_delimiter);
    let files = codec
        .export(&params, &base_language)
        .map_err(|e| format!("Export failed: {}", e))?;
    let count = files.len();
    write_files(files, output)?;
    tracing::info!(files = count, output, format = %options.format, "converted");
    Ok(count)
}
