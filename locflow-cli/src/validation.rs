use std::path::Path;

use locflow::{ImportFormat, archive};
use unic_langid::LanguageIdentifier;

/// Validate file path exists and is a regular file
pub fn validate_file_path(path: &str) -> Result<(), String> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return Err(format!("File does not exist: {}", path));
    }

    if !path_obj.is_file() {
        return Err(format!("Path is not a file: {}", path));
    }

    Ok(())
}

/// Validate that an upload for `locflow import` has a known extension.
/// Zip archives are accepted and expanded by the import.
pub fn validate_import_file(path: &str) -> Result<(), String> {
    validate_file_path(path)?;
    if archive::is_archive(path) || ImportFormat::from_file_name(path).is_some() {
        Ok(())
    } else {
        Err(format!(
            "Unsupported file: {}. Expected json, po, properties, xml, strings, stringsdict, arb, xlf, xliff or zip",
            path
        ))
    }
}

/// Validate language code format using unic-langid (same as lib crate)
pub fn validate_language_code(lang: &str) -> Result<(), String> {
    if lang.trim().is_empty() {
        return Err("Language code cannot be empty".to_string());
    }

    match lang.replace('_', "-").parse::<LanguageIdentifier>() {
        Ok(_) => Ok(()),
        Err(_) => Err(format!(
            "Invalid language code format: {}. Expected valid BCP 47 language identifier",
            lang
        )),
    }
}
