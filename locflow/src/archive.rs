//! Zip expansion for uploads and zip packing for multi-file exports.

use std::{
    collections::BTreeMap,
    io::{Cursor, Read, Write},
};

use zip::{ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::error::Error;

/// One file found inside an uploaded archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path inside the archive, `/`-separated.
    pub name: String,
    /// The entry bytes, or why they could not be read.
    pub content: Result<Vec<u8>, String>,
}

/// Whether an uploaded file should be expanded before parsing.
pub fn is_archive(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(".zip")
}

/// Expands a zip archive.
///
/// Directories, `__MACOSX/` metadata and dot-files are skipped. An archive
/// that cannot be opened at all is an error; an entry that cannot be read
/// is returned with an `Err` content so the caller can report it per file.
pub fn unpack(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, Error> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut file = match archive.by_index(index) {
            Ok(file) => file,
            Err(e) => {
                entries.push(ArchiveEntry {
                    name: format!("#{}", index),
                    content: Err(e.to_string()),
                });
                continue;
            }
        };
        let name = file.name().replace('\\', "/");
        if file.is_dir() || is_ignored(&name) {
            continue;
        }
        let mut content = Vec::new();
        let content = match file.read_to_end(&mut content) {
            Ok(_) => Ok(content),
            Err(e) => Err(e.to_string()),
        };
        entries.push(ArchiveEntry { name, content });
    }
    tracing::debug!(entries = entries.len(), "unpacked archive");
    Ok(entries)
}

fn is_ignored(name: &str) -> bool {
    if name.starts_with("__MACOSX/") || name.contains("/__MACOSX/") {
        return true;
    }
    name.rsplit('/')
        .next()
        .is_some_and(|file_name| file_name.is_empty() || file_name.starts_with('.'))
}

/// Packs files into a deflated zip archive, in path order.
pub fn pack(files: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>, Error> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (path, bytes) in files {
        writer.start_file(path.as_str(), options)?;
        writer.write_all(bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.add_directory("nested/", options).unwrap();
        for (name, content) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_unpack_skips_metadata() {
        let bytes = archive(&[
            ("en.json", "{}"),
            ("nested/de.json", "{\"a\": \"b\"}"),
            ("__MACOSX/._en.json", "junk"),
            (".DS_Store", "junk"),
            ("nested/.hidden", "junk"),
        ]);
        let entries = unpack(&bytes).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["en.json", "nested/de.json"]);
        assert_eq!(entries[1].content.as_deref().unwrap(), b"{\"a\": \"b\"}");
    }

    #[test]
    fn test_unreadable_archive_is_error() {
        let result = unpack(b"definitely not a zip");
        assert!(matches!(result, Err(Error::Archive(_))));
    }

    #[test]
    fn test_pack_then_unpack() {
        let mut files = BTreeMap::new();
        files.insert("values-de/strings.xml".to_string(), b"<resources/>".to_vec());
        files.insert("en.json".to_string(), b"{}".to_vec());
        let bytes = pack(&files).unwrap();
        let entries = unpack(&bytes).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "en.json");
        assert!(is_archive("Upload.ZIP"));
        assert!(!is_archive("en.json"));
    }
}
