//! Structured JSON: nested objects whose leaves are ICU messages.
//!
//! Nested objects are flattened into key names joined by the structure
//! delimiter and arrays flatten to `key[i]`. Export rebuilds the nesting.

use std::io::{BufRead, Write};

use serde_json::{Map, Value};

use crate::{
    error::Error,
    formats::{ExportedFile, FileIssue, FileIssueKind, FileProcessorContext, decode_text},
    traits::{FileExporter, FileProcessor, Parser},
    types::{Entry, Resource},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Format {
    pub root: Map<String, Value>,
}

impl Parser for Format {
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        match serde_json::from_reader(reader).map_err(Error::Parse)? {
            Value::Object(root) => Ok(Format { root }),
            _ => Err(Error::DataMismatch(
                "root of a JSON localization file must be an object".to_string(),
            )),
        }
    }

    fn to_writer<W: Write>(&self, writer: W) -> Result<(), Error> {
        serde_json::to_writer_pretty(writer, &self.root).map_err(Error::Parse)
    }
}

pub struct JsonFileProcessor;

impl FileProcessor for JsonFileProcessor {
    fn process(&self, bytes: &[u8], context: &mut FileProcessorContext) -> Result<(), Error> {
        let format = Format::from_str(&decode_text(bytes))
            .map_err(|e| Error::cannot_parse(context.file_name(), e.to_string()))?;
        let language = context.language(None)?;
        context.touch_language(&language);
        for (key, value) in &format.root {
            flatten(context, &language, key.clone(), value);
        }
        Ok(())
    }
}

fn flatten(context: &mut FileProcessorContext, language: &str, key: String, value: &Value) {
    match value {
        Value::Object(map) => {
            let Some(delimiter) = context.options().structure_delimiter else {
                context.add_issue(
                    FileIssue::new(FileIssueKind::ValueIsNotString)
                        .with_key(key)
                        .with_language(language),
                );
                return;
            };
            for (child, value) in map {
                flatten(context, language, format!("{}{}{}", key, delimiter, child), value);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten(context, language, format!("{}[{}]", key, index), item);
            }
        }
        Value::Null => context.add_issue(
            FileIssue::new(FileIssueKind::ValueIsEmpty)
                .with_key(key)
                .with_language(language),
        ),
        Value::String(text) => {
            let message = context.icu_message(text);
            context.add_translation(language, Entry::new(key, message));
        }
        Value::Bool(_) | Value::Number(_) => {
            let message = context.icu_message(&value.to_string());
            context.add_translation(language, Entry::new(key, message));
        }
    }
}

pub struct JsonFileExporter {
    pub structure_delimiter: Option<char>,
}

impl FileExporter for JsonFileExporter {
    fn export_resource(
        &self,
        resource: &Resource,
        _base: Option<&Resource>,
    ) -> Result<Vec<ExportedFile>, Error> {
        let mut root = Map::new();
        for entry in &resource.entries {
            let text = entry.message.to_icu();
            let inserted = match self.structure_delimiter {
                Some(delimiter) => {
                    let path: Vec<&str> = entry.key.split(delimiter).collect();
                    insert_nested(&mut root, &path, &text)
                }
                None => false,
            };
            if !inserted {
                root.insert(entry.key.clone(), Value::String(text));
            }
        }
        let bytes = Format { root }.to_bytes()?;
        Ok(vec![ExportedFile::new(
            format!("{}.json", resource.language),
            bytes,
        )])
    }
}

// Entries arrive sorted, so a failed insertion never leaves an empty object behind.
fn insert_nested(root: &mut Map<String, Value>, path: &[&str], text: &str) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    if path.iter().any(|segment| segment.is_empty()) {
        return false;
    }
    let mut current = root;
    for segment in parents {
        let next = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match next {
            Value::Object(map) => current = map,
            _ => return false,
        }
    }
    if current.contains_key(*last) {
        return false;
    }
    current.insert(last.to_string(), Value::String(text.to_string()));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        formats::{ImportFormat, ParsedFile},
        options::ParseOptions,
        types::{CanonicalMessage, PluralCategory},
    };

    fn parse(json: &str, options: &ParseOptions) -> ParsedFile {
        let mut context = FileProcessorContext::new("en.json", options);
        JsonFileProcessor.process(json.as_bytes(), &mut context).unwrap();
        context.into_parsed(ImportFormat::Json)
    }

    #[test]
    fn test_nested_objects_are_flattened() {
        let parsed = parse(
            r#"{"a": {"b": "x", "c": ["y", "z"]}, "n": 5, "t": true}"#,
            &ParseOptions::default(),
        );
        let resource = &parsed.resources[0];
        assert_eq!(resource.language, "en");
        let keys: Vec<&str> = resource.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a.b", "a.c[0]", "a.c[1]", "n", "t"]);
        assert_eq!(
            resource.find_entry("n").unwrap().message,
            CanonicalMessage::Singular("5".to_string())
        );
    }

    #[test]
    fn test_null_and_nested_without_delimiter_are_issues() {
        let options = ParseOptions::default().with_structure_delimiter(None);
        let parsed = parse(r#"{"a": {"b": "x"}, "c": null, "d": "ok"}"#, &options);
        assert_eq!(parsed.resources[0].entries.len(), 1);
        let kinds: Vec<_> = parsed.issues.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![FileIssueKind::ValueIsNotString, FileIssueKind::ValueIsEmpty]
        );
    }

    #[test]
    fn test_icu_plural_values() {
        let parsed = parse(
            r#"{"items": "{count, plural, one {# item} other {# items}}"}"#,
            &ParseOptions::default(),
        );
        let CanonicalMessage::Plural(plural) = &parsed.resources[0].entries[0].message else {
            panic!("expected plural");
        };
        assert_eq!(plural.forms[&PluralCategory::Other], "# items");
    }

    #[test]
    fn test_non_object_root_is_error() {
        let options = ParseOptions::default();
        let mut context = FileProcessorContext::new("en.json", &options);
        assert!(JsonFileProcessor.process(b"[1, 2]", &mut context).is_err());
        assert!(JsonFileProcessor.process(b"{ invalid", &mut context).is_err());
    }

    #[test]
    fn test_export_nests_keys() {
        let mut resource = Resource::new("en");
        for (key, text) in [("a", "A"), ("a.b", "AB"), ("c.d", "CD"), ("c.e", "CE")] {
            resource.add_entry(Entry::new(key, CanonicalMessage::Singular(text.to_string())));
        }
        let files = JsonFileExporter {
            structure_delimiter: Some('.'),
        }
        .export_resource(&resource, None)
        .unwrap();
        assert_eq!(files[0].path, "en.json");
        let value: Value = serde_json::from_slice(&files[0].bytes).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"a": "A", "a.b": "AB", "c": {"d": "CD", "e": "CE"}})
        );
    }
}
