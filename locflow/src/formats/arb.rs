//! Flutter Application Resource Bundle (`.arb`) files.
//!
//! An ARB file is a JSON object of ICU messages. `@@locale` declares the
//! language and `@key` objects carry metadata for `key`.

use std::io::{BufRead, Write};

use serde_json::{Map, Value};

use crate::{
    error::Error,
    formats::{ExportedFile, FileIssue, FileIssueKind, FileProcessorContext, decode_text},
    icu,
    traits::{FileExporter, FileProcessor, Parser},
    types::{Entry, Resource},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Format {
    pub locale: Option<String>,
    pub messages: Vec<ArbMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArbMessage {
    pub key: String,
    pub value: Value,
    pub description: Option<String>,
    /// Placeholder names declared in the `@key` metadata.
    pub placeholders: Vec<String>,
}

impl Parser for Format {
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let Value::Object(root) = serde_json::from_reader::<_, Value>(reader)? else {
            return Err(Error::DataMismatch(
                "root of an ARB file must be an object".to_string(),
            ));
        };
        let locale = root
            .get("@@locale")
            .and_then(Value::as_str)
            .map(str::to_string);
        let messages = root
            .iter()
            .filter(|(key, _)| !key.starts_with('@'))
            .map(|(key, value)| {
                let metadata = root.get(&format!("@{}", key));
                ArbMessage {
                    key: key.clone(),
                    value: value.clone(),
                    description: metadata
                        .and_then(|m| m.get("description"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    placeholders: metadata
                        .and_then(|m| m.get("placeholders"))
                        .and_then(Value::as_object)
                        .map(|p| p.keys().cloned().collect())
                        .unwrap_or_default(),
                }
            })
            .collect();
        Ok(Format { locale, messages })
    }

    /// Writes `@@locale` first and each `@key` right after its message,
    /// with two-space indentation.
    fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        let mut members: Vec<String> = Vec::new();
        if let Some(locale) = &self.locale {
            members.push(format!("  \"@@locale\": {}", serde_json::to_string(locale)?));
        }
        for message in &self.messages {
            members.push(format!(
                "  {}: {}",
                serde_json::to_string(&message.key)?,
                serde_json::to_string(&message.value)?
            ));
            let mut metadata = Map::new();
            if let Some(description) = &message.description {
                metadata.insert("description".to_string(), Value::String(description.clone()));
            }
            if !message.placeholders.is_empty() {
                let placeholders: Map<String, Value> = message
                    .placeholders
                    .iter()
                    .map(|name| (name.clone(), Value::Object(Map::new())))
                    .collect();
                metadata.insert("placeholders".to_string(), Value::Object(placeholders));
            }
            if !metadata.is_empty() {
                let nested = serde_json::to_string_pretty(&Value::Object(metadata))?.replace('\n', "\n  ");
                members.push(format!(
                    "  {}: {}",
                    serde_json::to_string(&format!("@{}", message.key))?,
                    nested
                ));
            }
        }
        let body = if members.is_empty() {
            "{}\n".to_string()
        } else {
            format!("{{\n{}\n}}\n", members.join(",\n"))
        };
        writer.write_all(body.as_bytes()).map_err(Error::Io)
    }
}

pub struct ArbFileProcessor;

impl FileProcessor for ArbFileProcessor {
    fn process(&self, bytes: &[u8], context: &mut FileProcessorContext) -> Result<(), Error> {
        let format = Format::from_str(&decode_text(bytes))
            .map_err(|e| Error::cannot_parse(context.file_name(), e.to_string()))?;
        // Flutter writes `pt_BR`; staged languages use BCP 47 hyphens.
        let locale = format.locale.as_deref().map(|l| l.replace('_', "-"));
        let language = context.language(locale.as_deref())?;
        context.touch_language(&language);
        for message in format.messages {
            match &message.value {
                Value::String(text) => {
                    let canonical = context.icu_message(text);
                    context.add_translation(
                        &language,
                        Entry::new(message.key, canonical).with_description(message.description),
                    );
                }
                Value::Null => context.add_issue(
                    FileIssue::new(FileIssueKind::ValueIsEmpty)
                        .with_key(message.key)
                        .with_language(&language),
                ),
                other => context.add_issue(
                    FileIssue::new(FileIssueKind::ValueIsNotString)
                        .with_key(message.key.clone())
                        .with_language(&language)
                        .with_value(other.to_string()),
                ),
            }
        }
        Ok(())
    }
}

pub struct ArbFileExporter;

impl FileExporter for ArbFileExporter {
    fn export_resource(
        &self,
        resource: &Resource,
        _base: Option<&Resource>,
    ) -> Result<Vec<ExportedFile>, Error> {
        let messages = resource
            .entries
            .iter()
            .map(|entry| {
                let text = entry.message.to_icu();
                let placeholders = icu::parse(&text)
                    .map(|nodes| icu::argument_names(&nodes))
                    .unwrap_or_default();
                ArbMessage {
                    key: entry.key.clone(),
                    value: Value::String(text),
                    description: entry.description.clone(),
                    placeholders,
                }
            })
            .collect();
        let format = Format {
            locale: Some(resource.language.replace('-', "_")),
            messages,
        };
        Ok(vec![ExportedFile::new(
            format!("app_{}.arb", resource.language),
            format.to_bytes()?,
        )])
    }
}
