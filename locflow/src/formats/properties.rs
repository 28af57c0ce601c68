//! Java `.properties` files with ICU (MessageFormat) values.
//!
//! The comment block directly above a key becomes its description. Files
//! are read as UTF-8; `\uXXXX` escapes are decoded either way.

use std::io::{BufRead, Write};

use crate::{
    error::Error,
    formats::{ExportedFile, FileProcessorContext, decode_text},
    traits::{FileExporter, FileProcessor, Parser},
    types::{Entry, Resource},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub key: String,
    pub value: String,
    /// Comment lines directly above the key, without the `#`/`!` marker.
    pub comments: Vec<String>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Format {
    pub properties: Vec<Property>,
}

impl Parser for Format {
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut properties = Vec::new();
        let mut comments: Vec<String> = Vec::new();
        let mut logical = String::new();
        let mut logical_start = 0;

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim_start();

            if logical.is_empty() {
                logical_start = index + 1;
                if trimmed.is_empty() {
                    comments.clear();
                    continue;
                }
                if let Some(comment) = trimmed.strip_prefix(['#', '!']) {
                    comments.push(comment.trim().to_string());
                    continue;
                }
            }

            if ends_with_continuation(trimmed) {
                logical.push_str(&trimmed[..trimmed.len() - 1]);
                continue;
            }
            logical.push_str(trimmed);

            let (key, value) = split_key_value(&logical);
            properties.push(Property {
                key,
                value,
                comments: std::mem::take(&mut comments),
                line: logical_start,
            });
            logical.clear();
        }
        if !logical.is_empty() {
            let (key, value) = split_key_value(&logical);
            properties.push(Property {
                key,
                value,
                comments,
                line: logical_start,
            });
        }
        Ok(Format { properties })
    }

    fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        for property in &self.properties {
            for comment in &property.comments {
                writeln!(writer, "# {}", comment)?;
            }
            writeln!(
                writer,
                "{}={}",
                escape(&property.key, true),
                escape(&property.value, false)
            )?;
        }
        Ok(())
    }
}

/// An odd number of trailing backslashes continues the logical line.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_key_value(logical: &str) -> (String, String) {
    let chars: Vec<char> = logical.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '=' | ':' | ' ' | '\t' | '\u{0C}' => break,
            _ => i += 1,
        }
    }
    let key_end = i.min(chars.len());
    let key: String = chars[..key_end].iter().collect();

    let mut j = key_end;
    while j < chars.len() && matches!(chars[j], ' ' | '\t' | '\u{0C}') {
        j += 1;
    }
    if j < chars.len() && matches!(chars[j], '=' | ':') {
        j += 1;
        while j < chars.len() && matches!(chars[j], ' ' | '\t' | '\u{0C}') {
            j += 1;
        }
    }
    let value: String = chars[j..].iter().collect();
    (unescape(&key), unescape(&value))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{0C}'),
            Some('u') => {
                let hex: String = (0..4).filter_map(|_| chars.next_if(char::is_ascii_hexdigit)).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => out.push(decoded),
                    _ => {
                        out.push('u');
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0C}' => out.push_str("\\f"),
            '=' | ':' if is_key => {
                out.push('\\');
                out.push(c);
            }
            '#' | '!' if index == 0 => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || index == 0 => out.push_str("\\ "),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

pub struct PropertiesFileProcessor;

impl FileProcessor for PropertiesFileProcessor {
    fn process(&self, bytes: &[u8], context: &mut FileProcessorContext) -> Result<(), Error> {
        let format = Format::from_str(&decode_text(bytes))
            .map_err(|e| Error::cannot_parse(context.file_name(), e.to_string()))?;
        let language = context.language(None)?;
        context.touch_language(&language);
        for property in format.properties {
            let message = context.icu_message(&property.value);
            let description = (!property.comments.is_empty()).then(|| property.comments.join("\n"));
            context.add_translation(
                &language,
                Entry::new(property.key, message).with_description(description),
            );
        }
        Ok(())
    }
}

pub struct PropertiesFileExporter;

impl FileExporter for PropertiesFileExporter {
    fn export_resource(
        &self,
        resource: &Resource,
        _base: Option<&Resource>,
    ) -> Result<Vec<ExportedFile>, Error> {
        let format = Format {
            properties: resource
                .entries
                .iter()
                .map(|entry| Property {
                    key: entry.key.clone(),
                    value: entry.message.to_icu(),
                    comments: entry
                        .description
                        .iter()
                        .flat_map(|d| d.lines().map(str::to_string))
                        .collect(),
                    line: 0,
                })
                .collect(),
        };
        Ok(vec![ExportedFile::new(
            format!("messages_{}.properties", resource.language),
            format.to_bytes()?,
        )])
    }
}
