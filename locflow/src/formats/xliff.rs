//! XLIFF 1.2 documents.
//!
//! A document holds `<file>` elements with a source and an optional target
//! language; both languages are imported. Files produced by Xcode
//! (`tool-id="com.apple.dt.xcode"`) carry Apple printf placeholders, and
//! their `.stringsdict` units are reassembled into plurals. Other documents
//! are read as ICU.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::{BufRead, Write},
};

use lazy_static::lazy_static;
use quick_xml::{
    Reader, Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use regex::Regex;

use crate::{
    error::Error,
    formats::{
        ExportedFile, FileIssue, FileIssueKind, FileProcessorContext,
        stringsdict::{self, FORMAT_KEY, PluralVariable, StringsdictEntry},
    },
    placeholder::{self, PrintfDialect},
    plural_rules,
    traits::{FileExporter, FileProcessor, Parser},
    types::{CanonicalMessage, Entry, PluralCategory, PluralMessage, Resource},
};

pub const XCODE_TOOL_ID: &str = "com.apple.dt.xcode";
const XLIFF_NAMESPACE: &str = "urn:oasis:names:tc:xliff:document:1.2";

lazy_static! {
    /// `/key:dict/NSStringLocalizedFormatKey:dict/:string` or
    /// `/key:dict/variable:dict/category:dict/:string`.
    static ref STRINGSDICT_UNIT: Regex =
        Regex::new(r"^/(.+?):dict/(.+?):dict/(?:(.+?):dict/)?:string$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Format {
    pub files: Vec<XliffFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XliffFile {
    pub original: Option<String>,
    pub datatype: Option<String>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub tool_id: Option<String>,
    pub units: Vec<TransUnit>,
}

impl XliffFile {
    pub fn is_apple(&self) -> bool {
        self.tool_id.as_deref() == Some(XCODE_TOOL_ID)
    }

    fn is_stringsdict(&self) -> bool {
        self.original
            .as_deref()
            .is_some_and(|original| original.ends_with(".stringsdict"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransUnit {
    pub id: Option<String>,
    pub source: Option<String>,
    pub target: Option<String>,
    pub note: Option<String>,
}

fn attribute(e: &BytesStart, name: &[u8]) -> Result<Option<String>, Error> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|e| Error::DataMismatch(e.to_string()))?;
        if attr.key.as_ref() == name {
            return Ok(Some(attr.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}

/// Reads the content of an element, keeping inline markup as raw tags.
fn read_inner<R: BufRead>(xml_reader: &mut Reader<R>, end: &[u8]) -> Result<String, Error> {
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut depth = 0usize;
    loop {
        match xml_reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::Start(e) => {
                depth += 1;
                text.push_str(&format!("<{}>", String::from_utf8_lossy(&e)));
            }
            Event::Empty(e) => text.push_str(&format!("<{}/>", String::from_utf8_lossy(&e))),
            Event::End(e) => {
                if depth == 0 && e.name().as_ref() == end {
                    return Ok(text);
                }
                depth = depth.saturating_sub(1);
                text.push_str(&format!("</{}>", String::from_utf8_lossy(e.name().as_ref())));
            }
            Event::Eof => return Err(Error::DataMismatch("unexpected EOF in XLIFF element".to_string())),
            _ => {}
        }
        buf.clear();
    }
}

impl Parser for Format {
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut xml_reader = Reader::from_reader(reader);
        let mut buf = Vec::new();
        let mut files: Vec<XliffFile> = Vec::new();
        let mut unit: Option<TransUnit> = None;
        let mut saw_root = false;

        loop {
            match xml_reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"file" => {
                    files.push(XliffFile {
                        original: attribute(&e, b"original")?,
                        datatype: attribute(&e, b"datatype")?,
                        source_language: attribute(&e, b"source-language")?,
                        target_language: attribute(&e, b"target-language")?,
                        ..XliffFile::default()
                    });
                }
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"tool" => {
                    if let Some(file) = files.last_mut() {
                        file.tool_id = attribute(&e, b"tool-id")?;
                    }
                }
                Event::Start(e) if e.name().as_ref() == b"xliff" => saw_root = true,
                Event::Start(e) if e.name().as_ref() == b"trans-unit" => {
                    unit = Some(TransUnit {
                        id: attribute(&e, b"id")?,
                        ..TransUnit::default()
                    });
                }
                Event::Start(e) => {
                    let name = e.name().as_ref().to_vec();
                    if let Some(current) = unit.as_mut() {
                        let slot = match name.as_slice() {
                            b"source" => Some(&mut current.source),
                            b"target" => Some(&mut current.target),
                            b"note" => Some(&mut current.note),
                            _ => None,
                        };
                        if let Some(slot) = slot {
                            *slot = Some(read_inner(&mut xml_reader, &name)?);
                        }
                    }
                }
                Event::End(e) if e.name().as_ref() == b"trans-unit" => {
                    if let (Some(finished), Some(file)) = (unit.take(), files.last_mut()) {
                        file.units.push(finished);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        if !saw_root {
            return Err(Error::DataMismatch("missing <xliff> root element".to_string()));
        }
        Ok(Format { files })
    }

    fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        {
            let mut xml_writer = Writer::new_with_indent(&mut writer, b' ', 2);
            xml_writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
            let mut root = BytesStart::new("xliff");
            root.push_attribute(("version", "1.2"));
            root.push_attribute(("xmlns", XLIFF_NAMESPACE));
            xml_writer.write_event(Event::Start(root))?;

            for file in &self.files {
                let mut start = BytesStart::new("file");
                start.push_attribute(("original", file.original.as_deref().unwrap_or_default()));
                start.push_attribute(("datatype", file.datatype.as_deref().unwrap_or("plaintext")));
                if let Some(source) = &file.source_language {
                    start.push_attribute(("source-language", source.as_str()));
                }
                if let Some(target) = &file.target_language {
                    start.push_attribute(("target-language", target.as_str()));
                }
                xml_writer.write_event(Event::Start(start))?;
                if let Some(tool_id) = &file.tool_id {
                    xml_writer.write_event(Event::Start(BytesStart::new("header")))?;
                    let mut tool = BytesStart::new("tool");
                    tool.push_attribute(("tool-id", tool_id.as_str()));
                    xml_writer.write_event(Event::Empty(tool))?;
                    xml_writer.write_event(Event::End(BytesEnd::new("header")))?;
                }
                xml_writer.write_event(Event::Start(BytesStart::new("body")))?;
                for unit in &file.units {
                    let mut start = BytesStart::new("trans-unit");
                    if let Some(id) = &unit.id {
                        start.push_attribute(("id", id.as_str()));
                    }
                    xml_writer.write_event(Event::Start(start))?;
                    for (element, content) in [
                        ("source", &unit.source),
                        ("target", &unit.target),
                        ("note", &unit.note),
                    ] {
                        let Some(content) = content else {
                            continue;
                        };
                        let mut start = BytesStart::new(element);
                        start.push_attribute(("xml:space", "preserve"));
                        xml_writer.write_event(Event::Start(start))?;
                        xml_writer.write_event(Event::Text(BytesText::new(content)))?;
                        xml_writer.write_event(Event::End(BytesEnd::new(element)))?;
                    }
                    xml_writer.write_event(Event::End(BytesEnd::new("trans-unit")))?;
                }
                xml_writer.write_event(Event::End(BytesEnd::new("body")))?;
                xml_writer.write_event(Event::End(BytesEnd::new("file")))?;
            }
            xml_writer.write_event(Event::End(BytesEnd::new("xliff")))?;
        }
        writer.write_all(b"\n")?;
        Ok(())
    }
}

pub struct XliffFileProcessor;

impl FileProcessor for XliffFileProcessor {
    fn process(&self, bytes: &[u8], context: &mut FileProcessorContext) -> Result<(), Error> {
        let format = Format::from_bytes(bytes)
            .map_err(|e| Error::cannot_parse(context.file_name(), e.to_string()))?;
        for file in &format.files {
            let source_language = file.source_language.clone();
            let target_language = match (&file.source_language, &file.target_language) {
                (_, Some(target)) => Some(target.clone()),
                (None, None) => Some(context.language(None)?),
                (Some(_), None) => None,
            };
            for language in source_language.iter().chain(target_language.iter()) {
                context.touch_language(language);
            }

            let mut stringsdict_units: Vec<(&str, &TransUnit)> = Vec::new();
            for unit in &file.units {
                let Some(id) = unit.id.as_deref() else {
                    context.add_issue(
                        FileIssue::new(FileIssueKind::IdAttributeNotProvided)
                            .with_value(unit.source.clone().unwrap_or_default()),
                    );
                    continue;
                };
                if file.is_apple() && file.is_stringsdict() {
                    stringsdict_units.push((id, unit));
                    continue;
                }
                if let Some(language) = &source_language {
                    add_unit_text(context, file, language, id, unit.source.as_deref(), unit.note.as_deref());
                }
                if let Some(language) = &target_language {
                    add_unit_text(context, file, language, id, unit.target.as_deref(), unit.note.as_deref());
                }
            }

            if !stringsdict_units.is_empty() {
                if let Some(language) = &source_language {
                    add_stringsdict_units(context, language, &stringsdict_units, |u| u.source.as_deref());
                }
                if let Some(language) = &target_language {
                    add_stringsdict_units(context, language, &stringsdict_units, |u| u.target.as_deref());
                }
            }
        }
        Ok(())
    }
}

fn add_unit_text(
    context: &mut FileProcessorContext,
    file: &XliffFile,
    language: &str,
    id: &str,
    text: Option<&str>,
    note: Option<&str>,
) {
    let Some(text) = text else {
        return;
    };
    let message = if file.is_apple() {
        CanonicalMessage::Singular(context.printf_text(text, PrintfDialect::Apple, false))
    } else {
        context.icu_message(text)
    };
    let description = note.map(str::to_string);
    context.add_translation(language, Entry::new(id, message).with_description(description));
}

/// Rebuilds stringsdict entries from Xcode unit ids and imports them.
fn add_stringsdict_units(
    context: &mut FileProcessorContext,
    language: &str,
    units: &[(&str, &TransUnit)],
    text_of: impl Fn(&TransUnit) -> Option<&str>,
) {
    let mut entries: Vec<StringsdictEntry> = Vec::new();
    for (id, unit) in units {
        let Some(captures) = STRINGSDICT_UNIT.captures(id) else {
            context.add_issue(
                FileIssue::new(FileIssueKind::UnsupportedConstruct)
                    .with_key(*id)
                    .with_language(language),
            );
            continue;
        };
        let Some(text) = text_of(unit) else {
            continue;
        };
        let key = &captures[1];
        let index = match entries.iter().position(|e| e.key == key) {
            Some(index) => index,
            None => {
                entries.push(StringsdictEntry {
                    key: key.to_string(),
                    format_key: String::new(),
                    variables: Vec::new(),
                });
                entries.len() - 1
            }
        };
        let entry = &mut entries[index];
        match captures.get(3) {
            None if &captures[2] == FORMAT_KEY => entry.format_key = text.to_string(),
            None => {}
            Some(category) => {
                let name = &captures[2];
                let variable = match entry.variables.iter().position(|v| v.name == name) {
                    Some(position) => &mut entry.variables[position],
                    None => {
                        entry.variables.push(PluralVariable {
                            name: name.to_string(),
                            spec_type: "NSStringPluralRuleType".to_string(),
                            value_type: None,
                            forms: Vec::new(),
                        });
                        let last = entry.variables.len() - 1;
                        &mut entry.variables[last]
                    }
                };
                variable
                    .forms
                    .push((category.as_str().to_string(), text.to_string()));
            }
        }
    }
    for entry in &entries {
        if let Some(message) = stringsdict::plural_message(context, language, entry) {
            context.add_translation(language, Entry::new(entry.key.clone(), message));
        }
    }
}

/// Writes one XLIFF document per language, pairing base-language text as
/// the source. The Apple flavour mirrors an Xcode export.
pub struct XliffFileExporter {
    pub base_language: String,
    pub apple: bool,
}

impl XliffFileExporter {
    fn text(&self, message: &CanonicalMessage) -> String {
        match message {
            CanonicalMessage::Singular(text) if self.apple => {
                placeholder::from_icu(text, PrintfDialect::Apple, false)
            }
            message => message.to_icu(),
        }
    }

    fn apple_plural_units(
        &self,
        key: &str,
        language: &str,
        target: &PluralMessage,
        source: Option<&PluralMessage>,
    ) -> Vec<TransUnit> {
        let mut units = vec![TransUnit {
            id: Some(format!("/{}:dict/{}:dict/:string", key, FORMAT_KEY)),
            source: Some("%#@value@".to_string()),
            target: Some("%#@value@".to_string()),
            note: None,
        }];
        let categories: BTreeSet<PluralCategory> = plural_rules::required_categories_for_str(language)
            .into_iter()
            .chain(target.forms.keys().copied())
            .collect();
        let form = |plural: &PluralMessage, category: PluralCategory| {
            plural
                .forms
                .get(&category)
                .or_else(|| plural.forms.get(&PluralCategory::Other))
                .map(|text| placeholder::from_icu(text, PrintfDialect::Apple, true))
        };
        for category in categories {
            units.push(TransUnit {
                id: Some(format!("/{}:dict/value:dict/{}:dict/:string", key, category)),
                source: source.and_then(|s| form(s, category)),
                target: form(target, category),
                note: None,
            });
        }
        units
    }
}

impl FileExporter for XliffFileExporter {
    fn export_resource(
        &self,
        resource: &Resource,
        base: Option<&Resource>,
    ) -> Result<Vec<ExportedFile>, Error> {
        let base_entries: BTreeMap<&str, &Entry> = base
            .map(|b| b.entries.iter().map(|e| (e.key.as_str(), e)).collect())
            .unwrap_or_default();

        let mut strings = XliffFile {
            source_language: Some(self.base_language.clone()),
            target_language: Some(resource.language.clone()),
            datatype: Some("plaintext".to_string()),
            ..XliffFile::default()
        };
        let mut plurals = strings.clone();
        if self.apple {
            strings.original = Some(format!("{}.lproj/Localizable.strings", self.base_language));
            strings.tool_id = Some(XCODE_TOOL_ID.to_string());
            plurals.original = Some(format!("{}.lproj/Localizable.stringsdict", self.base_language));
            plurals.tool_id = Some(XCODE_TOOL_ID.to_string());
        }

        for entry in &resource.entries {
            let base_entry = base_entries.get(entry.key.as_str());
            if let (true, CanonicalMessage::Plural(target)) = (self.apple, &entry.message) {
                let source = base_entry.and_then(|b| match &b.message {
                    CanonicalMessage::Plural(plural) => Some(plural),
                    CanonicalMessage::Singular(_) => None,
                });
                plurals
                    .units
                    .extend(self.apple_plural_units(&entry.key, &resource.language, target, source));
                continue;
            }
            strings.units.push(TransUnit {
                id: Some(entry.key.clone()),
                source: base_entry.map(|b| self.text(&b.message)),
                target: Some(self.text(&entry.message)),
                note: entry
                    .description
                    .clone()
                    .or_else(|| base_entry.and_then(|b| b.description.clone())),
            });
        }

        let mut files = vec![strings];
        if !plurals.units.is_empty() {
            files.push(plurals);
        }
        let extension = if self.apple { "xliff" } else { "xlf" };
        Ok(vec![ExportedFile::new(
            format!("{}.{}", resource.language, extension),
            Format { files }.to_bytes()?,
        )])
    }

    fn needs_base_language(&self) -> bool {
        true
    }
}
