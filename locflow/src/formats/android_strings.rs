//! Support for Android `strings.xml` resources.
//!
//! Handles `<string>`, `<plurals>` and `<string-array>` elements. Array items
//! become keys of the form `name[i]`. Inline markup such as `<b>` or
//! `<xliff:g>` is kept as literal text inside the message, and values use
//! `java.util.Formatter` placeholders.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::{BufRead, Write},
    str::FromStr,
};

use lazy_static::lazy_static;
use quick_xml::{
    Reader, Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use regex::Regex;
use unic_langid::LanguageIdentifier;

use crate::{
    error::Error,
    formats::{ExportedFile, FileIssue, FileIssueKind, FileProcessorContext},
    placeholder::{self, PrintfDialect},
    plural_rules::{self, NativeForm},
    traits::{FileExporter, FileProcessor, Parser},
    types::{CanonicalMessage, Entry, PluralCategory, Resource},
};

lazy_static! {
    static ref TAG: Regex = Regex::new(r"</?[A-Za-z][\w:.-]*(\s[^<>]*)?/?>").unwrap();
    static ref ARRAY_KEY: Regex = Regex::new(r"^(.+)\[(\d+)\]$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Format {
    pub items: Vec<AndroidItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidItem {
    pub name: Option<String>,
    pub value: AndroidValue,
    pub translatable: Option<bool>,
    /// The XML comment directly preceding the element.
    pub comment: Option<String>,
}

/// Element contents after Android unescaping. Markup is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AndroidValue {
    String(String),
    /// `(quantity, text)` pairs in document order.
    Plurals(Vec<(String, String)>),
    Array(Vec<String>),
}

impl Parser for Format {
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut xml_reader = Reader::from_reader(reader);
        let mut buf = Vec::new();
        let mut items = Vec::new();
        let mut pending_comment: Option<String> = None;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Comment(e)) => {
                    let text = String::from_utf8_lossy(&e).trim().to_string();
                    pending_comment = (!text.is_empty()).then_some(text);
                }
                Ok(Event::Start(ref e)) => {
                    let element = e.name().as_ref().to_vec();
                    let (name, translatable) = read_attributes(e)?;
                    let value = match element.as_slice() {
                        b"string" => Some(AndroidValue::String(read_content(&mut xml_reader, b"string")?)),
                        b"plurals" => Some(AndroidValue::Plurals(read_plural_items(&mut xml_reader)?)),
                        b"string-array" => Some(AndroidValue::Array(read_array_items(&mut xml_reader)?)),
                        _ => None,
                    };
                    if let Some(value) = value {
                        items.push(AndroidItem {
                            name,
                            value,
                            translatable,
                            comment: pending_comment.take(),
                        });
                    }
                }
                Ok(Event::Empty(ref e)) if e.name().as_ref() == b"string" => {
                    let (name, translatable) = read_attributes(e)?;
                    items.push(AndroidItem {
                        name,
                        value: AndroidValue::String(String::new()),
                        translatable,
                        comment: pending_comment.take(),
                    });
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(Error::XmlParse(e)),
            }
            buf.clear();
        }
        Ok(Format { items })
    }

    fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        {
            let mut xml_writer = Writer::new_with_indent(&mut writer, b' ', 4);
            xml_writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
            xml_writer.write_event(Event::Start(BytesStart::new("resources")))?;

            for item in &self.items {
                if let Some(comment) = &item.comment {
                    let comment = format!(" {} ", comment.replace("--", "- -"));
                    xml_writer.write_event(Event::Comment(BytesText::from_escaped(comment)))?;
                }
                let element = match item.value {
                    AndroidValue::String(_) => "string",
                    AndroidValue::Plurals(_) => "plurals",
                    AndroidValue::Array(_) => "string-array",
                };
                let mut start = BytesStart::new(element);
                if let Some(name) = &item.name {
                    start.push_attribute(("name", name.as_str()));
                }
                if let Some(translatable) = item.translatable {
                    start.push_attribute(("translatable", if translatable { "true" } else { "false" }));
                }
                xml_writer.write_event(Event::Start(start))?;
                match &item.value {
                    AndroidValue::String(text) => {
                        xml_writer.write_event(Event::Text(BytesText::from_escaped(escape_android(text))))?;
                    }
                    AndroidValue::Plurals(forms) => {
                        for (quantity, text) in forms {
                            let mut start = BytesStart::new("item");
                            start.push_attribute(("quantity", quantity.as_str()));
                            xml_writer.write_event(Event::Start(start))?;
                            xml_writer.write_event(Event::Text(BytesText::from_escaped(escape_android(text))))?;
                            xml_writer.write_event(Event::End(BytesEnd::new("item")))?;
                        }
                    }
                    AndroidValue::Array(values) => {
                        for text in values {
                            xml_writer.write_event(Event::Start(BytesStart::new("item")))?;
                            xml_writer.write_event(Event::Text(BytesText::from_escaped(escape_android(text))))?;
                            xml_writer.write_event(Event::End(BytesEnd::new("item")))?;
                        }
                    }
                }
                xml_writer.write_event(Event::End(BytesEnd::new(element)))?;
            }
            xml_writer.write_event(Event::End(BytesEnd::new("resources")))?;
        }
        writer.write_all(b"\n")?;
        Ok(())
    }
}

fn read_attributes(e: &BytesStart) -> Result<(Option<String>, Option<bool>), Error> {
    let mut name = None;
    let mut translatable = None;
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|e| Error::DataMismatch(e.to_string()))?;
        match attr.key.as_ref() {
            b"name" => name = Some(attr.unescape_value()?.to_string()),
            b"translatable" => translatable = Some(attr.unescape_value()?.as_ref() == "true"),
            _ => {}
        }
    }
    Ok((name, translatable))
}

fn read_plural_items<R: BufRead>(xml_reader: &mut Reader<R>) -> Result<Vec<(String, String)>, Error> {
    let mut buf = Vec::new();
    let mut forms = Vec::new();
    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"item" => {
                let mut quantity = String::new();
                for attr in e.attributes().with_checks(false) {
                    let attr = attr.map_err(|e| Error::DataMismatch(e.to_string()))?;
                    if attr.key.as_ref() == b"quantity" {
                        quantity = attr.unescape_value()?.to_string();
                    }
                }
                forms.push((quantity, read_content(xml_reader, b"item")?));
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"plurals" => break,
            Ok(Event::Eof) => return Err(Error::DataMismatch("unexpected EOF in <plurals>".to_string())),
            Ok(_) => {}
            Err(e) => return Err(Error::XmlParse(e)),
        }
        buf.clear();
    }
    Ok(forms)
}

fn read_array_items<R: BufRead>(xml_reader: &mut Reader<R>) -> Result<Vec<String>, Error> {
    let mut buf = Vec::new();
    let mut values = Vec::new();
    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"item" => {
                values.push(read_content(xml_reader, b"item")?);
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"item" => values.push(String::new()),
            Ok(Event::End(ref e)) if e.name().as_ref() == b"string-array" => break,
            Ok(Event::Eof) => {
                return Err(Error::DataMismatch("unexpected EOF in <string-array>".to_string()));
            }
            Ok(_) => {}
            Err(e) => return Err(Error::XmlParse(e)),
        }
        buf.clear();
    }
    Ok(values)
}

/// Reads everything up to the closing `end` tag. Nested markup is kept as
/// raw tags, text goes through Android unescaping.
fn read_content<R: BufRead>(xml_reader: &mut Reader<R>, end: &[u8]) -> Result<String, Error> {
    let mut buf = Vec::new();
    let mut unescaper = AndroidUnescaper::default();
    let mut depth = 0usize;
    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Text(e)) => unescaper.push_text(&e.unescape()?),
            Ok(Event::CData(e)) => unescaper.push_text(&String::from_utf8_lossy(&e)),
            Ok(Event::Start(e)) => {
                depth += 1;
                unescaper.push_tag(&format!("<{}>", String::from_utf8_lossy(&e)));
            }
            Ok(Event::Empty(e)) => {
                unescaper.push_tag(&format!("<{}/>", String::from_utf8_lossy(&e)));
            }
            Ok(Event::End(e)) => {
                if depth == 0 && e.name().as_ref() == end {
                    break;
                }
                depth = depth.saturating_sub(1);
                unescaper.push_tag(&format!("</{}>", String::from_utf8_lossy(e.name().as_ref())));
            }
            Ok(Event::Eof) => return Err(Error::DataMismatch("unexpected EOF in element".to_string())),
            Ok(_) => {}
            Err(e) => return Err(Error::XmlParse(e)),
        }
        buf.clear();
    }
    Ok(unescaper.finish())
}

/// Applies Android resource string rules: backslash escapes, `"` quoting,
/// and whitespace collapsing outside quotes.
#[derive(Default)]
struct AndroidUnescaper {
    out: String,
    in_quotes: bool,
    pending_space: bool,
}

impl AndroidUnescaper {
    fn push(&mut self, c: char) {
        if self.pending_space {
            self.out.push(' ');
            self.pending_space = false;
        }
        self.out.push(c);
    }

    fn push_tag(&mut self, tag: &str) {
        for c in tag.chars() {
            self.push(c);
        }
    }

    fn push_text(&mut self, text: &str) {
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some('n') => self.push('\n'),
                    Some('t') => self.push('\t'),
                    Some('u') => {
                        let hex: String = chars.by_ref().take(4).collect();
                        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                            Some(decoded) => self.push(decoded),
                            None => hex.chars().for_each(|c| self.push(c)),
                        }
                    }
                    Some(other) => self.push(other),
                    None => {}
                },
                '"' => self.in_quotes = !self.in_quotes,
                c if c.is_whitespace() && !self.in_quotes => {
                    if !self.out.is_empty() {
                        self.pending_space = true;
                    }
                }
                c => self.push(c),
            }
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

/// Escapes text for an Android resource and for XML, keeping markup tags.
fn escape_android(text: &str) -> String {
    let needs_quotes = text.starts_with(' ') || text.ends_with(' ') || text.contains("  ");
    let mut out = String::new();
    let mut last = 0;
    for tag in TAG.find_iter(text) {
        escape_android_text(&text[last..tag.start()], last == 0, &mut out);
        out.push_str(tag.as_str());
        last = tag.end();
    }
    escape_android_text(&text[last..], last == 0, &mut out);
    if needs_quotes {
        format!("\"{}\"", out)
    } else {
        out
    }
}

fn escape_android_text(text: &str, at_start: bool, out: &mut String) {
    for (index, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '@' | '?' if at_start && index == 0 => {
                out.push('\\');
                out.push(c);
            }
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

pub struct AndroidStringsProcessor;

impl FileProcessor for AndroidStringsProcessor {
    fn process(&self, bytes: &[u8], context: &mut FileProcessorContext) -> Result<(), Error> {
        let format = Format::from_bytes(bytes)
            .map_err(|e| Error::cannot_parse(context.file_name(), e.to_string()))?;
        let language = context.language(None)?;
        context.touch_language(&language);

        for item in format.items {
            if item.translatable == Some(false) {
                continue;
            }
            let name = item.name.unwrap_or_default();
            let description = item.comment;
            match item.value {
                AndroidValue::String(text) => {
                    let message = CanonicalMessage::Singular(context.printf_text(&text, PrintfDialect::Java, false));
                    context.add_translation(&language, Entry::new(name, message).with_description(description));
                }
                AndroidValue::Array(values) => {
                    for (index, text) in values.iter().enumerate() {
                        let message =
                            CanonicalMessage::Singular(context.printf_text(text, PrintfDialect::Java, false));
                        context.add_translation(
                            &language,
                            Entry::new(format!("{}[{}]", name, index), message)
                                .with_description(description.clone()),
                        );
                    }
                }
                AndroidValue::Plurals(forms) => {
                    let mut native = Vec::new();
                    for (quantity, text) in forms {
                        match PluralCategory::from_str(&quantity) {
                            Ok(category) => native.push((NativeForm::Keyword(category), text)),
                            Err(_) => context.add_issue(
                                FileIssue::new(FileIssueKind::InvalidPluralForm)
                                    .with_key(&name)
                                    .with_language(&language)
                                    .with_value(quantity),
                            ),
                        }
                    }
                    match context.printf_plural(&language, native, PrintfDialect::Java) {
                        Some(message) => context.add_translation(
                            &language,
                            Entry::new(name, message).with_description(description),
                        ),
                        None => context.add_issue(
                            FileIssue::new(FileIssueKind::InvalidPluralForm)
                                .with_key(name)
                                .with_language(&language),
                        ),
                    }
                }
            }
        }
        Ok(())
    }
}

pub struct AndroidStringsExporter;

impl FileExporter for AndroidStringsExporter {
    fn export_resource(
        &self,
        resource: &Resource,
        _base: Option<&Resource>,
    ) -> Result<Vec<ExportedFile>, Error> {
        let language = &resource.language;
        let required = plural_rules::required_categories_for_str(language);
        let mut items: Vec<AndroidItem> = Vec::new();
        let mut arrays: BTreeMap<String, usize> = BTreeMap::new();

        for entry in &resource.entries {
            if let (Some(captures), CanonicalMessage::Singular(text)) =
                (ARRAY_KEY.captures(&entry.key), &entry.message)
            {
                let name = resource_name(&captures[1]);
                let text = placeholder::from_icu(text, PrintfDialect::Java, false);
                match arrays.get(&name) {
                    Some(&position) => {
                        if let AndroidValue::Array(values) = &mut items[position].value {
                            values.push(text);
                        }
                    }
                    None => {
                        arrays.insert(name.clone(), items.len());
                        items.push(AndroidItem {
                            name: Some(name),
                            value: AndroidValue::Array(vec![text]),
                            translatable: None,
                            comment: entry.description.clone(),
                        });
                    }
                }
                continue;
            }

            let value = match &entry.message {
                CanonicalMessage::Singular(text) => {
                    AndroidValue::String(placeholder::from_icu(text, PrintfDialect::Java, false))
                }
                CanonicalMessage::Plural(plural) => {
                    let categories: BTreeSet<PluralCategory> =
                        required.iter().copied().chain(plural.forms.keys().copied()).collect();
                    AndroidValue::Plurals(
                        categories
                            .into_iter()
                            .filter_map(|category| {
                                let text = plural
                                    .forms
                                    .get(&category)
                                    .or_else(|| plural.forms.get(&PluralCategory::Other))?;
                                Some((
                                    category.to_string(),
                                    placeholder::from_icu(text, PrintfDialect::Java, true),
                                ))
                            })
                            .collect(),
                    )
                }
            };
            items.push(AndroidItem {
                name: Some(resource_name(&entry.key)),
                value,
                translatable: None,
                comment: entry.description.clone(),
            });
        }

        let bytes = Format { items }.to_bytes()?;
        Ok(vec![ExportedFile::new(
            format!("{}/strings.xml", values_directory(language)),
            bytes,
        )])
    }
}

/// Android resource names allow letters, digits, `_` and `.`.
fn resource_name(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// `values-de`, `values-pt-rBR`, or `values-b+sr+Latn` for tags with a script.
pub fn values_directory(language: &str) -> String {
    let Ok(id) = language.replace('_', "-").parse::<LanguageIdentifier>() else {
        return format!("values-{}", language);
    };
    match (id.script, id.region) {
        (Some(script), region) => {
            let mut qualifier = format!("values-b+{}+{}", id.language, script);
            if let Some(region) = region {
                qualifier.push('+');
                qualifier.push_str(region.as_str());
            }
            qualifier
        }
        (None, Some(region)) => format!("values-{}-r{}", id.language, region),
        (None, None) => format!("values-{}", id.language),
    }
}
