//! Apple `.stringsdict` plural dictionaries.
//!
//! Each top-level key maps to a dictionary holding an
//! `NSStringLocalizedFormatKey` such as `%#@count@ left` and one variable
//! dictionary per `%#@name@` reference. A message with a single plural
//! variable becomes a canonical plural; the text around the reference is
//! folded into every form.

use std::{
    collections::BTreeSet,
    io::{BufRead, Write},
    str::FromStr,
};

use lazy_static::lazy_static;
use quick_xml::{
    Reader, Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use regex::Regex;

use crate::{
    error::Error,
    formats::{FileIssue, FileIssueKind, FileProcessorContext},
    placeholder::{self, PrintfDialect},
    plural_rules::{self, NativeForm},
    traits::{FileProcessor, Parser},
    types::{CanonicalMessage, Entry, PluralCategory, PluralMessage},
};

pub(crate) const FORMAT_KEY: &str = "NSStringLocalizedFormatKey";
const SPEC_TYPE_KEY: &str = "NSStringFormatSpecTypeKey";
const VALUE_TYPE_KEY: &str = "NSStringFormatValueTypeKey";
const PLURAL_RULE_TYPE: &str = "NSStringPluralRuleType";
const DOCTYPE: &str =
    r#"plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd""#;

lazy_static! {
    static ref VARIABLE_REFERENCE: Regex = Regex::new(r"%(?:\d+\$)?#@([^@]+)@").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Format {
    pub entries: Vec<StringsdictEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringsdictEntry {
    pub key: String,
    pub format_key: String,
    pub variables: Vec<PluralVariable>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluralVariable {
    pub name: String,
    pub spec_type: String,
    pub value_type: Option<String>,
    /// `(category keyword, text)` pairs in document order.
    pub forms: Vec<(String, String)>,
}

impl StringsdictEntry {
    /// Folds the format key around the single plural variable into
    /// `(category keyword, full text)` pairs. `None` when the entry has no
    /// variable, several variables, or a variable that is not a plural rule.
    pub fn folded_forms(&self) -> Option<Vec<(String, String)>> {
        let [variable] = self.variables.as_slice() else {
            return None;
        };
        if variable.spec_type != PLURAL_RULE_TYPE {
            return None;
        }
        let reference = VARIABLE_REFERENCE
            .captures_iter(&self.format_key)
            .find(|c| c[1] == variable.name)?
            .get(0)?;
        let prefix = &self.format_key[..reference.start()];
        let suffix = &self.format_key[reference.end()..];
        Some(
            variable
                .forms
                .iter()
                .map(|(keyword, text)| (keyword.clone(), format!("{}{}{}", prefix, text, suffix)))
                .collect(),
        )
    }
}

/// Subset of plist values used by stringsdict files.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PlistValue {
    String(String),
    Dict(Vec<(String, PlistValue)>),
    Other,
}

impl PlistValue {
    fn as_str(&self) -> Option<&str> {
        match self {
            PlistValue::String(s) => Some(s),
            _ => None,
        }
    }
}

fn lookup<'a>(dict: &'a [(String, PlistValue)], key: &str) -> Option<&'a PlistValue> {
    dict.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn read_text<R: BufRead>(xml_reader: &mut Reader<R>, end: &[u8]) -> Result<String, Error> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match xml_reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::End(e) if e.name().as_ref() == end => return Ok(text),
            Event::Eof => return Err(Error::DataMismatch("unexpected EOF in plist".to_string())),
            _ => {}
        }
        buf.clear();
    }
}

fn read_dict<R: BufRead>(xml_reader: &mut Reader<R>) -> Result<Vec<(String, PlistValue)>, Error> {
    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut pending_key: Option<String> = None;
    loop {
        let value = match xml_reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"key" => {
                    pending_key = Some(read_text(xml_reader, b"key")?);
                    None
                }
                b"string" => Some(PlistValue::String(read_text(xml_reader, b"string")?)),
                b"dict" => Some(PlistValue::Dict(read_dict(xml_reader)?)),
                _ => {
                    let end = e.to_end().into_owned();
                    let mut skipped = Vec::new();
                    xml_reader.read_to_end_into(end.name(), &mut skipped)?;
                    Some(PlistValue::Other)
                }
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"string" => Some(PlistValue::String(String::new())),
                b"dict" => Some(PlistValue::Dict(Vec::new())),
                _ => Some(PlistValue::Other),
            },
            Event::End(e) if e.name().as_ref() == b"dict" => return Ok(entries),
            Event::Eof => return Err(Error::DataMismatch("unexpected EOF in <dict>".to_string())),
            _ => None,
        };
        if let Some(value) = value {
            let key = pending_key
                .take()
                .ok_or_else(|| Error::DataMismatch("plist value without <key>".to_string()))?;
            entries.push((key, value));
        }
        buf.clear();
    }
}

impl Parser for Format {
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut xml_reader = Reader::from_reader(reader);
        let mut buf = Vec::new();
        let root = loop {
            match xml_reader.read_event_into(&mut buf)? {
                Event::Start(e) if e.name().as_ref() == b"dict" => break read_dict(&mut xml_reader)?,
                Event::Eof => break Vec::new(),
                _ => {}
            }
            buf.clear();
        };

        let mut entries = Vec::new();
        for (key, value) in root {
            let PlistValue::Dict(dict) = value else {
                continue;
            };
            let format_key = lookup(&dict, FORMAT_KEY)
                .and_then(PlistValue::as_str)
                .unwrap_or_default()
                .to_string();
            let variables = dict
                .iter()
                .filter_map(|(name, value)| {
                    let PlistValue::Dict(variable) = value else {
                        return None;
                    };
                    let spec_type = lookup(variable, SPEC_TYPE_KEY)?.as_str()?.to_string();
                    Some(PluralVariable {
                        name: name.clone(),
                        spec_type,
                        value_type: lookup(variable, VALUE_TYPE_KEY)
                            .and_then(PlistValue::as_str)
                            .map(str::to_string),
                        forms: variable
                            .iter()
                            .filter(|(k, _)| k != SPEC_TYPE_KEY && k != VALUE_TYPE_KEY)
                            .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                            .collect(),
                    })
                })
                .collect();
            entries.push(StringsdictEntry {
                key,
                format_key,
                variables,
            });
        }
        Ok(Format { entries })
    }

    fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        {
            let mut xml_writer = Writer::new_with_indent(&mut writer, b'\t', 1);
            xml_writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
            xml_writer.write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))?;
            let mut plist = BytesStart::new("plist");
            plist.push_attribute(("version", "1.0"));
            xml_writer.write_event(Event::Start(plist))?;
            xml_writer.write_event(Event::Start(BytesStart::new("dict")))?;
            for entry in &self.entries {
                write_element(&mut xml_writer, "key", &entry.key)?;
                xml_writer.write_event(Event::Start(BytesStart::new("dict")))?;
                write_element(&mut xml_writer, "key", FORMAT_KEY)?;
                write_element(&mut xml_writer, "string", &entry.format_key)?;
                for variable in &entry.variables {
                    write_element(&mut xml_writer, "key", &variable.name)?;
                    xml_writer.write_event(Event::Start(BytesStart::new("dict")))?;
                    write_element(&mut xml_writer, "key", SPEC_TYPE_KEY)?;
                    write_element(&mut xml_writer, "string", &variable.spec_type)?;
                    if let Some(value_type) = &variable.value_type {
                        write_element(&mut xml_writer, "key", VALUE_TYPE_KEY)?;
                        write_element(&mut xml_writer, "string", value_type)?;
                    }
                    for (keyword, text) in &variable.forms {
                        write_element(&mut xml_writer, "key", keyword)?;
                        write_element(&mut xml_writer, "string", text)?;
                    }
                    xml_writer.write_event(Event::End(BytesEnd::new("dict")))?;
                }
                xml_writer.write_event(Event::End(BytesEnd::new("dict")))?;
            }
            xml_writer.write_event(Event::End(BytesEnd::new("dict")))?;
            xml_writer.write_event(Event::End(BytesEnd::new("plist")))?;
        }
        writer.write_all(b"\n")?;
        Ok(())
    }
}

fn write_element<W: Write>(xml_writer: &mut Writer<W>, name: &str, text: &str) -> Result<(), Error> {
    xml_writer.write_event(Event::Start(BytesStart::new(name)))?;
    xml_writer.write_event(Event::Text(BytesText::new(text)))?;
    xml_writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Builds the stringsdict entry for a canonical plural, writing every
/// category the language needs plus any extra ones present.
pub(crate) fn plural_entry(key: &str, plural: &PluralMessage, language: &str) -> StringsdictEntry {
    let categories: BTreeSet<PluralCategory> = plural_rules::required_categories_for_str(language)
        .into_iter()
        .chain(plural.forms.keys().copied())
        .collect();
    let forms = categories
        .into_iter()
        .filter_map(|category| {
            let text = plural
                .forms
                .get(&category)
                .or_else(|| plural.forms.get(&PluralCategory::Other))?;
            Some((
                category.to_string(),
                placeholder::from_icu(text, PrintfDialect::Apple, true),
            ))
        })
        .collect();
    StringsdictEntry {
        key: key.to_string(),
        format_key: "%#@value@".to_string(),
        variables: vec![PluralVariable {
            name: "value".to_string(),
            spec_type: PLURAL_RULE_TYPE.to_string(),
            value_type: Some("lld".to_string()),
            forms,
        }],
    }
}

/// Converts one stringsdict entry into a canonical plural, reporting
/// entries that cannot be represented.
pub(crate) fn plural_message(
    context: &mut FileProcessorContext,
    language: &str,
    entry: &StringsdictEntry,
) -> Option<CanonicalMessage> {
    let Some(folded) = entry.folded_forms() else {
        context.add_issue(
            FileIssue::new(FileIssueKind::UnsupportedConstruct)
                .with_key(&entry.key)
                .with_language(language)
                .with_value(&entry.format_key),
        );
        return None;
    };
    let mut forms = Vec::new();
    for (keyword, text) in folded {
        match PluralCategory::from_str(&keyword) {
            Ok(category) => forms.push((NativeForm::Keyword(category), text)),
            Err(_) => context.add_issue(
                FileIssue::new(FileIssueKind::InvalidPluralForm)
                    .with_key(&entry.key)
                    .with_language(language)
                    .with_value(keyword),
            ),
        }
    }
    let message = context.printf_plural(language, forms, PrintfDialect::Apple);
    if message.is_none() {
        context.add_issue(
            FileIssue::new(FileIssueKind::InvalidPluralForm)
                .with_key(&entry.key)
                .with_language(language),
        );
    }
    message
}

pub struct StringsdictFileProcessor;

impl FileProcessor for StringsdictFileProcessor {
    fn process(&self, bytes: &[u8], context: &mut FileProcessorContext) -> Result<(), Error> {
        let format = Format::from_bytes(bytes)
            .map_err(|e| Error::cannot_parse(context.file_name(), e.to_string()))?;
        let language = context.language(None)?;
        context.touch_language(&language);
        for entry in &format.entries {
            let message = if entry.variables.is_empty() {
                Some(CanonicalMessage::Singular(context.printf_text(
                    &entry.format_key,
                    PrintfDialect::Apple,
                    false,
                )))
            } else {
                plural_message(context, &language, entry)
            };
            if let Some(message) = message {
                context.add_translation(&language, Entry::new(entry.key.clone(), message));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{formats::ImportFormat, options::ParseOptions, traits::FileProcessor};
    use indoc::indoc;

    const SAMPLE: &str = indoc! {r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
        <plist version="1.0">
        <dict>
            <key>apples_left</key>
            <dict>
                <key>NSStringLocalizedFormatKey</key>
                <string>Only %#@apples@ left</string>
                <key>apples</key>
                <dict>
                    <key>NSStringFormatSpecTypeKey</key>
                    <string>NSStringPluralRuleType</string>
                    <key>NSStringFormatValueTypeKey</key>
                    <string>d</string>
                    <key>one</key>
                    <string>%d apple</string>
                    <key>other</key>
                    <string>%d apples</string>
                </dict>
            </dict>
            <key>two_vars</key>
            <dict>
                <key>NSStringLocalizedFormatKey</key>
                <string>%#@a@ and %#@b@</string>
                <key>a</key>
                <dict>
                    <key>NSStringFormatSpecTypeKey</key>
                    <string>NSStringPluralRuleType</string>
                    <key>other</key>
                    <string>%d a</string>
                </dict>
                <key>b</key>
                <dict>
                    <key>NSStringFormatSpecTypeKey</key>
                    <string>NSStringPluralRuleType</string>
                    <key>other</key>
                    <string>%d b</string>
                </dict>
            </dict>
        </dict>
        </plist>
    "#};

    #[test]
    fn test_parse_native_model() {
        let format = Format::from_str(SAMPLE).unwrap();
        assert_eq!(format.entries.len(), 2);
        let apples = &format.entries[0];
        assert_eq!(apples.format_key, "Only %#@apples@ left");
        assert_eq!(apples.variables[0].value_type.as_deref(), Some("d"));
        assert_eq!(
            apples.folded_forms().unwrap(),
            vec![
                ("one".to_string(), "Only %d apple left".to_string()),
                ("other".to_string(), "Only %d apples left".to_string()),
            ]
        );
        assert!(format.entries[1].folded_forms().is_none());
    }

    #[test]
    fn test_process_into_canonical() {
        let options = ParseOptions::default();
        let mut context = FileProcessorContext::new("en.lproj/Localizable.stringsdict", &options);
        StringsdictFileProcessor
            .process(SAMPLE.as_bytes(), &mut context)
            .unwrap();
        let parsed = context.into_parsed(ImportFormat::AppleStringsdict);
        let resource = &parsed.resources[0];
        assert_eq!(resource.language, "en");
        assert_eq!(resource.entries.len(), 1);
        let CanonicalMessage::Plural(plural) = &resource.entries[0].message else {
            panic!("expected plural");
        };
        assert_eq!(plural.forms[&PluralCategory::One], "Only # apple left");
        assert_eq!(parsed.issues[0].kind, FileIssueKind::UnsupportedConstruct);
        assert_eq!(parsed.issues[0].key.as_deref(), Some("two_vars"));
    }

    #[test]
    fn test_plural_entry_round_trip() {
        let plural = PluralMessage::new(
            "0",
            [
                (PluralCategory::One, "# soubor".to_string()),
                (PluralCategory::Other, "# souborů".to_string()),
            ],
        )
        .unwrap();
        let format = Format {
            entries: vec![plural_entry("files", &plural, "cs")],
        };
        let text = String::from_utf8(format.to_bytes().unwrap()).unwrap();
        assert!(text.contains("<!DOCTYPE plist PUBLIC"));
        assert!(text.contains("<string>%#@value@</string>"));

        let reparsed = Format::from_str(&text).unwrap();
        assert_eq!(reparsed, format);
        let keywords: Vec<&str> = reparsed.entries[0].variables[0]
            .forms
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert!(keywords.contains(&"few"));
        assert_eq!(reparsed.entries[0].variables[0].forms[0], ("one".to_string(), "%lld soubor".to_string()));
    }
}
