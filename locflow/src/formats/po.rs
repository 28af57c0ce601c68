//! gettext PO files.
//!
//! Keys are `msgid`s; `msgctxt` is read but not part of the key. The printf
//! dialect of an entry comes from its `#,` flags (`c-format`, `php-format`,
//! `python-format`), defaulting to C.

use std::{
    collections::BTreeMap,
    io::{BufRead, Write},
};

use crate::{
    error::Error,
    formats::{ExportedFile, FileIssue, FileIssueKind, FileProcessorContext, decode_text},
    placeholder::{self, PrintfDialect},
    plural_rules::{self, NativeForm},
    traits::{FileExporter, FileProcessor, Parser},
    types::{CanonicalMessage, Entry, PluralCategory, Resource},
};

/// A parsed PO file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Format {
    /// Header fields from the `msgid ""` entry, keyed by lowercase name.
    pub header: BTreeMap<String, String>,
    pub entries: Vec<PoEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoEntry {
    pub msgctxt: Option<String>,
    pub msgid: String,
    pub msgid_plural: Option<String>,
    /// `msgstr` or `msgstr[n]` values by index.
    pub msgstr: BTreeMap<usize, String>,
    pub extracted_comments: Vec<String>,
    pub translator_comments: Vec<String>,
    pub references: Vec<String>,
    pub flags: Vec<String>,
    /// One-based line of the `msgid`.
    pub line: usize,
}

impl PoEntry {
    pub fn dialect(&self) -> PrintfDialect {
        for flag in &self.flags {
            match flag.as_str() {
                "php-format" => return PrintfDialect::Php,
                "python-format" => return PrintfDialect::Python,
                "c-format" => return PrintfDialect::C,
                _ => {}
            }
        }
        PrintfDialect::C
    }

    fn is_header(&self) -> bool {
        self.msgid.is_empty() && self.msgctxt.is_none()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Msgctxt,
    Msgid,
    MsgidPlural,
    Msgstr(usize),
}

struct EntryBuilder {
    entry: PoEntry,
    field: Option<Field>,
    has_msgid: bool,
    has_msgstr: bool,
}

impl EntryBuilder {
    fn new() -> Self {
        Self {
            entry: PoEntry::default(),
            field: None,
            has_msgid: false,
            has_msgstr: false,
        }
    }

    fn append(&mut self, text: &str) {
        let target = match self.field {
            Some(Field::Msgctxt) => self.entry.msgctxt.get_or_insert_with(String::new),
            Some(Field::Msgid) => &mut self.entry.msgid,
            Some(Field::MsgidPlural) => self.entry.msgid_plural.get_or_insert_with(String::new),
            Some(Field::Msgstr(index)) => self.entry.msgstr.entry(index).or_default(),
            None => return,
        };
        target.push_str(text);
    }

    fn is_empty(&self) -> bool {
        !self.has_msgid
            && self.entry.msgctxt.is_none()
            && self.entry.extracted_comments.is_empty()
            && self.entry.flags.is_empty()
    }
}

impl Parser for Format {
    fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut format = Format::default();
        let mut builder = EntryBuilder::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = index + 1;
            let trimmed = line.trim();

            if trimmed.is_empty() {
                finish_entry(&mut format, &mut builder);
                continue;
            }
            if trimmed.starts_with("#~") {
                // Obsolete entries are dropped.
                continue;
            }
            if let Some(comment) = trimmed.strip_prefix('#') {
                if builder.has_msgstr {
                    finish_entry(&mut format, &mut builder);
                }
                if let Some(text) = comment.strip_prefix('.') {
                    builder.entry.extracted_comments.push(text.trim().to_string());
                } else if let Some(text) = comment.strip_prefix(',') {
                    builder
                        .entry
                        .flags
                        .extend(text.split(',').map(|f| f.trim().to_string()).filter(|f| !f.is_empty()));
                } else if let Some(text) = comment.strip_prefix(':') {
                    builder.entry.references.push(text.trim().to_string());
                } else if !comment.starts_with('|') {
                    builder.entry.translator_comments.push(comment.trim().to_string());
                }
                continue;
            }

            if trimmed.starts_with('"') {
                builder.append(&parse_quoted(trimmed, line_number)?);
                continue;
            }

            let (keyword, rest) = trimmed
                .split_once(char::is_whitespace)
                .ok_or_else(|| Error::DataMismatch(format!("line {}: unexpected `{}`", line_number, trimmed)))?;
            let value = parse_quoted(rest.trim(), line_number)?;
            let field = match keyword {
                "msgctxt" => Field::Msgctxt,
                "msgid" => Field::Msgid,
                "msgid_plural" => Field::MsgidPlural,
                "msgstr" => Field::Msgstr(0),
                other => {
                    let index = other
                        .strip_prefix("msgstr[")
                        .and_then(|s| s.strip_suffix(']'))
                        .and_then(|s| s.parse::<usize>().ok())
                        .ok_or_else(|| {
                            Error::DataMismatch(format!("line {}: unknown keyword `{}`", line_number, other))
                        })?;
                    Field::Msgstr(index)
                }
            };

            let starts_entry = matches!(field, Field::Msgctxt | Field::Msgid);
            if starts_entry && builder.has_msgstr {
                finish_entry(&mut format, &mut builder);
            }
            match field {
                Field::Msgid => {
                    builder.has_msgid = true;
                    builder.entry.line = line_number;
                }
                Field::Msgstr(_) => builder.has_msgstr = true,
                _ => {}
            }
            builder.field = Some(field);
            builder.append(&value);
        }
        finish_entry(&mut format, &mut builder);
        Ok(format)
    }

    fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        let mut out = String::from("msgid \"\"\nmsgstr \"\"\n");
        for (name, value) in &self.header {
            out.push_str(&format!("\"{}: {}\\n\"\n", header_name(name), escape_c(value)));
        }
        for entry in &self.entries {
            out.push('\n');
            for comment in &entry.extracted_comments {
                out.push_str(&format!("#. {}\n", comment));
            }
            for reference in &entry.references {
                out.push_str(&format!("#: {}\n", reference));
            }
            if !entry.flags.is_empty() {
                out.push_str(&format!("#, {}\n", entry.flags.join(", ")));
            }
            if let Some(context) = &entry.msgctxt {
                write_field(&mut out, "msgctxt", context);
            }
            write_field(&mut out, "msgid", &entry.msgid);
            match &entry.msgid_plural {
                Some(plural) => {
                    write_field(&mut out, "msgid_plural", plural);
                    for (index, text) in &entry.msgstr {
                        write_field(&mut out, &format!("msgstr[{}]", index), text);
                    }
                }
                None => {
                    let text = entry.msgstr.get(&0).map(String::as_str).unwrap_or_default();
                    write_field(&mut out, "msgstr", text);
                }
            }
        }
        writer.write_all(out.as_bytes()).map_err(Error::Io)
    }
}

fn finish_entry(format: &mut Format, builder: &mut EntryBuilder) {
    let finished = std::mem::replace(builder, EntryBuilder::new());
    if finished.is_empty() {
        return;
    }
    let entry = finished.entry;
    if entry.is_header() && format.entries.is_empty() && format.header.is_empty() {
        let text = entry.msgstr.get(&0).cloned().unwrap_or_default();
        for line in text.lines() {
            if let Some((name, value)) = line.split_once(':') {
                format
                    .header
                    .insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }
        return;
    }
    format.entries.push(entry);
}

fn header_name(lowercase: &str) -> String {
    lowercase
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn parse_quoted(text: &str, line: usize) -> Result<String, Error> {
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .ok_or_else(|| Error::DataMismatch(format!("line {}: expected a quoted string", line)))?;
    Ok(unescape_c(inner))
}

fn unescape_c(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('a') => out.push('\u{07}'),
            Some('b') => out.push('\u{08}'),
            Some('f') => out.push('\u{0C}'),
            Some('v') => out.push('\u{0B}'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn escape_c(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn write_field(out: &mut String, keyword: &str, value: &str) {
    let has_inner_newline = value.trim_end_matches('\n').contains('\n');
    if !has_inner_newline {
        out.push_str(&format!("{} \"{}\"\n", keyword, escape_c(value)));
        return;
    }
    out.push_str(&format!("{} \"\"\n", keyword));
    for line in value.split_inclusive('\n') {
        out.push_str(&format!("\"{}\"\n", escape_c(line)));
    }
}

pub struct PoFileProcessor;

impl FileProcessor for PoFileProcessor {
    fn process(&self, bytes: &[u8], context: &mut FileProcessorContext) -> Result<(), Error> {
        let format = Format::from_str(&decode_text(bytes))
            .map_err(|e| Error::cannot_parse(context.file_name(), e.to_string()))?;
        let language = context.language(format.header.get("language").map(String::as_str))?;
        context.touch_language(&language);
        let header_nplurals = format
            .header
            .get("plural-forms")
            .and_then(|forms| parse_nplurals(forms));

        for entry in &format.entries {
            if entry.msgstr.values().all(|text| text.is_empty()) {
                continue;
            }
            let dialect = entry.dialect();
            let description = (!entry.extracted_comments.is_empty())
                .then(|| entry.extracted_comments.join("\n"));

            let message = if entry.msgid_plural.is_some() {
                if let Some(nplurals) = header_nplurals
                    && entry.msgstr.len() > nplurals
                {
                    context.add_issue(
                        FileIssue::new(FileIssueKind::InvalidPluralForm)
                            .with_key(&entry.msgid)
                            .with_language(&language)
                            .with_line(entry.line),
                    );
                }
                let forms = entry
                    .msgstr
                    .iter()
                    .filter(|(_, text)| !text.is_empty())
                    .map(|(index, text)| (NativeForm::Index(*index), text.clone()));
                match context.printf_plural(&language, forms, dialect) {
                    Some(message) => message,
                    None => {
                        context.add_issue(
                            FileIssue::new(FileIssueKind::InvalidPluralForm)
                                .with_key(&entry.msgid)
                                .with_language(&language)
                                .with_line(entry.line),
                        );
                        continue;
                    }
                }
            } else {
                let text = entry.msgstr.get(&0).map(String::as_str).unwrap_or_default();
                CanonicalMessage::Singular(context.printf_text(text, dialect, false))
            };

            context.add_translation(
                &language,
                Entry::new(entry.msgid.clone(), message).with_description(description),
            );
        }
        Ok(())
    }
}

fn parse_nplurals(plural_forms: &str) -> Option<usize> {
    plural_forms
        .split(';')
        .find_map(|part| part.trim().strip_prefix("nplurals="))
        .and_then(|n| n.trim().parse().ok())
}

pub struct PoFileExporter {
    pub dialect: PrintfDialect,
}

impl PoFileExporter {
    fn flag(&self) -> &'static str {
        match self.dialect {
            PrintfDialect::Php => "php-format",
            PrintfDialect::Python => "python-format",
            _ => "c-format",
        }
    }

    fn to_po_entry(&self, language: &str, entry: &Entry) -> PoEntry {
        let mut msgstr = BTreeMap::new();
        let mut msgid_plural = None;
        match &entry.message {
            CanonicalMessage::Singular(text) => {
                msgstr.insert(0, placeholder::from_icu(text, self.dialect, false));
            }
            CanonicalMessage::Plural(plural) => {
                msgid_plural = Some(entry.key.clone());
                for index in 0..plural_rules::nplurals(language) {
                    let category = plural_rules::category_for_index(language, index);
                    let text = plural
                        .forms
                        .get(&category)
                        .or_else(|| plural.forms.get(&PluralCategory::Other))
                        .map(String::as_str)
                        .unwrap_or_default();
                    msgstr.insert(index, placeholder::from_icu(text, self.dialect, true));
                }
            }
        }

        let has_placeholders = msgstr
            .values()
            .any(|text| !placeholder::signature(text, self.dialect).is_empty());
        PoEntry {
            msgid: entry.key.clone(),
            msgid_plural,
            msgstr,
            extracted_comments: entry
                .description
                .iter()
                .flat_map(|d| d.lines().map(str::to_string))
                .collect(),
            flags: if has_placeholders {
                vec![self.flag().to_string()]
            } else {
                Vec::new()
            },
            ..PoEntry::default()
        }
    }
}

impl FileExporter for PoFileExporter {
    fn export_resource(
        &self,
        resource: &Resource,
        _base: Option<&Resource>,
    ) -> Result<Vec<ExportedFile>, Error> {
        let language = &resource.language;
        let mut header = BTreeMap::new();
        header.insert("language".to_string(), language.clone());
        header.insert("mime-version".to_string(), "1.0".to_string());
        header.insert(
            "content-type".to_string(),
            "text/plain; charset=UTF-8".to_string(),
        );
        header.insert("content-transfer-encoding".to_string(), "8bit".to_string());
        header.insert(
            "plural-forms".to_string(),
            plural_rules::plural_forms_header(language),
        );
        header.insert("x-generator".to_string(), "locflow".to_string());

        let format = Format {
            header,
            entries: resource
                .entries
                .iter()
                .map(|entry| self.to_po_entry(language, entry))
                .collect(),
        };
        Ok(vec![ExportedFile::new(
            format!("{}.po", language),
            format.to_bytes()?,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{formats::ImportFormat, options::ParseOptions, types::PluralMessage};
    use indoc::indoc;

    const CS_PO: &str = indoc! {r#"
        msgid ""
        msgstr ""
        "Language: cs\n"
        "Plural-Forms: nplurals=3; plural=(n==1) ? 0 : (n>=2 && n<=4) ? 1 : 2;\n"

        #. Shown on the home screen
        #, c-format
        msgid "welcome"
        msgstr "Vítejte, %s!"

        msgctxt "menu"
        msgid "files"
        msgid_plural "files"
        msgstr[0] "%d soubor"
        msgstr[1] "%d soubory"
        msgstr[2] "%d souborů"

        msgid "multi"
        msgstr ""
        "first line\n"
        "second \"quoted\""

        msgid "untranslated"
        msgstr ""

        #, python-format
        msgid "python"
        msgstr "Ahoj %(name)s"
    "#};

    #[test]
    fn test_parse_native_model() {
        let format = Format::from_str(CS_PO).unwrap();
        assert_eq!(format.header.get("language").unwrap(), "cs");
        assert_eq!(format.entries.len(), 5);
        let files = &format.entries[1];
        assert_eq!(files.msgctxt.as_deref(), Some("menu"));
        assert_eq!(files.msgstr.len(), 3);
        assert_eq!(format.entries[2].msgstr[&0], "first line\nsecond \"quoted\"");
        assert_eq!(format.entries[4].dialect(), PrintfDialect::Python);
    }

    #[test]
    fn test_process_into_canonical() {
        let options = ParseOptions::default();
        let mut context = FileProcessorContext::new("messages.po", &options);
        PoFileProcessor.process(CS_PO.as_bytes(), &mut context).unwrap();
        let parsed = context.into_parsed(ImportFormat::Po);
        let resource = &parsed.resources[0];
        assert_eq!(resource.language, "cs");
        assert_eq!(resource.entries.len(), 4);

        let welcome = resource.find_entry("welcome").unwrap();
        assert_eq!(welcome.message, CanonicalMessage::Singular("Vítejte, {0}!".to_string()));
        assert_eq!(welcome.description.as_deref(), Some("Shown on the home screen"));

        let CanonicalMessage::Plural(files) = &resource.find_entry("files").unwrap().message else {
            panic!("expected plural");
        };
        assert_eq!(files.argument, "0");
        assert_eq!(files.forms[&PluralCategory::Few], "# soubory");

        assert_eq!(
            resource.find_entry("python").unwrap().message,
            CanonicalMessage::Singular("Ahoj {name}".to_string())
        );
        assert!(resource.find_entry("untranslated").is_none());
    }

    #[test]
    fn test_unknown_keyword_is_error() {
        assert!(Format::from_str("msgfoo \"x\"\n").is_err());
        assert!(Format::from_str("msgid unquoted\n").is_err());
    }

    #[test]
    fn test_export_plural_and_header() {
        let mut resource = Resource::new("cs");
        resource.add_entry(
            Entry::new(
                "files",
                CanonicalMessage::Plural(
                    PluralMessage::new(
                        "0",
                        [
                            (PluralCategory::One, "# soubor".to_string()),
                            (PluralCategory::Few, "# soubory".to_string()),
                            (PluralCategory::Other, "# souborů".to_string()),
                        ],
                    )
                    .unwrap(),
                ),
            )
            .with_description(Some("Count of files".to_string())),
        );
        resource.add_entry(Entry::new(
            "plain",
            CanonicalMessage::Singular("No placeholders".to_string()),
        ));

        let files = PoFileExporter {
            dialect: PrintfDialect::C,
        }
        .export_resource(&resource, None)
        .unwrap();
        assert_eq!(files[0].path, "cs.po");
        let text = String::from_utf8(files[0].bytes.clone()).unwrap();
        assert!(text.contains("\"Plural-Forms: nplurals=3; plural=(n==1) ? 0 : (n>=2 && n<=4) ? 1 : 2;\\n\""));
        assert!(text.contains(indoc! {r#"
            #. Count of files
            #, c-format
            msgid "files"
            msgid_plural "files"
            msgstr[0] "%d soubor"
            msgstr[1] "%d soubory"
            msgstr[2] "%d souborů"
        "#}));
        assert!(text.contains("msgid \"plain\"\nmsgstr \"No placeholders\"\n"));

        let reparsed = Format::from_str(&text).unwrap();
        assert_eq!(reparsed.header.get("language").unwrap(), "cs");
        assert_eq!(reparsed.entries.len(), 2);
    }

    #[test]
    fn test_export_dialects() {
        let mut resource = Resource::new("en");
        resource.add_entry(Entry::new(
            "greet",
            CanonicalMessage::Singular("Hi {name}, {0}".to_string()),
        ));
        let export = |dialect| {
            let files = PoFileExporter { dialect }.export_resource(&resource, None).unwrap();
            String::from_utf8(files[0].bytes.clone()).unwrap()
        };
        assert!(export(PrintfDialect::Python).contains("#, python-format\nmsgid \"greet\"\nmsgstr \"Hi %(name)s, %s\""));
        assert!(export(PrintfDialect::Php).contains("#, php-format\nmsgid \"greet\"\nmsgstr \"Hi %s, %s\""));
    }
}
