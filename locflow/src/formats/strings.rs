//! Support for Apple `.strings` localization format.
//!
//! The file is a list of `"key" = "value";` statements. A comment directly
//! preceding a statement is attached to it. UTF-16 files with a BOM are
//! decoded transparently.

use std::{
    fmt::{Display, Formatter},
    io::{BufRead, Read, Write},
};

use crate::{
    error::Error,
    formats::{ExportedFile, FileProcessorContext, decode_text, stringsdict},
    placeholder::{self, PrintfDialect},
    traits::{FileExporter, FileProcessor, Parser},
    types::{CanonicalMessage, Entry, Resource},
};

/// The comment Xcode writes when a developer gave none.
const XCODE_EMPTY_COMMENT: &str = "No comment provided by engineer.";

/// Represents an Apple `.strings` localization file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Format {
    /// All key-value pairs (and optional comments) in the file.
    pub pairs: Vec<Pair>,
}

/// A single key-value pair in a `.strings` file, possibly with an associated comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    /// The key, unescaped.
    pub key: String,
    /// The value, unescaped.
    pub value: String,
    /// The comment directly preceding the pair, including its `/* */` or
    /// `//` marker. Trailing comments on the same line belong to the next pair.
    pub comment: Option<String>,
    /// One-based line of the key.
    pub line: usize,
}

impl Pair {
    /// Returns the comment without the comment marker.
    pub fn formatted_comment(&self) -> Option<String> {
        let comment = self.comment.as_deref()?;
        let text = if let Some(block) = comment.strip_prefix("/*").and_then(|c| c.strip_suffix("*/")) {
            block.trim()
        } else if let Some(line) = comment.strip_prefix("//") {
            line.trim()
        } else {
            comment.trim()
        };
        (!text.is_empty() && text != XCODE_EMPTY_COMMENT).then(|| text.to_string())
    }
}

impl Display for Pair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(comment) = &self.comment {
            writeln!(f, "{}", comment)?;
        }
        write!(f, "\"{}\" = \"{}\";", escape(&self.key), escape(&self.value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(String),
    Equals,
    Semicolon,
    Comment(String),
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = *self.chars.get(self.pos)?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    /// Returns the next token together with the line it starts on.
    fn next_token(&mut self) -> Result<Option<(Token, usize)>, Error> {
        while self.peek_at(0).is_some_and(char::is_whitespace) {
            self.bump();
        }
        let line = self.line;
        let Some(c) = self.peek_at(0) else {
            return Ok(None);
        };
        let token = match c {
            '=' => {
                self.bump();
                Token::Equals
            }
            ';' => {
                self.bump();
                Token::Semicolon
            }
            '/' if self.peek_at(1) == Some('*') => {
                let start = self.pos;
                self.pos += 2;
                loop {
                    match (self.peek_at(0), self.peek_at(1)) {
                        (Some('*'), Some('/')) => {
                            self.pos += 2;
                            break;
                        }
                        (Some(_), _) => {
                            self.bump();
                        }
                        (None, _) => {
                            return Err(Error::DataMismatch(format!(
                                "line {}: unterminated comment",
                                line
                            )));
                        }
                    }
                }
                Token::Comment(self.chars[start..self.pos].iter().collect())
            }
            '/' if self.peek_at(1) == Some('/') => {
                let start = self.pos;
                while self.peek_at(0).is_some_and(|c| c != '\n') {
                    self.bump();
                }
                Token::Comment(self.chars[start..self.pos].iter().collect::<String>().trim_end().to_string())
            }
            '"' => {
                self.bump();
                Token::Text(self.quoted(line)?)
            }
            _ => {
                let mut bare = String::new();
                while let Some(c) = self.peek_at(0) {
                    if c.is_whitespace() || matches!(c, '=' | ';' | '"') {
                        break;
                    }
                    bare.push(c);
                    self.bump();
                }
                Token::Text(bare)
            }
        };
        Ok(Some((token, line)))
    }

    fn quoted(&mut self, line: usize) -> Result<String, Error> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    Some('u' | 'U') => {
                        let hex: String = (0..4).filter_map(|_| self.bump()).collect();
                        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                            Some(decoded) => out.push(decoded),
                            None => out.push_str(&hex),
                        }
                    }
                    Some(other) => out.push(other),
                    None => break,
                },
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err(Error::DataMismatch(format!("line {}: unterminated string", line)))
    }
}

impl Parser for Format {
    fn from_reader<R: BufRead>(mut reader: R) -> Result<Self, Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let mut lexer = Lexer::new(&decode_text(&bytes));

        let mut pairs = Vec::new();
        let mut comment: Option<String> = None;
        // Tokens of the statement being assembled: key, `=`, value.
        let mut statement: Vec<(Token, usize)> = Vec::new();

        while let Some((token, line)) = lexer.next_token()? {
            match token {
                Token::Comment(text) => {
                    statement.clear();
                    comment = Some(text);
                }
                Token::Semicolon => {
                    match statement.as_slice() {
                        [(Token::Text(key), line)] => pairs.push(Pair {
                            key: key.clone(),
                            value: key.clone(),
                            comment: comment.take(),
                            line: *line,
                        }),
                        [(Token::Text(key), line), (Token::Equals, _), (Token::Text(value), _)] => {
                            pairs.push(Pair {
                                key: key.clone(),
                                value: value.clone(),
                                comment: comment.take(),
                                line: *line,
                            })
                        }
                        _ => comment = None,
                    }
                    statement.clear();
                }
                token => {
                    let expected = match statement.len() {
                        0 | 2 => matches!(token, Token::Text(_)),
                        1 => token == Token::Equals,
                        _ => false,
                    };
                    if !expected {
                        // Resynchronize: a malformed statement is dropped and the
                        // token may start a new one.
                        statement.clear();
                        comment = None;
                        if !matches!(token, Token::Text(_)) {
                            continue;
                        }
                    }
                    statement.push((token, line));
                }
            }
        }
        Ok(Format { pairs })
    }

    fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        let content = self
            .pairs
            .iter()
            .map(|pair| pair.to_string())
            .collect::<Vec<_>>()
            .join("\n\n");
        writer.write_all(content.as_bytes())?;
        writer.write_all(b"\n").map_err(Error::Io)
    }
}

fn escape(text: &str) -> String {
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

pub struct StringsFileProcessor;

impl FileProcessor for StringsFileProcessor {
    fn process(&self, bytes: &[u8], context: &mut FileProcessorContext) -> Result<(), Error> {
        let format = Format::from_bytes(bytes)
            .map_err(|e| Error::cannot_parse(context.file_name(), e.to_string()))?;
        let language = context.language(None)?;
        context.touch_language(&language);
        for pair in &format.pairs {
            let message = CanonicalMessage::Singular(context.printf_text(&pair.value, PrintfDialect::Apple, false));
            context.add_translation(
                &language,
                Entry::new(pair.key.clone(), message).with_description(pair.formatted_comment()),
            );
        }
        Ok(())
    }
}

/// Exports singular entries to `Localizable.strings` and plurals to
/// `Localizable.stringsdict`, both under `{language}.lproj/`.
pub struct StringsStringsdictExporter;

impl FileExporter for StringsStringsdictExporter {
    fn export_resource(
        &self,
        resource: &Resource,
        _base: Option<&Resource>,
    ) -> Result<Vec<ExportedFile>, Error> {
        let mut strings = Format::default();
        let mut dict = stringsdict::Format::default();
        for entry in &resource.entries {
            match &entry.message {
                CanonicalMessage::Singular(text) => strings.pairs.push(Pair {
                    key: entry.key.clone(),
                    value: placeholder::from_icu(text, PrintfDialect::Apple, false),
                    comment: entry.description.as_ref().map(|d| format!("/* {} */", d.replace("*/", "* /"))),
                    line: 0,
                }),
                CanonicalMessage::Plural(plural) => dict
                    .entries
                    .push(stringsdict::plural_entry(&entry.key, plural, &resource.language)),
            }
        }

        let directory = format!("{}.lproj", resource.language);
        let mut files = vec![ExportedFile::new(
            format!("{}/Localizable.strings", directory),
            strings.to_bytes()?,
        )];
        if !dict.entries.is_empty() {
            files.push(ExportedFile::new(
                format!("{}/Localizable.stringsdict", directory),
                dict.to_bytes()?,
            ));
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        formats::ImportFormat,
        options::ParseOptions,
        types::{PluralCategory, PluralMessage},
    };
    use indoc::indoc;

    #[test]
    fn test_parse_basic_strings_with_comment() {
        let content = r#"
        /* Greeting for the user */
        "hello" = "Hello, world!";
        "#;
        let parsed = Format::from_str(content).unwrap();
        assert_eq!(parsed.pairs.len(), 1);
        let pair = &parsed.pairs[0];
        assert_eq!(pair.key, "hello");
        assert_eq!(pair.value, "Hello, world!");
        assert_eq!(pair.line, 3);
        assert_eq!(pair.formatted_comment().as_deref(), Some("Greeting for the user"));
    }

    #[test]
    fn test_escapes_and_multiline_values() {
        let content = indoc! {r#"
            "quote" = "Say \"hi\"\n\tnow \U00e9";
            "multiline" = "line 1
            line 2";
            greeting = "Unquoted key";
            "same";
        "#};
        let parsed = Format::from_str(content).unwrap();
        let values: Vec<(&str, &str)> = parsed
            .pairs
            .iter()
            .map(|p| (p.key.as_str(), p.value.as_str()))
            .collect();
        assert_eq!(
            values,
            vec![
                ("quote", "Say \"hi\"\n\tnow é"),
                ("multiline", "line 1\nline 2"),
                ("greeting", "Unquoted key"),
                ("same", "same"),
            ]
        );
    }

    #[test]
    fn test_blank_lines_and_ignored_malformed_statements() {
        let content = r#"

        // Comment

        "good" = "yes";
        bad line without equals
        "another" = "ok"; "inline" = "two";

        "#;
        let parsed = Format::from_str(content).unwrap();
        let keys: Vec<&str> = parsed.pairs.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["good", "another", "inline"]);
        assert_eq!(parsed.pairs[0].formatted_comment().as_deref(), Some("Comment"));
        assert!(parsed.pairs[1].comment.is_none());
    }

    #[test]
    fn test_unterminated_string_is_error() {
        assert!(Format::from_str(r#""key" = "value;"#).is_err());
    }

    #[test]
    fn test_utf16_with_bom() {
        let bytes: Vec<u8> = [0xFF, 0xFE]
            .into_iter()
            .chain("\"a\" = \"%@ b\";".encode_utf16().flat_map(|u| u.to_le_bytes()))
            .collect();
        let options = ParseOptions::default();
        let mut context = FileProcessorContext::new("fr.lproj/Localizable.strings", &options);
        StringsFileProcessor.process(&bytes, &mut context).unwrap();
        let parsed = context.into_parsed(ImportFormat::AppleStrings);
        assert_eq!(parsed.resources[0].language, "fr");
        assert_eq!(
            parsed.resources[0].entries[0].message,
            CanonicalMessage::Singular("{0} b".to_string())
        );
    }

    #[test]
    fn test_xcode_placeholder_comment_is_dropped() {
        let parsed = Format::from_str("/* No comment provided by engineer. */\n\"a\" = \"b\";").unwrap();
        assert!(parsed.pairs[0].formatted_comment().is_none());
    }

    #[test]
    fn test_export_strings_and_stringsdict() {
        let mut resource = Resource::new("en");
        resource.add_entry(
            Entry::new(
                "greeting",
                CanonicalMessage::Singular("Hello {0}, \"{1, number}\"".to_string()),
            )
            .with_description(Some("Greeting".to_string())),
        );
        resource.add_entry(Entry::new(
            "apples",
            CanonicalMessage::Plural(
                PluralMessage::new(
                    "0",
                    [
                        (PluralCategory::One, "# apple".to_string()),
                        (PluralCategory::Other, "# apples".to_string()),
                    ],
                )
                .unwrap(),
            ),
        ));

        let files = StringsStringsdictExporter
            .export_resource(&resource, None)
            .unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "en.lproj/Localizable.strings");
        assert_eq!(
            String::from_utf8(files[0].bytes.clone()).unwrap(),
            "/* Greeting */\n\"greeting\" = \"Hello %@, \\\"%lld\\\"\";\n"
        );
        assert_eq!(files[1].path, "en.lproj/Localizable.stringsdict");
        let dict = stringsdict::Format::from_bytes(&files[1].bytes).unwrap();
        assert_eq!(dict.entries[0].key, "apples");
    }
}
