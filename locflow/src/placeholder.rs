//! Conversion between printf-style placeholders and ICU arguments.
//!
//! printf arguments become positional ICU arguments named by their zero-based
//! index: `%s` is `{0}`, `%d` is `{0, number}`, `%.2f` is
//! `{0, number, .00}` and `%e` is `{0, number, scientific}`. Inside a plural
//! branch the integer placeholder of the plural argument becomes `#`.
//! Specifiers without an ICU counterpart (`%x`, widths, flags) are kept as
//! literal text.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::icu::{self, IcuNode};

/// Maximum number of fraction digits carried into ICU number styles.
pub const MAX_PRECISION: usize = 50;

const DEFAULT_FLOAT_PRECISION: usize = 6;

/// The printf flavour used by a native format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintfDialect {
    #[default]
    C,
    Php,
    Python,
    /// `java.util.Formatter`, used by Android resources.
    Java,
    /// Foundation format strings (`%@`, `%lld`).
    Apple,
}

impl PrintfDialect {
    fn supports_positional(&self) -> bool {
        !matches!(self, PrintfDialect::Python)
    }

    fn string_conversion(&self) -> &'static str {
        match self {
            PrintfDialect::Apple => "@",
            _ => "s",
        }
    }

    fn integer_conversion(&self) -> &'static str {
        match self {
            PrintfDialect::Apple => "lld",
            _ => "d",
        }
    }
}

impl Display for PrintfDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PrintfDialect::C => "c",
            PrintfDialect::Php => "php",
            PrintfDialect::Python => "python",
            PrintfDialect::Java => "java",
            PrintfDialect::Apple => "apple",
        };
        f.write_str(name)
    }
}

impl FromStr for PrintfDialect {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "c-format" => Ok(PrintfDialect::C),
            "php" | "php-format" => Ok(PrintfDialect::Php),
            "python" | "python-format" => Ok(PrintfDialect::Python),
            "java" | "android" => Ok(PrintfDialect::Java),
            "apple" | "ios" => Ok(PrintfDialect::Apple),
            other => Err(crate::error::Error::UnknownFormat(other.to_string())),
        }
    }
}

/// One parsed printf conversion specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderToken {
    /// One-based `n$` position, if given.
    pub position: Option<usize>,
    /// Python `%(name)s` mapping key.
    pub name: Option<String>,
    pub flags: String,
    pub width: Option<String>,
    pub precision: Option<usize>,
    pub length: String,
    pub conversion: char,
    /// The specification exactly as written.
    pub raw: String,
}

impl PlaceholderToken {
    pub fn to_signature(&self) -> String {
        match self.position {
            Some(i) => format!("{}${}", i, self.conversion),
            None => format!("{}", self.conversion),
        }
    }

    fn is_plain(&self) -> bool {
        self.flags.is_empty() && self.width.is_none()
    }
}

/// A piece of printf text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Placeholder(PlaceholderToken),
}

const LENGTH_MODIFIERS: [&str; 9] = ["hh", "ll", "h", "l", "q", "L", "z", "j", "t"];

/// Splits printf text into literal text and conversion specifications.
/// `%%` becomes a literal `%`; a `%` that starts no valid specification is
/// kept as text.
pub fn tokenize(input: &str, dialect: PrintfDialect) -> Vec<Segment> {
    let chars: Vec<char> = input.chars().collect();
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '%' {
            text.push(chars[i]);
            i += 1;
            continue;
        }
        if chars.get(i + 1) == Some(&'%') {
            text.push('%');
            i += 2;
            continue;
        }
        match parse_spec(&chars, i, dialect) {
            Some((token, next)) => {
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Placeholder(token));
                i = next;
            }
            None => {
                text.push('%');
                i += 1;
            }
        }
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    segments
}

fn parse_spec(chars: &[char], start: usize, dialect: PrintfDialect) -> Option<(PlaceholderToken, usize)> {
    let mut j = start + 1;

    let mut name = None;
    if dialect == PrintfDialect::Python && chars.get(j) == Some(&'(') {
        let close = chars[j..].iter().position(|c| *c == ')')? + j;
        name = Some(chars[j + 1..close].iter().collect::<String>());
        j = close + 1;
    }

    let mut position = None;
    if name.is_none() && dialect.supports_positional() {
        let digits_end = chars[j..]
            .iter()
            .position(|c| !c.is_ascii_digit())
            .map_or(chars.len(), |p| p + j);
        if digits_end > j && chars.get(digits_end) == Some(&'$') {
            let digits: String = chars[j..digits_end].iter().collect();
            position = Some(digits.parse::<usize>().ok().filter(|p| *p > 0)?);
            j = digits_end + 1;
        }
    }

    let mut flags = String::new();
    while let Some(c) = chars.get(j).filter(|c| "-+ #0'".contains(**c)) {
        flags.push(*c);
        j += 1;
    }

    let mut width = String::new();
    while let Some(c) = chars.get(j).filter(|c| c.is_ascii_digit() || **c == '*') {
        width.push(*c);
        j += 1;
    }

    let mut precision = None;
    if chars.get(j) == Some(&'.') {
        j += 1;
        // Saturates, so an absurd precision still ends up at the cap.
        let mut value = 0usize;
        while let Some(digit) = chars.get(j).and_then(|c| c.to_digit(10)) {
            value = value.saturating_mul(10).saturating_add(digit as usize);
            j += 1;
        }
        precision = Some(value);
    }

    let mut length = String::new();
    if dialect != PrintfDialect::Python {
        let rest: String = chars[j..chars.len().min(j + 2)].iter().collect();
        if let Some(modifier) = LENGTH_MODIFIERS.iter().find(|m| rest.starts_with(**m)) {
            length.push_str(modifier);
            j += modifier.len();
        }
    }

    let conversion = *chars.get(j)?;
    let valid = conversion.is_ascii_alphabetic()
        || (conversion == '@' && dialect == PrintfDialect::Apple);
    if !valid {
        return None;
    }
    j += 1;

    Some((
        PlaceholderToken {
            position,
            name,
            flags,
            width: (!width.is_empty()).then_some(width),
            precision,
            length,
            conversion,
            raw: chars[start..j].iter().collect(),
        },
        j,
    ))
}

/// Converts printf text into canonical ICU text.
///
/// `in_plural` marks a plural branch: `#` is escaped there and the integer
/// placeholder of argument `0` becomes `#`.
pub fn to_icu(input: &str, dialect: PrintfDialect, in_plural: bool) -> String {
    let mut nodes: Vec<IcuNode> = Vec::new();
    let mut next_index = 0usize;

    for segment in tokenize(input, dialect) {
        match segment {
            Segment::Text(text) => push_text(&mut nodes, &text),
            Segment::Placeholder(token) => {
                let argument = match (&token.name, token.position) {
                    (Some(name), _) => name.clone(),
                    (None, Some(position)) => (position - 1).to_string(),
                    (None, None) => {
                        next_index += 1;
                        (next_index - 1).to_string()
                    }
                };
                match placeholder_node(&token, argument, in_plural) {
                    Some(node) => nodes.push(node),
                    None => push_text(&mut nodes, &token.raw),
                }
            }
        }
    }
    icu::render(&nodes, in_plural)
}

fn push_text(nodes: &mut Vec<IcuNode>, text: &str) {
    if let Some(IcuNode::Text(previous)) = nodes.last_mut() {
        previous.push_str(text);
    } else {
        nodes.push(IcuNode::Text(text.to_string()));
    }
}

fn placeholder_node(token: &PlaceholderToken, argument: String, in_plural: bool) -> Option<IcuNode> {
    if !token.is_plain() {
        return None;
    }
    let number = |style: Option<String>| IcuNode::Argument {
        name: argument.clone(),
        format: Some("number".to_string()),
        style,
    };
    match (token.conversion, token.precision) {
        ('s' | '@', None) => Some(IcuNode::Argument {
            name: argument.clone(),
            format: None,
            style: None,
        }),
        ('d' | 'i' | 'u', None) => {
            if in_plural && argument == "0" {
                Some(IcuNode::Hash)
            } else {
                Some(number(None))
            }
        }
        ('f' | 'F', precision) => {
            let precision = precision.unwrap_or(DEFAULT_FLOAT_PRECISION).min(MAX_PRECISION);
            if precision == 0 {
                Some(number(Some("integer".to_string())))
            } else {
                Some(number(Some(format!(".{}", "0".repeat(precision)))))
            }
        }
        ('e' | 'E', None) => Some(number(Some("scientific".to_string()))),
        _ => None,
    }
}

/// Converts canonical ICU text into printf text.
///
/// Arguments are emitted without positions when they appear in index order
/// and with `n$` positions otherwise. Invalid ICU is unescaped and returned
/// as plain text with `%` doubled.
pub fn from_icu(icu_text: &str, dialect: PrintfDialect, in_plural: bool) -> String {
    let parsed = if in_plural {
        icu::parse_branch(icu_text)
    } else {
        icu::parse(icu_text)
    };
    let nodes = match parsed {
        Ok(nodes) => nodes,
        Err(_) => {
            return crate::escaping::unescape(icu_text, in_plural).replace('%', "%%");
        }
    };

    let positional = dialect.supports_positional() && !in_index_order(&nodes);
    let mut out = String::new();
    for node in &nodes {
        match node {
            IcuNode::Text(text) => out.push_str(&text.replace('%', "%%")),
            IcuNode::Hash => out.push_str(&spec(
                Some(0),
                None,
                dialect.integer_conversion(),
                positional,
                dialect,
            )),
            IcuNode::Argument {
                name,
                format,
                style,
            } => {
                let index = name.parse::<usize>().ok();
                let conversion = match (format.as_deref(), style.as_deref()) {
                    (None, _) => Some(dialect.string_conversion().to_string()),
                    (Some("number"), None) => Some(dialect.integer_conversion().to_string()),
                    (Some("number"), Some("scientific")) => Some("e".to_string()),
                    (Some("number"), Some("integer")) => Some(".0f".to_string()),
                    (Some("number"), Some(style)) => float_conversion(style),
                    _ => None,
                };
                match conversion {
                    Some(conversion) => {
                        out.push_str(&spec(index, Some(name), &conversion, positional, dialect))
                    }
                    None => out.push_str(&icu::render(std::slice::from_ref(node), in_plural)),
                }
            }
            IcuNode::Choice { .. } => {
                out.push_str(&icu::render(std::slice::from_ref(node), in_plural))
            }
        }
    }
    out
}

fn float_conversion(style: &str) -> Option<String> {
    let zeros = style.strip_prefix('.')?;
    if zeros.is_empty() || !zeros.chars().all(|c| c == '0') {
        return None;
    }
    let precision = zeros.len().min(MAX_PRECISION);
    if precision == DEFAULT_FLOAT_PRECISION {
        Some("f".to_string())
    } else {
        Some(format!(".{}f", precision))
    }
}

fn spec(
    index: Option<usize>,
    name: Option<&String>,
    conversion: &str,
    positional: bool,
    dialect: PrintfDialect,
) -> String {
    match (index, name) {
        (Some(index), _) if positional => format!("%{}${}", index + 1, conversion),
        (Some(_), _) => format!("%{}", conversion),
        (None, Some(name)) if dialect == PrintfDialect::Python => {
            format!("%({}){}", name, conversion)
        }
        _ => format!("%{}", conversion),
    }
}

fn in_index_order(nodes: &[IcuNode]) -> bool {
    let mut expected = 0usize;
    for node in nodes {
        let index = match node {
            IcuNode::Hash => Some(0),
            IcuNode::Argument { name, .. } => name.parse::<usize>().ok(),
            _ => None,
        };
        if let Some(index) = index {
            if index != expected {
                return false;
            }
            expected += 1;
        }
    }
    true
}

/// Build a normalized signature (sequence of tokens) for comparison.
pub fn signature(input: &str, dialect: PrintfDialect) -> Vec<String> {
    tokenize(input, dialect)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(token) => Some(token.to_signature()),
            Segment::Text(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c_round_trip(input: &str) {
        let icu = to_icu(input, PrintfDialect::C, false);
        assert_eq!(
            from_icu(&icu, PrintfDialect::C, false),
            input,
            "input: {input}, icu: {icu}"
        );
    }

    #[test]
    fn test_c_round_trips() {
        for input in [
            "Hello %s",
            "Hello %d",
            "Hello %.2f",
            "Hello %f",
            "Hello %e",
            "Hello %2$e, hello %1$s",
            "Hello %.50f",
            "100%% sure",
        ] {
            c_round_trip(input);
        }
    }

    #[test]
    fn test_icu_shapes() {
        assert_eq!(to_icu("Hello %s", PrintfDialect::C, false), "Hello {0}");
        assert_eq!(to_icu("%d items", PrintfDialect::C, false), "{0, number} items");
        assert_eq!(to_icu("%.2f", PrintfDialect::C, false), "{0, number, .00}");
        assert_eq!(to_icu("%f", PrintfDialect::C, false), "{0, number, .000000}");
        assert_eq!(to_icu("%e", PrintfDialect::C, false), "{0, number, scientific}");
        assert_eq!(
            to_icu("%2$s and %1$s", PrintfDialect::C, false),
            "{1} and {0}"
        );
    }

    #[test]
    fn test_precision_is_capped() {
        let zeros = "0".repeat(50);
        assert_eq!(
            to_icu("Hello %.51f", PrintfDialect::C, false),
            format!("Hello {{0, number, .{zeros}}}")
        );
        assert_eq!(
            to_icu("Hello %.99999999999999999999f", PrintfDialect::C, false),
            format!("Hello {{0, number, .{zeros}}}")
        );
        assert_eq!(to_icu("%.f", PrintfDialect::C, false), "{0, number, integer}");
    }

    #[test]
    fn test_plural_branch_with_trailing_apostrophe() {
        let branch = to_icu("%d files'", PrintfDialect::C, true);
        assert_eq!(branch, "# files''");
        assert_eq!(from_icu(&branch, PrintfDialect::C, true), "%d files'");
    }

    #[test]
    fn test_plural_argument_becomes_hash() {
        assert_eq!(to_icu("%d apples", PrintfDialect::C, true), "# apples");
        assert_eq!(from_icu("# apples", PrintfDialect::C, true), "%d apples");
        assert_eq!(to_icu("# %d", PrintfDialect::C, true), "'#' #");
    }

    #[test]
    fn test_braces_are_escaped() {
        assert_eq!(to_icu("{%s}", PrintfDialect::C, false), "'{'{0}'}'");
    }

    #[test]
    fn test_unsupported_specifiers_stay_literal() {
        assert_eq!(to_icu("%x and %5d", PrintfDialect::C, false), "%x and %5d");
        assert_eq!(to_icu("100% sure", PrintfDialect::C, false), "100% sure");
    }

    #[test]
    fn test_apple_dialect() {
        assert_eq!(
            to_icu("%@ has %lld items", PrintfDialect::Apple, false),
            "{0} has {1, number} items"
        );
        assert_eq!(
            from_icu("{0} has {1, number} items", PrintfDialect::Apple, false),
            "%@ has %lld items"
        );
        assert_eq!(from_icu("# items", PrintfDialect::Apple, true), "%lld items");
    }

    #[test]
    fn test_python_named_arguments() {
        assert_eq!(
            to_icu("Hi %(name)s, %(count)d new", PrintfDialect::Python, false),
            "Hi {name}, {count, number} new"
        );
        assert_eq!(
            from_icu("Hi {name}, {count, number} new", PrintfDialect::Python, false),
            "Hi %(name)s, %(count)d new"
        );
    }

    #[test]
    fn test_named_arguments_in_c_become_plain_strings() {
        assert_eq!(from_icu("Hi {name}", PrintfDialect::C, false), "Hi %s");
    }

    #[test]
    fn test_invalid_icu_is_exported_as_text() {
        assert_eq!(from_icu("50% {broken", PrintfDialect::C, false), "50%% {broken");
    }

    #[test]
    fn test_signature() {
        assert_eq!(
            signature("Hello %1$@, you have %2$lld items and %@ extra", PrintfDialect::Apple),
            vec!["1$@", "2$d", "@"]
        );
        assert_eq!(signature("Discount: 50%% and value %d", PrintfDialect::C), vec!["d"]);
    }
}
