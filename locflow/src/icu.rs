//! A small ICU MessageFormat parser and renderer.
//!
//! Only the subset used by localization files is understood: literal text
//! with apostrophe quoting, `{arg}`, `{arg, type}`, `{arg, type, style}`,
//! `plural` / `selectordinal` / `select` with branches, and the `#` symbol
//! inside plural branches. Text nodes hold raw (unescaped) text, so
//! `render(parse(m)?)` produces an equivalent, normalized message.

use std::collections::BTreeMap;
use std::fmt::Display;

use crate::escaping::{escape, escape_before_syntax};
use crate::types::PluralCategory;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IcuNode {
    /// Raw literal text.
    Text(String),
    /// A simple or typed argument such as `{name}` or `{0, number, .00}`.
    Argument {
        name: String,
        format: Option<String>,
        style: Option<String>,
    },
    /// The `#` symbol of a plural branch.
    Hash,
    /// A `plural`, `selectordinal` or `select` construct.
    Choice {
        name: String,
        kind: ChoiceKind,
        offset: Option<String>,
        branches: Vec<(String, Vec<IcuNode>)>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceKind {
    Plural,
    SelectOrdinal,
    Select,
}

impl ChoiceKind {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "plural" => Some(ChoiceKind::Plural),
            "selectordinal" => Some(ChoiceKind::SelectOrdinal),
            "select" => Some(ChoiceKind::Select),
            _ => None,
        }
    }

    fn is_plural_like(&self) -> bool {
        matches!(self, ChoiceKind::Plural | ChoiceKind::SelectOrdinal)
    }
}

impl Display for ChoiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChoiceKind::Plural => write!(f, "plural"),
            ChoiceKind::SelectOrdinal => write!(f, "selectordinal"),
            ChoiceKind::Select => write!(f, "select"),
        }
    }
}

/// Syntax error with the character offset it was detected at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcuSyntaxError {
    pub position: usize,
    pub message: String,
}

impl Display for IcuSyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)
    }
}

impl std::error::Error for IcuSyntaxError {}

/// Parses an ICU message into nodes.
pub fn parse(message: &str) -> Result<Vec<IcuNode>, IcuSyntaxError> {
    let mut parser = Parser {
        chars: message.chars().collect(),
        pos: 0,
    };
    parser.parse_nodes(false, false)
}

/// Parses the text of a single plural branch, where `#` is special.
pub fn parse_branch(text: &str) -> Result<Vec<IcuNode>, IcuSyntaxError> {
    let mut parser = Parser {
        chars: text.chars().collect(),
        pos: 0,
    };
    parser.parse_nodes(true, false)
}

/// Whether the message is syntactically valid ICU.
pub fn is_valid(message: &str) -> bool {
    parse(message).is_ok()
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn error<T>(&self, message: impl Into<String>) -> Result<T, IcuSyntaxError> {
        Err(IcuSyntaxError {
            position: self.pos,
            message: message.into(),
        })
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse_nodes(&mut self, in_plural: bool, nested: bool) -> Result<Vec<IcuNode>, IcuSyntaxError> {
        let mut nodes = Vec::new();
        let mut text = String::new();

        while let Some(c) = self.peek() {
            match c {
                '\'' => self.read_quoted(&mut text, in_plural),
                '{' => {
                    flush_text(&mut nodes, &mut text);
                    let node = self.parse_argument(in_plural)?;
                    nodes.push(node);
                }
                '}' if nested => {
                    flush_text(&mut nodes, &mut text);
                    return Ok(nodes);
                }
                '}' => return self.error("unmatched '}'"),
                '#' if in_plural => {
                    flush_text(&mut nodes, &mut text);
                    nodes.push(IcuNode::Hash);
                    self.pos += 1;
                }
                _ => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }

        if nested {
            return self.error("unclosed '{'");
        }
        flush_text(&mut nodes, &mut text);
        Ok(nodes)
    }

    // Mirrors `escaping::unescape` so that parsing escaped text yields the raw text.
    fn read_quoted(&mut self, text: &mut String, in_plural: bool) {
        let next = self.chars.get(self.pos + 1).copied();
        if next == Some('\'') {
            text.push('\'');
            self.pos += 2;
            return;
        }
        let opens = matches!(next, Some(n) if n == '{' || n == '}' || (in_plural && n == '#'));
        if !opens {
            text.push('\'');
            self.pos += 1;
            return;
        }
        self.pos += 1;
        while let Some(c) = self.peek() {
            if c == '\'' {
                if self.chars.get(self.pos + 1) == Some(&'\'') {
                    text.push('\'');
                    self.pos += 2;
                    continue;
                }
                self.pos += 1;
                return;
            }
            text.push(c);
            self.pos += 1;
        }
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' || c == '{' || c == '}' {
                break;
            }
            word.push(c);
            self.pos += 1;
        }
        word
    }

    fn expect(&mut self, expected: char) -> Result<(), IcuSyntaxError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            self.error(format!("expected '{}'", expected))
        }
    }

    fn parse_argument(&mut self, in_plural: bool) -> Result<IcuNode, IcuSyntaxError> {
        self.expect('{')?;
        self.skip_whitespace();
        let name = self.read_word();
        if name.is_empty() {
            return self.error("empty argument name");
        }
        self.skip_whitespace();

        match self.peek() {
            Some('}') => {
                self.pos += 1;
                return Ok(IcuNode::Argument {
                    name,
                    format: None,
                    style: None,
                });
            }
            Some(',') => self.pos += 1,
            _ => return self.error("expected ',' or '}' after argument name"),
        }

        self.skip_whitespace();
        let format = self.read_word();
        if format.is_empty() {
            return self.error("empty argument type");
        }
        self.skip_whitespace();

        if let Some(kind) = ChoiceKind::from_keyword(&format) {
            self.expect(',')?;
            return self.parse_choice(name, kind, in_plural);
        }

        match self.peek() {
            Some('}') => {
                self.pos += 1;
                Ok(IcuNode::Argument {
                    name,
                    format: Some(format),
                    style: None,
                })
            }
            Some(',') => {
                self.pos += 1;
                let style = self.read_style()?;
                Ok(IcuNode::Argument {
                    name,
                    format: Some(format),
                    style: Some(style),
                })
            }
            _ => self.error("expected ',' or '}' after argument type"),
        }
    }

    fn read_style(&mut self) -> Result<String, IcuSyntaxError> {
        let mut style = String::new();
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '{' => depth += 1,
                '}' if depth == 0 => return Ok(style.trim().to_string()),
                '}' => depth -= 1,
                _ => {}
            }
            style.push(c);
        }
        self.error("unclosed argument style")
    }

    fn parse_choice(
        &mut self,
        name: String,
        kind: ChoiceKind,
        in_plural: bool,
    ) -> Result<IcuNode, IcuSyntaxError> {
        let mut branches = Vec::new();
        let mut offset = None;
        let branch_in_plural = in_plural || kind.is_plural_like();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return self.error("unclosed choice"),
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                _ => {}
            }
            let selector = self.read_word();
            if selector.is_empty() {
                return self.error("empty selector");
            }
            if let Some(value) = selector.strip_prefix("offset:") {
                offset = Some(value.to_string());
                continue;
            }
            self.skip_whitespace();
            self.expect('{')?;
            let nodes = self.parse_nodes(branch_in_plural, true)?;
            self.expect('}')?;
            branches.push((selector, nodes));
        }

        if branches.is_empty() {
            return self.error("choice without branches");
        }
        Ok(IcuNode::Choice {
            name,
            kind,
            offset,
            branches,
        })
    }
}

fn flush_text(nodes: &mut Vec<IcuNode>, text: &mut String) {
    if !text.is_empty() {
        nodes.push(IcuNode::Text(std::mem::take(text)));
    }
}

/// Renders nodes back into ICU message text.
///
/// Plural text always sits inside a branch, so with `in_plural` the output is
/// safe to close with `}`.
pub fn render(nodes: &[IcuNode], in_plural: bool) -> String {
    render_nodes(nodes, in_plural, in_plural)
}

fn render_nodes(nodes: &[IcuNode], in_plural: bool, closes_branch: bool) -> String {
    let mut out = String::new();
    for (i, node) in nodes.iter().enumerate() {
        match node {
            IcuNode::Text(text) => {
                if i + 1 < nodes.len() || closes_branch {
                    out.push_str(&escape_before_syntax(text, in_plural));
                } else {
                    out.push_str(&escape(text, in_plural));
                }
            }
            IcuNode::Argument {
                name,
                format,
                style,
            } => match (format, style) {
                (Some(format), Some(style)) => {
                    out.push_str(&format!("{{{}, {}, {}}}", name, format, style))
                }
                (Some(format), None) => out.push_str(&format!("{{{}, {}}}", name, format)),
                _ => out.push_str(&format!("{{{}}}", name)),
            },
            IcuNode::Hash => out.push('#'),
            IcuNode::Choice {
                name,
                kind,
                offset,
                branches,
            } => {
                let branch_in_plural = in_plural || kind.is_plural_like();
                out.push_str(&format!("{{{}, {},", name, kind));
                if let Some(offset) = offset {
                    out.push_str(&format!(" offset:{}", offset));
                }
                for (selector, branch) in branches {
                    out.push_str(&format!(
                        " {} {{{}}}",
                        selector,
                        render_nodes(branch, branch_in_plural, true)
                    ));
                }
                out.push('}');
            }
        }
    }
    out
}

/// A top-level plural construct lifted out of its message.
///
/// Text around the plural (`"You have {0, plural, ...} left"`) is folded into
/// every branch so each branch is a complete message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPlural {
    pub argument: String,
    pub forms: BTreeMap<PluralCategory, Vec<IcuNode>>,
}

/// Extracts the single top-level plural of a message.
///
/// Returns `None` for messages without a plural, with more than one, or with
/// a `select` at the top level. Exact-value branches (`=0`) have no native
/// counterpart and are dropped.
pub fn extract_plural(nodes: &[IcuNode]) -> Option<ExtractedPlural> {
    let mut plural_index = None;
    for (i, node) in nodes.iter().enumerate() {
        if let IcuNode::Choice { .. } = node {
            if plural_index.is_some() {
                return None;
            }
            plural_index = Some(i);
        }
    }
    let index = plural_index?;
    let IcuNode::Choice {
        name,
        kind: ChoiceKind::Plural,
        branches,
        ..
    } = &nodes[index]
    else {
        return None;
    };

    let prefix = &nodes[..index];
    let suffix = &nodes[index + 1..];
    let mut forms = BTreeMap::new();
    for (selector, branch) in branches {
        let Ok(category) = selector.parse::<PluralCategory>() else {
            continue;
        };
        let mut form = Vec::with_capacity(prefix.len() + branch.len() + suffix.len());
        form.extend_from_slice(prefix);
        form.extend_from_slice(branch);
        form.extend_from_slice(suffix);
        forms.insert(category, merge_text(form));
    }
    if forms.is_empty() {
        return None;
    }
    Some(ExtractedPlural {
        argument: name.clone(),
        forms,
    })
}

fn merge_text(nodes: Vec<IcuNode>) -> Vec<IcuNode> {
    let mut merged: Vec<IcuNode> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match (merged.last_mut(), node) {
            (Some(IcuNode::Text(previous)), IcuNode::Text(text)) => previous.push_str(&text),
            (_, node) => merged.push(node),
        }
    }
    merged
}

/// Names of all arguments used in the nodes, including nested branches.
pub fn argument_names(nodes: &[IcuNode]) -> Vec<String> {
    let mut names = Vec::new();
    collect_argument_names(nodes, &mut names);
    names
}

fn collect_argument_names(nodes: &[IcuNode], names: &mut Vec<String>) {
    for node in nodes {
        match node {
            IcuNode::Argument { name, .. } => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            IcuNode::Choice { name, branches, .. } => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
                for (_, branch) in branches {
                    collect_argument_names(branch, names);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_argument() {
        let nodes = parse("Hi {name}!").unwrap();
        assert_eq!(
            nodes,
            vec![
                IcuNode::Text("Hi ".to_string()),
                IcuNode::Argument {
                    name: "name".to_string(),
                    format: None,
                    style: None
                },
                IcuNode::Text("!".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_typed_argument_with_style() {
        let nodes = parse("{0, number, .00}").unwrap();
        assert_eq!(
            nodes,
            vec![IcuNode::Argument {
                name: "0".to_string(),
                format: Some("number".to_string()),
                style: Some(".00".to_string()),
            }]
        );
    }

    #[test]
    fn test_parse_plural_with_hash() {
        let nodes = parse("{count, plural, one {# apple} other {# apples}}").unwrap();
        let IcuNode::Choice { name, kind, branches, .. } = &nodes[0] else {
            panic!("expected a choice node");
        };
        assert_eq!(name, "count");
        assert_eq!(*kind, ChoiceKind::Plural);
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].1[0], IcuNode::Hash);
    }

    #[test]
    fn test_hash_outside_plural_is_text() {
        let nodes = parse("Item #1").unwrap();
        assert_eq!(nodes, vec![IcuNode::Text("Item #1".to_string())]);
    }

    #[test]
    fn test_quoted_text_is_unescaped() {
        let nodes = parse("It''s '{'literal'}'").unwrap();
        assert_eq!(nodes, vec![IcuNode::Text("It's {literal}".to_string())]);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("Unclosed {name").is_err());
        assert!(parse("Unmatched }").is_err());
        assert!(parse("{}").is_err());
        assert!(parse("{n, plural,}").is_err());
    }

    #[test]
    fn test_render_round_trip() {
        for message in [
            "Hi {name}!",
            "{0, number, .00}",
            "{count, plural, one {# apple} other {# apples}}",
            "It''s '{'literal'}'",
            "{g, select, male {He} other {They}} said",
        ] {
            let nodes = parse(message).unwrap();
            let rendered = render(&nodes, false);
            assert_eq!(parse(&rendered).unwrap(), nodes, "message: {message}");
        }
    }

    #[test]
    fn test_render_text_with_trailing_apostrophe_before_argument() {
        let nodes = vec![
            IcuNode::Text("it'".to_string()),
            IcuNode::Argument {
                name: "x".to_string(),
                format: None,
                style: None,
            },
        ];
        let rendered = render(&nodes, false);
        assert_eq!(parse(&rendered).unwrap(), nodes);
    }

    #[test]
    fn test_branch_ending_in_apostrophe_stays_closed() {
        let message = "{n, plural, one {# file''} other {{g, select, a {it''} other {x}}''}}";
        let nodes = parse(message).unwrap();
        let rendered = render(&nodes, false);
        assert_eq!(parse(&rendered).unwrap(), nodes);

        let branch = vec![IcuNode::Hash, IcuNode::Text(" files'".to_string())];
        assert_eq!(render(&branch, true), "# files''");
    }

    #[test]
    fn test_extract_plural_folds_surrounding_text() {
        let nodes = parse("You have {n, plural, one {# item} =0 {none} other {# items}} left").unwrap();
        let plural = extract_plural(&nodes).unwrap();
        assert_eq!(plural.argument, "n");
        assert_eq!(plural.forms.len(), 2);
        assert_eq!(
            render(&plural.forms[&PluralCategory::One], true),
            "You have # item left"
        );
    }

    #[test]
    fn test_extract_plural_rejects_select_and_plain() {
        assert!(extract_plural(&parse("Hello").unwrap()).is_none());
        assert!(extract_plural(&parse("{g, select, a {A} other {B}}").unwrap()).is_none());
    }

    #[test]
    fn test_argument_names() {
        let nodes = parse("{n, plural, one {{name} has # item} other {{name} has # items}}").unwrap();
        assert_eq!(argument_names(&nodes), vec!["n".to_string(), "name".to_string()]);
    }
}
