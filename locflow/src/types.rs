//! Core, format-agnostic types for locflow.
//! Parsers decode into these; exporters read stored ICU text back through them.

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use unic_langid::LanguageIdentifier;

use crate::icu::{self, IcuSyntaxError};

/// All entries of one language found in a single file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Resource {
    /// The language tag as found in the file (e.g. "en", "pt-BR").
    pub language: String,

    /// Entries in file order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub entries: Vec<Entry>,
}

impl Resource {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            entries: Vec::new(),
        }
    }

    pub(crate) fn add_entry(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn find_entry(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn parse_language_identifier(&self) -> Option<LanguageIdentifier> {
        self.language.replace('_', "-").parse().ok()
    }
}

/// A single key with its canonical message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Entry {
    /// Key name, already flattened for nested formats.
    pub key: String,

    pub message: CanonicalMessage,

    /// Description for translators (PO extracted comment, XLIFF note, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub description: Option<String>,
}

impl Entry {
    pub fn new(key: impl Into<String>, message: CanonicalMessage) -> Self {
        Self {
            key: key.into(),
            message,
            description: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }
}

impl Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entry {{ key: {}, message: {} }}", self.key, self.message)
    }
}

/// A message in canonical (ICU MessageFormat) form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum CanonicalMessage {
    /// A message without plural forms. The text is valid canonical ICU.
    Singular(String),

    /// A message with plural forms.
    Plural(PluralMessage),
}

impl CanonicalMessage {
    pub fn is_plural(&self) -> bool {
        matches!(self, CanonicalMessage::Plural(_))
    }

    /// Renders the complete ICU text that gets stored.
    pub fn to_icu(&self) -> String {
        match self {
            CanonicalMessage::Singular(text) => text.clone(),
            CanonicalMessage::Plural(plural) => plural.to_icu(),
        }
    }

    /// Lifts stored ICU text back into a message.
    ///
    /// Messages with exactly one top-level `plural` become
    /// [`CanonicalMessage::Plural`]; everything else stays singular.
    pub fn from_icu(text: &str) -> Result<Self, IcuSyntaxError> {
        let nodes = icu::parse(text)?;
        match icu::extract_plural(&nodes) {
            Some(extracted) => {
                let forms = extracted
                    .forms
                    .iter()
                    .map(|(category, branch)| (*category, icu::render(branch, true)));
                Ok(PluralMessage::new(extracted.argument, forms)
                    .map(CanonicalMessage::Plural)
                    .unwrap_or_else(|| CanonicalMessage::Singular(text.to_string())))
            }
            None => Ok(CanonicalMessage::Singular(text.to_string())),
        }
    }
}

impl Display for CanonicalMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_icu())
    }
}

/// All plural forms for a single message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PluralMessage {
    /// Name of the ICU argument the plural selects on (`0` for positional
    /// native formats).
    pub argument: String,

    /// Map from category to canonical branch text. `#` in a branch is the
    /// formatted argument. Always contains [`PluralCategory::Other`].
    pub forms: BTreeMap<PluralCategory, String>,
}

impl PluralMessage {
    /// Builds a plural message, filling `other` from the highest category
    /// present when the source did not provide it.
    ///
    /// Returns `None` when no forms are given.
    pub fn new(
        argument: impl Into<String>,
        forms: impl IntoIterator<Item = (PluralCategory, String)>,
    ) -> Option<Self> {
        let mut forms: BTreeMap<PluralCategory, String> = forms.into_iter().collect();
        if !forms.contains_key(&PluralCategory::Other) {
            let (_, highest) = forms.iter().next_back()?;
            let highest = highest.clone();
            forms.insert(PluralCategory::Other, highest);
        }
        Some(Self {
            argument: argument.into(),
            forms,
        })
    }

    /// Renders `{arg, plural,\n<category> {<branch>}\n...}`.
    pub fn to_icu(&self) -> String {
        let mut out = format!("{{{}, plural,\n", self.argument);
        for (category, text) in &self.forms {
            out.push_str(&format!("{} {{{}}}\n", category, text));
        }
        out.push('}');
        out
    }

    /// Argument names used by each branch; all branches of a well-formed
    /// plural share the same set.
    pub fn argument_names(&self) -> BTreeMap<PluralCategory, Vec<String>> {
        self.forms
            .iter()
            .map(|(category, text)| {
                let mut names = icu::parse_branch(text)
                    .map(|nodes| icu::argument_names(&nodes))
                    .unwrap_or_default();
                names.sort();
                (*category, names)
            })
            .collect()
    }

    /// Whether every branch uses the same arguments.
    pub fn has_consistent_arguments(&self) -> bool {
        let names = self.argument_names();
        let mut sets = names.values();
        match sets.next() {
            Some(first) => sets.all(|other| other == first),
            None => true,
        }
    }
}

/// Standard CLDR plural forms.
#[derive(Ord, PartialOrd, Eq, PartialEq, Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
#[derive(Hash)]
pub enum PluralCategory {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

impl PluralCategory {
    pub const ALL: [PluralCategory; 6] = [
        PluralCategory::Zero,
        PluralCategory::One,
        PluralCategory::Two,
        PluralCategory::Few,
        PluralCategory::Many,
        PluralCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PluralCategory::Zero => "zero",
            PluralCategory::One => "one",
            PluralCategory::Two => "two",
            PluralCategory::Few => "few",
            PluralCategory::Many => "many",
            PluralCategory::Other => "other",
        }
    }
}

impl Display for PluralCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluralCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ZERO" => Ok(PluralCategory::Zero),
            "ONE" => Ok(PluralCategory::One),
            "TWO" => Ok(PluralCategory::Two),
            "FEW" => Ok(PluralCategory::Few),
            "MANY" => Ok(PluralCategory::Many),
            "OTHER" => Ok(PluralCategory::Other),
            _ => Err(format!("Unknown plural category: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_add_entry() {
        let mut resource = Resource::new("en");
        resource.add_entry(Entry::new(
            "hello",
            CanonicalMessage::Singular("Hello".to_string()),
        ));
        assert_eq!(resource.entries.len(), 1);
        assert_eq!(resource.find_entry("hello").unwrap().key, "hello");
        assert!(resource.find_entry("missing").is_none());
    }

    #[test]
    fn test_resource_parse_language_identifier() {
        let resource = Resource::new("pt_BR");
        let lang_id = resource.parse_language_identifier().unwrap();
        assert_eq!(lang_id.language.as_str(), "pt");
        assert_eq!(lang_id.region.unwrap().as_str(), "BR");
        assert!(Resource::new("not-a-language").parse_language_identifier().is_none());
    }

    #[test]
    fn test_entry_description_blank_is_dropped() {
        let entry = Entry::new("k", CanonicalMessage::Singular("v".into()))
            .with_description(Some("  ".to_string()));
        assert!(entry.description.is_none());
    }

    #[test]
    fn test_plural_new_fills_other_from_highest() {
        let plural = PluralMessage::new(
            "0",
            [
                (PluralCategory::One, "# apple".to_string()),
                (PluralCategory::Few, "# apples (few)".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(plural.forms[&PluralCategory::Other], "# apples (few)");
        assert_eq!(plural.forms.len(), 3);
    }

    #[test]
    fn test_plural_new_empty() {
        let plural = PluralMessage::new("0", Vec::<(PluralCategory, String)>::new());
        assert!(plural.is_none());
    }

    #[test]
    fn test_plural_to_icu() {
        let plural = PluralMessage::new(
            "0",
            [
                (PluralCategory::One, "# dog".to_string()),
                (PluralCategory::Other, "# dogs".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(plural.to_icu(), "{0, plural,\none {# dog}\nother {# dogs}\n}");
    }

    #[test]
    fn test_from_icu_plural_and_singular() {
        let message =
            CanonicalMessage::from_icu("{count, plural, one {# item} other {# items}}").unwrap();
        let CanonicalMessage::Plural(plural) = message else {
            panic!("expected plural");
        };
        assert_eq!(plural.argument, "count");
        assert_eq!(plural.forms[&PluralCategory::One], "# item");

        let message = CanonicalMessage::from_icu("Hello {name}").unwrap();
        assert_eq!(message, CanonicalMessage::Singular("Hello {name}".to_string()));
        assert!(CanonicalMessage::from_icu("Broken {").is_err());
    }

    #[test]
    fn test_from_icu_reads_rendered_plural() {
        let plural = PluralMessage::new(
            "0",
            [
                (PluralCategory::One, "'#' {0} item".to_string()),
                (PluralCategory::Other, "{0} items".to_string()),
            ],
        )
        .unwrap();
        let parsed = CanonicalMessage::from_icu(&plural.to_icu()).unwrap();
        assert_eq!(parsed, CanonicalMessage::Plural(plural));
    }

    #[test]
    fn test_argument_consistency() {
        let consistent = PluralMessage::new(
            "n",
            [
                (PluralCategory::One, "{name} has # item".to_string()),
                (PluralCategory::Other, "{name} has # items".to_string()),
            ],
        )
        .unwrap();
        assert!(consistent.has_consistent_arguments());

        let inconsistent = PluralMessage::new(
            "n",
            [
                (PluralCategory::One, "{name} has # item".to_string()),
                (PluralCategory::Other, "# items".to_string()),
            ],
        )
        .unwrap();
        assert!(!inconsistent.has_consistent_arguments());
    }

    #[test]
    fn test_plural_category_from_str() {
        for category in PluralCategory::ALL {
            assert_eq!(PluralCategory::from_str(category.as_str()).unwrap(), category);
        }
        assert_eq!(PluralCategory::from_str("ONE").unwrap(), PluralCategory::One);
        assert!(PluralCategory::from_str("invalid").is_err());
    }
}
