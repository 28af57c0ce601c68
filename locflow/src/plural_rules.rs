//! Locale-aware plural mapping between native plural forms and CLDR
//! categories.
//!
//! Native formats address plural forms in two ways: gettext-style numeric
//! indices (`msgstr[1]`) and CLDR keywords (`<item quantity="few">`).
//! Indices are mapped by taking a sample number for the index from the
//! locale's example table and selecting its category with the locale's rule.

use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;
use serde::Serialize;
use unic_langid::LanguageIdentifier;

use crate::types::{CanonicalMessage, PluralCategory, PluralMessage, Resource};

/// A rule family shared by several languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PluralRule {
    /// Languages the table does not know: every number is `other`.
    Unknown,
    OnlyOther,
    OneOther,
    /// 0 and 1 are singular (French).
    ZeroOneOther,
    EastSlavic,
    SouthSlavic,
    Polish,
    Czech,
    Slovenian,
    Lithuanian,
    Latvian,
    Irish,
    Romanian,
    Arabic,
    Hebrew,
}

impl PluralRule {
    /// CLDR cardinal category of a non-negative integer.
    fn select(self, n: u64) -> PluralCategory {
        use PluralCategory::*;
        let n10 = n % 10;
        let n100 = n % 100;
        match self {
            PluralRule::Unknown | PluralRule::OnlyOther => Other,
            PluralRule::OneOther => {
                if n == 1 {
                    One
                } else {
                    Other
                }
            }
            PluralRule::ZeroOneOther => {
                if n <= 1 {
                    One
                } else {
                    Other
                }
            }
            PluralRule::EastSlavic | PluralRule::Polish | PluralRule::SouthSlavic => {
                let is_one = if self == PluralRule::Polish {
                    n == 1
                } else {
                    n10 == 1 && n100 != 11
                };
                if is_one {
                    One
                } else if (2..=4).contains(&n10) && !(12..=14).contains(&n100) {
                    Few
                } else if self == PluralRule::SouthSlavic {
                    Other
                } else {
                    Many
                }
            }
            PluralRule::Czech => match n {
                1 => One,
                2..=4 => Few,
                _ => Other,
            },
            PluralRule::Slovenian => match n100 {
                1 => One,
                2 => Two,
                3 | 4 => Few,
                _ => Other,
            },
            PluralRule::Lithuanian => {
                if (11..=19).contains(&n100) {
                    Other
                } else if n10 == 1 {
                    One
                } else if n10 >= 2 {
                    Few
                } else {
                    Other
                }
            }
            PluralRule::Latvian => {
                if n10 == 0 || (11..=19).contains(&n100) {
                    Zero
                } else if n10 == 1 {
                    One
                } else {
                    Other
                }
            }
            PluralRule::Irish => match n {
                1 => One,
                2 => Two,
                3..=6 => Few,
                7..=10 => Many,
                _ => Other,
            },
            PluralRule::Romanian => {
                if n == 1 {
                    One
                } else if n == 0 || (2..=19).contains(&n100) {
                    Few
                } else {
                    Other
                }
            }
            PluralRule::Arabic => match (n, n100) {
                (0, _) => Zero,
                (1, _) => One,
                (2, _) => Two,
                (_, 3..=10) => Few,
                (_, 11..=99) => Many,
                _ => Other,
            },
            PluralRule::Hebrew => {
                if n == 1 {
                    One
                } else if n == 2 {
                    Two
                } else if n > 10 && n10 == 0 {
                    Many
                } else {
                    Other
                }
            }
        }
    }

    /// gettext plural index of a non-negative integer, matching
    /// [`PluralRule::formula`].
    fn gettext_index(self, n: u64) -> usize {
        let n10 = n % 10;
        let n100 = n % 100;
        match self {
            PluralRule::Unknown | PluralRule::OnlyOther => 0,
            PluralRule::OneOther => usize::from(n != 1),
            PluralRule::ZeroOneOther => usize::from(n > 1),
            PluralRule::EastSlavic | PluralRule::SouthSlavic => {
                if n10 == 1 && n100 != 11 {
                    0
                } else if (2..=4).contains(&n10) && !(10..20).contains(&n100) {
                    1
                } else {
                    2
                }
            }
            PluralRule::Polish => {
                if n == 1 {
                    0
                } else if (2..=4).contains(&n10) && !(10..20).contains(&n100) {
                    1
                } else {
                    2
                }
            }
            PluralRule::Czech => match n {
                1 => 0,
                2..=4 => 1,
                _ => 2,
            },
            PluralRule::Slovenian => match n100 {
                1 => 0,
                2 => 1,
                3 | 4 => 2,
                _ => 3,
            },
            PluralRule::Lithuanian => {
                if n10 == 1 && n100 != 11 {
                    0
                } else if n10 >= 2 && !(10..20).contains(&n100) {
                    1
                } else {
                    2
                }
            }
            PluralRule::Latvian => {
                if n10 == 1 && n100 != 11 {
                    0
                } else if n != 0 {
                    1
                } else {
                    2
                }
            }
            PluralRule::Irish => match n {
                1 => 0,
                2 => 1,
                3..=6 => 2,
                7..=10 => 3,
                _ => 4,
            },
            PluralRule::Romanian => {
                if n == 1 {
                    0
                } else if n == 0 || (1..20).contains(&n100) {
                    1
                } else {
                    2
                }
            }
            PluralRule::Arabic => match (n, n100) {
                (0, _) => 0,
                (1, _) => 1,
                (2, _) => 2,
                (_, 3..=10) => 3,
                (_, 11..=99) => 4,
                _ => 5,
            },
            PluralRule::Hebrew => {
                if n == 1 {
                    0
                } else if n == 2 {
                    1
                } else if n > 10 && n10 == 0 {
                    2
                } else {
                    3
                }
            }
        }
    }

    fn nplurals(self) -> usize {
        match self {
            PluralRule::Unknown | PluralRule::OnlyOther => 1,
            PluralRule::OneOther | PluralRule::ZeroOneOther => 2,
            PluralRule::EastSlavic
            | PluralRule::SouthSlavic
            | PluralRule::Polish
            | PluralRule::Czech
            | PluralRule::Lithuanian
            | PluralRule::Latvian
            | PluralRule::Romanian => 3,
            PluralRule::Slovenian | PluralRule::Hebrew => 4,
            PluralRule::Irish => 5,
            PluralRule::Arabic => 6,
        }
    }

    fn formula(self) -> &'static str {
        match self {
            PluralRule::Unknown | PluralRule::OnlyOther => "0",
            PluralRule::OneOther => "(n != 1)",
            PluralRule::ZeroOneOther => "(n > 1)",
            PluralRule::EastSlavic | PluralRule::SouthSlavic => {
                "(n%10==1 && n%100!=11 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2)"
            }
            PluralRule::Polish => {
                "(n==1 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2)"
            }
            PluralRule::Czech => "(n==1) ? 0 : (n>=2 && n<=4) ? 1 : 2",
            PluralRule::Slovenian => {
                "(n%100==1 ? 0 : n%100==2 ? 1 : n%100==3 || n%100==4 ? 2 : 3)"
            }
            PluralRule::Lithuanian => {
                "(n%10==1 && n%100!=11 ? 0 : n%10>=2 && (n%100<10 || n%100>=20) ? 1 : 2)"
            }
            PluralRule::Latvian => "(n%10==1 && n%100!=11 ? 0 : n != 0 ? 1 : 2)",
            PluralRule::Irish => "n==1 ? 0 : n==2 ? 1 : (n>2 && n<7) ? 2 :(n>6 && n<11) ? 3 : 4",
            PluralRule::Romanian => "(n==1 ? 0 : (n==0 || (n%100 > 0 && n%100 < 20)) ? 1 : 2)",
            PluralRule::Arabic => {
                "(n==0 ? 0 : n==1 ? 1 : n==2 ? 2 : n%100>=3 && n%100<=10 ? 3 : n%100>=11 ? 4 : 5)"
            }
            PluralRule::Hebrew => "(n==1 ? 0 : n==2 ? 1 : (n>10 && n%10==0) ? 2 : 3)",
        }
    }

    /// The example table: the smallest integer producing each gettext index.
    fn compute_examples(self) -> Vec<PluralExample> {
        let mut examples: Vec<PluralExample> = Vec::new();
        for sample in 0..1000u64 {
            let index = self.gettext_index(sample);
            if !examples.iter().any(|e| e.index == index) {
                examples.push(PluralExample { index, sample });
            }
            if examples.len() == self.nplurals() {
                break;
            }
        }
        examples.sort_by_key(|e| e.index);
        examples
    }
}

/// A representative number for one gettext plural index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluralExample {
    pub index: usize,
    pub sample: u64,
}

lazy_static! {
    /// Static mapping from base language subtag → plural rule family.
    static ref RULE_TABLE: BTreeMap<&'static str, PluralRule> = {
        let mut m: BTreeMap<&'static str, PluralRule> = BTreeMap::new();

        // One/Other (most Indo‑European languages without complex plural rules)
        for code in [
            "en","de","nl","sv","da","nb","nn","no","is","fi","et","fa","hi","bn","gu",
            "ta","te","kn","ml","mr","it","es","pt","mk","el","eu","gl","af","sw","ur",
            "fil","tl","tr","hu","bg","ca","sq","ka","kk","az","uz","mn","ne"
        ] {
            m.insert(code, PluralRule::OneOther);
        }

        for code in ["fr","hy","kab","ff"] {
            m.insert(code, PluralRule::ZeroOneOther);
        }

        // Only Other (East/Southeast Asian common cases)
        for code in ["ja","zh","ko","th","vi","km","lo","my","yue","id","ms"] {
            m.insert(code, PluralRule::OnlyOther);
        }

        for code in ["ru","uk","be"] {
            m.insert(code, PluralRule::EastSlavic);
        }

        for code in ["sr","hr","bs","sh"] {
            m.insert(code, PluralRule::SouthSlavic);
        }

        m.insert("pl", PluralRule::Polish);

        for code in ["cs","sk"] {
            m.insert(code, PluralRule::Czech);
        }

        m.insert("sl", PluralRule::Slovenian);
        m.insert("lt", PluralRule::Lithuanian);
        m.insert("lv", PluralRule::Latvian);
        m.insert("ga", PluralRule::Irish);
        m.insert("ro", PluralRule::Romanian);
        m.insert("ar", PluralRule::Arabic);

        // Hebrew (legacy code iw also maps here)
        for code in ["he","iw"] {
            m.insert(code, PluralRule::Hebrew);
        }

        m
    };

    static ref EXAMPLE_TABLE: BTreeMap<PluralRule, Vec<PluralExample>> = {
        let mut m = BTreeMap::new();
        for rule in RULE_TABLE.values().copied().chain([PluralRule::OneOther]) {
            m.entry(rule).or_insert_with(|| rule.compute_examples());
        }
        m
    };
}

/// Base language subtag of a tag such as `pt-BR`, `pt_BR` or `zh-Hant-TW`.
pub fn base_language(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn rule_for(tag: &str) -> PluralRule {
    RULE_TABLE
        .get(base_language(tag).as_str())
        .copied()
        .unwrap_or(PluralRule::Unknown)
}

/// Example table for a locale. Unknown locales use the English table.
pub fn examples_for(tag: &str) -> &'static [PluralExample] {
    let rule = match rule_for(tag) {
        PluralRule::Unknown => PluralRule::OneOther,
        rule => rule,
    };
    EXAMPLE_TABLE
        .get(&rule)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// The plural category of an integer in a locale.
pub fn select(tag: &str, n: u64) -> PluralCategory {
    rule_for(tag).select(n)
}

/// The category a gettext plural index stands for in a locale.
///
/// An index missing from the example table uses the table's first sample.
pub fn category_for_index(tag: &str, index: usize) -> PluralCategory {
    resolve_index(&CldrPluralRules, tag, index)
}

fn resolve_index(resolver: &dyn PluralCategoryResolver, tag: &str, index: usize) -> PluralCategory {
    let examples = examples_for(tag);
    let sample = examples
        .iter()
        .find(|e| e.index == index)
        .or_else(|| examples.first())
        .map(|e| e.sample)
        .unwrap_or(0);
    resolver.select(tag, sample)
}

/// The gettext plural index used for a category when exporting.
pub fn native_index_for(tag: &str, category: PluralCategory) -> Option<usize> {
    examples_for(tag)
        .iter()
        .find(|e| select(tag, e.sample) == category)
        .map(|e| e.index)
}

pub fn nplurals(tag: &str) -> usize {
    rule_for(tag).nplurals()
}

/// The value of a gettext `Plural-Forms` header for a locale.
pub fn plural_forms_header(tag: &str) -> String {
    let rule = rule_for(tag);
    format!("nplurals={}; plural={};", rule.nplurals(), rule.formula())
}

/// How a native format addresses one plural form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeForm {
    /// gettext-style numeric index (`msgstr[n]`).
    Index(usize),
    /// CLDR keyword (`<item quantity="one">`, stringsdict `one`).
    Keyword(PluralCategory),
}

/// Maps native forms to canonical categories with the built-in rules.
///
/// When two native forms map to the same category the later one wins.
pub fn map_native_forms(
    tag: &str,
    forms: impl IntoIterator<Item = (NativeForm, String)>,
) -> BTreeMap<PluralCategory, String> {
    map_native_forms_with(&CldrPluralRules, tag, forms)
}

/// [`map_native_forms`] with a custom resolver for index forms.
pub fn map_native_forms_with(
    resolver: &dyn PluralCategoryResolver,
    tag: &str,
    forms: impl IntoIterator<Item = (NativeForm, String)>,
) -> BTreeMap<PluralCategory, String> {
    let mut mapped = BTreeMap::new();
    for (form, text) in forms {
        let category = match form {
            NativeForm::Index(index) => resolve_index(resolver, tag, index),
            NativeForm::Keyword(category) => category,
        };
        mapped.insert(category, text);
    }
    mapped
}

/// Looks up plural categories for locales.
///
/// Kept as a trait so hosts can plug in a full CLDR implementation.
pub trait PluralCategoryResolver: Send + Sync {
    fn select(&self, locale: &str, sample: u64) -> PluralCategory;

    /// A sample number that selects `category` in the locale, if any.
    fn sample_for(&self, locale: &str, category: PluralCategory) -> Option<u64>;
}

/// Built-in resolver backed by the static rule table.
#[derive(Debug, Clone, Copy, Default)]
pub struct CldrPluralRules;

impl PluralCategoryResolver for CldrPluralRules {
    fn select(&self, locale: &str, sample: u64) -> PluralCategory {
        select(locale, sample)
    }

    fn sample_for(&self, locale: &str, category: PluralCategory) -> Option<u64> {
        let rule = rule_for(locale);
        (0..1000u64).find(|n| rule.select(*n) == category)
    }
}

/// Returns the required CLDR plural categories for a given language identifier.
///
/// Unknown locales fall back to {Other} to avoid false positives.
pub fn required_categories_for(lang: &LanguageIdentifier) -> BTreeSet<PluralCategory> {
    required_categories_for_str(lang.language.as_str())
}

/// Helper for string language codes (accepts underscores).
pub fn required_categories_for_str(lang: &str) -> BTreeSet<PluralCategory> {
    let rule = rule_for(lang);
    let mut set: BTreeSet<PluralCategory> = (0..1000u64).map(|n| rule.select(n)).collect();
    set.insert(PluralCategory::Other);
    set
}

/// Compute which required categories are missing for a given plural message and language.
pub fn missing_categories_for_plural(
    lang: &str,
    plural: &PluralMessage,
) -> BTreeSet<PluralCategory> {
    let required = required_categories_for_str(lang);
    let have: BTreeSet<PluralCategory> = plural.forms.keys().copied().collect();
    &required - &have
}

/// Non-fatal report describing missing plural categories for a key in a locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluralValidationReport {
    pub language: String,
    pub key: String,
    pub missing: BTreeSet<PluralCategory>,
    pub have: BTreeSet<PluralCategory>,
}

/// Collect non-fatal plural issues for a single resource.
pub fn collect_resource_plural_issues(resource: &Resource) -> Vec<PluralValidationReport> {
    let mut reports = Vec::new();
    for entry in &resource.entries {
        if let CanonicalMessage::Plural(plural) = &entry.message {
            let missing = missing_categories_for_plural(&resource.language, plural);
            if !missing.is_empty() {
                reports.push(PluralValidationReport {
                    language: resource.language.clone(),
                    key: entry.key.clone(),
                    missing,
                    have: plural.forms.keys().copied().collect(),
                });
            }
        }
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Entry;
    use PluralCategory::*;

    #[test]
    fn test_required_categories_basic() {
        let en: LanguageIdentifier = "en".parse().unwrap();
        let ru: LanguageIdentifier = "ru".parse().unwrap();
        let ja: LanguageIdentifier = "ja".parse().unwrap();

        assert_eq!(required_categories_for(&en), [One, Other].into_iter().collect());
        assert_eq!(
            required_categories_for(&ru),
            [One, Few, Many, Other].into_iter().collect()
        );
        assert_eq!(required_categories_for(&ja), [Other].into_iter().collect());
        assert_eq!(
            required_categories_for_str("ar_EG"),
            PluralCategory::ALL.into_iter().collect()
        );
        assert_eq!(required_categories_for_str("xx"), [Other].into_iter().collect());
    }

    #[test]
    fn test_example_tables() {
        let en = examples_for("en");
        assert_eq!(
            en,
            &[
                PluralExample { index: 0, sample: 1 },
                PluralExample { index: 1, sample: 0 }
            ]
        );
        let cs = examples_for("cs");
        assert_eq!(cs.iter().map(|e| e.sample).collect::<Vec<_>>(), vec![1, 2, 0]);
        assert_eq!(examples_for("ar").len(), 6);
        assert_eq!(examples_for("xx-YY"), en);
    }

    #[test]
    fn test_index_to_category() {
        assert_eq!(category_for_index("en", 0), One);
        assert_eq!(category_for_index("en", 1), Other);
        assert_eq!(category_for_index("cs", 1), Few);
        assert_eq!(category_for_index("cs", 2), Other);
        assert_eq!(category_for_index("ru", 2), Many);
        assert_eq!(category_for_index("lv", 2), Zero);
        // Unknown index: first sample of the table.
        assert_eq!(category_for_index("en", 7), One);
    }

    #[test]
    fn test_last_write_wins_for_unknown_locale() {
        let forms = map_native_forms(
            "xx",
            [
                (NativeForm::Index(0), "first".to_string()),
                (NativeForm::Index(1), "second".to_string()),
            ],
        );
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[&Other], "second");
    }

    #[test]
    fn test_native_index_round_trip() {
        for tag in ["en", "cs", "ru", "pl", "ar", "sl", "ga", "ro", "lt", "lv", "he"] {
            for example in examples_for(tag) {
                let category = category_for_index(tag, example.index);
                assert_eq!(
                    native_index_for(tag, category),
                    Some(example.index),
                    "tag {tag}, index {}",
                    example.index
                );
            }
        }
        assert_eq!(native_index_for("en", Few), None);
    }

    #[test]
    fn test_plural_forms_header() {
        assert_eq!(plural_forms_header("en"), "nplurals=2; plural=(n != 1);");
        assert_eq!(plural_forms_header("ja"), "nplurals=1; plural=0;");
        assert_eq!(nplurals("cs"), 3);
    }

    struct OnlyOther;

    impl PluralCategoryResolver for OnlyOther {
        fn select(&self, _locale: &str, _sample: u64) -> PluralCategory {
            Other
        }

        fn sample_for(&self, _locale: &str, category: PluralCategory) -> Option<u64> {
            (category == Other).then_some(0)
        }
    }

    #[test]
    fn test_custom_resolver_maps_indices() {
        let forms = map_native_forms_with(
            &OnlyOther,
            "en",
            [
                (NativeForm::Index(0), "first".to_string()),
                (NativeForm::Index(1), "second".to_string()),
                (NativeForm::Keyword(One), "keyword".to_string()),
            ],
        );
        assert_eq!(forms.get(&Other).map(String::as_str), Some("second"));
        assert_eq!(forms.get(&One).map(String::as_str), Some("keyword"));
    }

    #[test]
    fn test_resolver() {
        let rules = CldrPluralRules;
        assert_eq!(rules.select("fr", 0), One);
        assert_eq!(rules.select("pl", 22), Few);
        assert_eq!(rules.select("pl", 25), Many);
        assert_eq!(rules.sample_for("ru", Many), Some(0));
        assert_eq!(rules.sample_for("en", Two), None);
    }

    #[test]
    fn test_collect_resource_plural_issues() {
        let mut resource = Resource::new("ru");
        resource.add_entry(Entry::new(
            "apples",
            CanonicalMessage::Plural(
                PluralMessage::new("0", [(One, "# apple".to_string()), (Other, "# apples".to_string())])
                    .unwrap(),
            ),
        ));
        let reports = collect_resource_plural_issues(&resource);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].key, "apples");
        assert_eq!(reports[0].missing, [Few, Many].into_iter().collect());
    }
}
