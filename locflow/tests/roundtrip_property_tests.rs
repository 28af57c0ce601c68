use locflow::escaping::{escape, unescape};
use locflow::icu::{self, IcuNode};
use locflow::placeholder::{self, PrintfDialect};
use locflow::{CanonicalMessage, PluralCategory, PluralMessage};
use proptest::prelude::*;

fn raw_text_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9 '{}#%.,!?]{0,40}").expect("valid text regex")
}

fn literal_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z ,.!]{0,12}").expect("valid literal regex")
}

fn branch_text_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z '{}#.,!]{0,12}").expect("valid branch regex")
}

fn placeholder_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("%s"), Just("%d"), Just("%f"), Just("%.2f"), Just("%e"), Just("%%")]
}

/// Printf text made of literals and placeholders in index order.
fn printf_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec((literal_strategy(), placeholder_strategy()), 0..5).prop_flat_map(|parts| {
        literal_strategy().prop_map(move |tail| {
            let mut out = String::new();
            for (literal, placeholder) in &parts {
                out.push_str(literal);
                out.push_str(placeholder);
            }
            out.push_str(&tail);
            out
        })
    })
}

fn text_of(nodes: &[IcuNode]) -> String {
    nodes
        .iter()
        .map(|node| match node {
            IcuNode::Text(text) => text.clone(),
            other => panic!("unexpected node {:?}", other),
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn escape_then_unescape_is_identity(raw in raw_text_strategy(), is_plural in any::<bool>()) {
        prop_assert_eq!(unescape(&escape(&raw, is_plural), is_plural), raw);
    }

    #[test]
    fn escaped_text_parses_as_literal(raw in raw_text_strategy()) {
        let escaped = escape(&raw, false);
        let nodes = icu::parse(&escaped).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(text_of(&nodes), raw.clone());

        let escaped_branch = escape(&raw, true);
        let nodes = icu::parse_branch(&escaped_branch).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(text_of(&nodes), raw);
    }

    #[test]
    fn unescape_never_panics(text in ".{0,40}", is_plural in any::<bool>()) {
        let _ = unescape(&text, is_plural);
    }

    #[test]
    fn c_printf_round_trips_through_icu(printf in printf_strategy()) {
        let icu_text = placeholder::to_icu(&printf, PrintfDialect::C, false);
        prop_assert!(icu::is_valid(&icu_text), "invalid ICU {:?}", icu_text);
        prop_assert_eq!(placeholder::from_icu(&icu_text, PrintfDialect::C, false), printf);
    }

    #[test]
    fn plural_messages_are_stable(one in literal_strategy(), other in literal_strategy()) {
        let message = PluralMessage::new(
            "count",
            [
                (PluralCategory::One, format!("# {}", escape(&one, true))),
                (PluralCategory::Other, format!("# {}", escape(&other, true))),
            ],
        )
        .expect("forms present");
        let stored = message.to_icu();
        let lifted = CanonicalMessage::from_icu(&stored).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(lifted.to_icu(), stored);
    }

    #[test]
    fn printf_plural_branches_keep_their_text(one in branch_text_strategy(), other in branch_text_strategy()) {
        let one = format!("%d {}", one);
        let other = format!("%d {}", other);
        let message = PluralMessage::new(
            "0",
            [
                (PluralCategory::One, placeholder::to_icu(&one, PrintfDialect::C, true)),
                (PluralCategory::Other, placeholder::to_icu(&other, PrintfDialect::C, true)),
            ],
        )
        .expect("forms present");
        let lifted = CanonicalMessage::from_icu(&message.to_icu()).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let CanonicalMessage::Plural(lifted) = lifted else {
            return Err(TestCaseError::fail("plural was not lifted"));
        };
        prop_assert_eq!(placeholder::from_icu(&lifted.forms[&PluralCategory::One], PrintfDialect::C, true), one);
        prop_assert_eq!(placeholder::from_icu(&lifted.forms[&PluralCategory::Other], PrintfDialect::C, true), other);
    }
}

#[test]
fn precision_is_capped_at_fifty() {
    let icu_text = placeholder::to_icu("%.60f", PrintfDialect::C, false);
    assert_eq!(icu_text, format!("{{0, number, .{}}}", "0".repeat(50)));
    assert_eq!(placeholder::from_icu(&icu_text, PrintfDialect::C, false), "%.50f");
}

#[test]
fn out_of_order_arguments_stay_positional() {
    let icu_text = placeholder::to_icu("%2$s sent %1$d files", PrintfDialect::C, false);
    assert_eq!(icu_text, "{1} sent {0, number} files");
    assert_eq!(
        placeholder::from_icu(&icu_text, PrintfDialect::C, false),
        "%2$s sent %1$d files"
    );
    assert_eq!(
        placeholder::from_icu("{0} sent {1, number} files", PrintfDialect::C, false),
        "%s sent %d files"
    );
}
